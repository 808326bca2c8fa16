use anyhow::{anyhow, Context};
use std::io::Read;
use std::path::Path;

use crate::prayer::Gender;

pub const NAME_HEADER: &str = "Nama Lengkap";
pub const GENDER_HEADER: &str = "Gender";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub name: String,
    pub gender: Gender,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    pub line: u64,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ParsedRoster {
    pub entries: Vec<RosterEntry>,
    pub rejected: Vec<RejectedRow>,
    pub blank_rows: usize,
}

pub fn parse_roster_file(path: &Path) -> anyhow::Result<ParsedRoster> {
    let f = std::fs::File::open(path)
        .with_context(|| format!("failed to open roster {}", path.to_string_lossy()))?;
    parse_roster(f)
}

pub fn parse_roster<R: Read>(input: R) -> anyhow::Result<ParsedRoster> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(input);

    let headers = rdr.headers().context("failed to read roster header")?.clone();
    let find = |wanted: &str| {
        headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}').eq_ignore_ascii_case(wanted))
    };
    let name_col = find(NAME_HEADER)
        .ok_or_else(|| anyhow!("roster is missing the '{}' column", NAME_HEADER))?;
    let gender_col = find(GENDER_HEADER)
        .ok_or_else(|| anyhow!("roster is missing the '{}' column", GENDER_HEADER))?;

    let mut out = ParsedRoster::default();
    for rec in rdr.records() {
        let rec = rec.context("failed to read roster row")?;
        let line = rec.position().map(|p| p.line()).unwrap_or(0);
        let name = rec.get(name_col).unwrap_or("").to_string();
        if name.is_empty() {
            out.blank_rows += 1;
            continue;
        }
        let gender_raw = rec.get(gender_col).unwrap_or("");
        match Gender::parse(gender_raw) {
            Some(gender) => out.entries.push(RosterEntry { name, gender }),
            None => out.rejected.push(RejectedRow {
                line,
                name,
                reason: format!("unknown gender '{}'", gender_raw),
            }),
        }
    }
    Ok(out)
}
