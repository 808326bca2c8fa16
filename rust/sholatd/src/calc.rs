use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;

use crate::period::{Period, ReportFilter};
use crate::prayer::{AttendanceRecord, Gender, Prayer, PRAYERS_PER_DAY};

pub const COL_NAME: &str = "Nama";
pub const COL_GENDER: &str = "Gender";
pub const COL_DATE: &str = "Tanggal";
pub const COL_EXPECTED: &str = "Total Normal Terlaksanakan";
pub const COL_ACHIEVED: &str = "Total Terlaksanakan";
pub const COL_MISSED: &str = "Total Tidak Terlaksanakan";

/// `Daily` keeps one row per record, `Summary` one row per student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Layout {
    Daily,
    Summary,
}

impl Layout {
    pub fn for_period(period: &Period) -> Layout {
        if period.is_range() {
            Layout::Summary
        } else {
            Layout::Daily
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tally {
    Done(bool),
    Count(u32),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Number(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub student_id: String,
    pub name: String,
    pub gender: Gender,
    pub date: Option<NaiveDate>,
    pub tallies: [Tally; 5],
    pub expected: u32,
    pub achieved: u32,
    pub missed: u32,
}

#[derive(Debug, Clone)]
pub struct ExportTable {
    pub layout: Layout,
    pub filter: ReportFilter,
    pub rows: Vec<ExportRow>,
}

struct StudentTotals {
    student_id: String,
    name: String,
    gender: Gender,
    counts: [u32; 5],
}

pub fn build_export_table(records: &[AttendanceRecord], filter: &ReportFilter) -> ExportTable {
    let layout = Layout::for_period(&filter.period);
    let rows = match layout {
        Layout::Daily => daily_rows(records),
        Layout::Summary => summary_rows(records, filter.period.days() * PRAYERS_PER_DAY),
    };
    ExportTable {
        layout,
        filter: filter.clone(),
        rows,
    }
}

fn daily_rows(records: &[AttendanceRecord]) -> Vec<ExportRow> {
    records
        .iter()
        .map(|r| {
            let achieved = r.flags.completed();
            ExportRow {
                student_id: r.student.id.clone(),
                name: r.student.name.clone(),
                gender: r.student.gender,
                date: Some(r.date),
                tallies: Prayer::ALL.map(|p| Tally::Done(r.flags.get(p))),
                expected: PRAYERS_PER_DAY,
                achieved,
                missed: r.flags.missed(),
            }
        })
        .collect()
}

fn summary_rows(records: &[AttendanceRecord], expected: u32) -> Vec<ExportRow> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut totals: Vec<StudentTotals> = Vec::new();

    for r in records {
        let slot = *index.entry(r.student.id.as_str()).or_insert_with(|| {
            totals.push(StudentTotals {
                student_id: r.student.id.clone(),
                name: r.student.name.clone(),
                gender: r.student.gender,
                counts: [0; 5],
            });
            totals.len() - 1
        });
        for (i, p) in Prayer::ALL.iter().enumerate() {
            if r.flags.get(*p) {
                totals[slot].counts[i] += 1;
            }
        }
    }

    // Same order as the student list, which sorts names COLLATE NOCASE.
    totals.sort_by_cached_key(|t| (t.name.to_lowercase(), t.student_id.clone()));

    totals
        .into_iter()
        .map(|t| {
            let achieved: u32 = t.counts.iter().sum();
            ExportRow {
                student_id: t.student_id,
                name: t.name,
                gender: t.gender,
                date: None,
                tallies: t.counts.map(Tally::Count),
                expected,
                achieved,
                missed: expected.saturating_sub(achieved),
            }
        })
        .collect()
}

impl ExportTable {
    pub fn columns(&self) -> Vec<&'static str> {
        let mut cols = vec![COL_NAME, COL_GENDER];
        if self.layout == Layout::Daily {
            cols.push(COL_DATE);
        }
        cols.extend(Prayer::ALL.iter().map(|p| p.label()));
        cols.extend([COL_EXPECTED, COL_ACHIEVED, COL_MISSED]);
        cols
    }

    /// Cells for one row, aligned with `columns()`.
    pub fn cells(&self, row: &ExportRow) -> Vec<Cell> {
        let mut out = vec![
            Cell::Text(row.name.clone()),
            Cell::Text(row.gender.label().to_string()),
        ];
        if self.layout == Layout::Daily {
            let date = row
                .date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            out.push(Cell::Text(date));
        }
        for t in row.tallies {
            out.push(match t {
                Tally::Done(true) => Cell::Text("TRUE".to_string()),
                Tally::Done(false) => Cell::Text("FALSE".to_string()),
                Tally::Count(n) => Cell::Number(n),
            });
        }
        out.push(Cell::Number(row.expected));
        out.push(Cell::Number(row.achieved));
        out.push(Cell::Number(row.missed));
        out
    }

    pub fn title(&self) -> String {
        let kind = match self.filter.period {
            Period::All => return "Laporan Sholat".to_string(),
            Period::Day(_) => "Harian",
            Period::Week { .. } => "Mingguan",
            Period::Month { .. } => "Bulanan",
        };
        format!("Laporan Sholat {}", kind)
    }

    pub fn subtitle(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(g) = self.filter.gender {
            parts.push(format!("Gender: {}", g.label()));
        }
        if let Some(s) = &self.filter.search {
            parts.push(format!("Nama: {}", s));
        }
        if let Some(key) = self.filter.period.key() {
            let label = match self.filter.period {
                Period::Day(_) => "Tanggal",
                Period::Week { .. } => "Minggu",
                _ => "Bulan",
            };
            parts.push(format!("{}: {}", label, key));
        }
        parts.join(" | ")
    }

    pub fn filename(&self) -> String {
        export_filename(&self.filter)
    }

    pub fn to_json(&self) -> serde_json::Value {
        let rows: Vec<Vec<Cell>> = self.rows.iter().map(|r| self.cells(r)).collect();
        json!({
            "layout": self.layout,
            "title": self.title(),
            "subtitle": self.subtitle(),
            "filename": self.filename(),
            "columns": self.columns(),
            "rows": rows,
            "rowCount": self.rows.len(),
        })
    }
}

pub fn export_filename(filter: &ReportFilter) -> String {
    let mut name = String::from("laporan-sholat");
    if let Some(g) = filter.gender {
        name.push('_');
        name.push_str(g.file_tag());
    }
    if let Some(key) = filter.period.key() {
        let kind = match filter.period {
            Period::Day(_) => "harian",
            Period::Week { .. } => "mingguan",
            _ => "bulanan",
        };
        name.push_str(&format!("_{}-{}", kind, key));
    }
    name.push_str(".xlsx");
    name
}
