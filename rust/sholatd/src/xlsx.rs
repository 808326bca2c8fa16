use anyhow::Context;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use std::path::Path;

use crate::calc::{Cell, ExportTable, COL_DATE, COL_GENDER, COL_NAME};

pub const SHEET_NAME: &str = "Laporan Sholat";

const TITLE_ROW: u32 = 0;
const SUBTITLE_ROW: u32 = 1;
const HEADER_ROW: u32 = 2;
const FIRST_DATA_ROW: u32 = 3;

struct Formats {
    title: Format,
    subtitle: Format,
    header: Format,
    data: Format,
}

impl Formats {
    fn new() -> Self {
        Self {
            title: Format::new()
                .set_bold()
                .set_font_size(16)
                .set_font_color(Color::RGB(0x1F2937))
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter),
            subtitle: Format::new()
                .set_italic()
                .set_font_size(12)
                .set_font_color(Color::RGB(0x374151))
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter),
            header: Format::new()
                .set_bold()
                .set_font_color(Color::White)
                .set_background_color(Color::RGB(0x4F81BD))
                .set_border(FormatBorder::Thin)
                .set_border_color(Color::Black)
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter),
            data: Format::new()
                .set_border(FormatBorder::Thin)
                .set_border_color(Color::RGB(0xD3D3D3)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WriteSummary {
    pub row_count: usize,
    pub column_count: usize,
}

fn column_width(name: &str) -> f64 {
    match name {
        COL_NAME => 25.0,
        COL_GENDER => 12.0,
        COL_DATE => 15.0,
        _ => 12.0,
    }
}

/// Title and subtitle are merged across every column; the header row is
/// written even when there is no data.
pub fn fill_worksheet(sheet: &mut Worksheet, table: &ExportTable) -> anyhow::Result<()> {
    let fmt = Formats::new();
    let columns = table.columns();
    let last_col = (columns.len() - 1) as u16;

    sheet.set_name(SHEET_NAME)?;
    sheet.merge_range(TITLE_ROW, 0, TITLE_ROW, last_col, &table.title(), &fmt.title)?;
    sheet.merge_range(
        SUBTITLE_ROW,
        0,
        SUBTITLE_ROW,
        last_col,
        &table.subtitle(),
        &fmt.subtitle,
    )?;

    for (col, name) in columns.iter().enumerate() {
        sheet.write_string_with_format(HEADER_ROW, col as u16, *name, &fmt.header)?;
        sheet.set_column_width(col as u16, column_width(name))?;
    }

    for (idx, row) in table.rows.iter().enumerate() {
        let r = FIRST_DATA_ROW + idx as u32;
        for (col, cell) in table.cells(row).into_iter().enumerate() {
            match cell {
                Cell::Text(s) => {
                    sheet.write_string_with_format(r, col as u16, s, &fmt.data)?;
                }
                Cell::Number(n) => {
                    sheet.write_number_with_format(r, col as u16, n, &fmt.data)?;
                }
            }
        }
    }
    Ok(())
}

pub fn write_workbook(table: &ExportTable, out_path: &Path) -> anyhow::Result<WriteSummary> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    fill_worksheet(sheet, table).context("failed to build worksheet")?;
    workbook.save(out_path).with_context(|| {
        format!("failed to write workbook {}", out_path.to_string_lossy())
    })?;

    Ok(WriteSummary {
        row_count: table.rows.len(),
        column_count: table.columns().len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::build_export_table;
    use crate::period::{Period, ReportFilter};
    use crate::prayer::{AttendanceRecord, Gender, PrayerFlags, StudentRef};
    use chrono::NaiveDate;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    #[test]
    fn writes_workbook_with_rows() {
        let dir = temp_dir("sholat-xlsx");
        let record = AttendanceRecord {
            id: "r1".into(),
            student: StudentRef {
                id: "s1".into(),
                name: "Ali".into(),
                gender: Gender::Male,
            },
            date: NaiveDate::from_ymd_opt(2025, 1, 6).expect("date"),
            flags: PrayerFlags {
                subuh: true,
                ..PrayerFlags::default()
            },
            updated_at: None,
        };
        let filter = ReportFilter {
            period: Period::Month { year: 2025, month: 1 },
            ..ReportFilter::default()
        };
        let table = build_export_table(&[record], &filter);
        let out = dir.join("nested").join(table.filename());

        let summary = write_workbook(&table, &out).expect("write workbook");
        assert_eq!(summary.row_count, 1);
        assert_eq!(summary.column_count, 10);
        let bytes = std::fs::read(&out).expect("read workbook");
        assert_eq!(&bytes[..4], &[0x50, 0x4B, 0x03, 0x04]);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn name_and_date_columns_are_wider() {
        assert_eq!(column_width(COL_NAME), 25.0);
        assert_eq!(column_width(COL_GENDER), 12.0);
        assert_eq!(column_width(COL_DATE), 15.0);
        assert_eq!(column_width("Subuh"), 12.0);
        assert_eq!(column_width("Total Tidak Terlaksanakan"), 12.0);
    }

    #[test]
    fn empty_table_still_gets_a_header() {
        let dir = temp_dir("sholat-xlsx-empty");
        let table = build_export_table(&[], &ReportFilter::default());
        let out = dir.join(table.filename());
        let summary = write_workbook(&table, &out).expect("write workbook");
        assert_eq!(summary.row_count, 0);
        assert_eq!(summary.column_count, 11);
        assert!(out.is_file());
        let _ = std::fs::remove_dir_all(dir);
    }
}
