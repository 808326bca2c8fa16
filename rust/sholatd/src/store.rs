use chrono::NaiveDate;
use rusqlite::types::{Type, Value};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use uuid::Uuid;

use crate::db::now_timestamp;
use crate::period::{PeriodError, ReportFilter};
use crate::prayer::{AttendanceRecord, Gender, PrayerFlags, StudentRef};

const RECORD_SELECT: &str = "SELECT r.id, r.student_id, s.name, s.gender, r.report_date,
        r.subuh, r.dzuhur, r.ashar, r.maghrib, r.isya, r.updated_at
     FROM prayer_reports r
     JOIN students s ON s.id = r.student_id";

fn conversion_err<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn gender_at(r: &Row, idx: usize) -> rusqlite::Result<Gender> {
    let raw: String = r.get(idx)?;
    Gender::parse(&raw).ok_or_else(|| conversion_err(idx, PeriodError::BadGender(raw)))
}

fn record_from_row(r: &Row) -> rusqlite::Result<AttendanceRecord> {
    let date_raw: String = r.get(4)?;
    let date = NaiveDate::parse_from_str(&date_raw, "%Y-%m-%d").map_err(|e| conversion_err(4, e))?;
    Ok(AttendanceRecord {
        id: r.get(0)?,
        student: StudentRef {
            id: r.get(1)?,
            name: r.get(2)?,
            gender: gender_at(r, 3)?,
        },
        date,
        flags: PrayerFlags {
            subuh: r.get::<_, i64>(5)? != 0,
            dzuhur: r.get::<_, i64>(6)? != 0,
            ashar: r.get::<_, i64>(7)? != 0,
            maghrib: r.get::<_, i64>(8)? != 0,
            isya: r.get::<_, i64>(9)? != 0,
        },
        updated_at: r.get(10)?,
    })
}

fn date_key(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

pub fn list_students(conn: &Connection, gender: Option<Gender>) -> rusqlite::Result<Vec<StudentRef>> {
    let mut sql = String::from("SELECT id, name, gender FROM students");
    let mut args: Vec<Value> = Vec::new();
    if let Some(g) = gender {
        sql.push_str(" WHERE gender = ?");
        args.push(Value::Text(g.code().to_string()));
    }
    sql.push_str(" ORDER BY name COLLATE NOCASE, id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args), |r| {
        Ok(StudentRef {
            id: r.get(0)?,
            name: r.get(1)?,
            gender: gender_at(r, 2)?,
        })
    })?;
    rows.collect()
}

pub fn student_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<StudentRef>> {
    conn.query_row(
        "SELECT id, name, gender FROM students WHERE id = ?",
        [id],
        |r| {
            Ok(StudentRef {
                id: r.get(0)?,
                name: r.get(1)?,
                gender: gender_at(r, 2)?,
            })
        },
    )
    .optional()
}

pub fn insert_student(conn: &Connection, name: &str, gender: Gender) -> rusqlite::Result<String> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(id, name, gender, created_at) VALUES(?, ?, ?, ?)",
        (&id, name, gender.code(), now_timestamp()),
    )?;
    Ok(id)
}

/// Lower-cased names of every student, for duplicate detection on import.
pub fn student_name_keys(conn: &Connection) -> rusqlite::Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT name FROM students")?;
    let names = stmt.query_map([], |r| r.get::<_, String>(0))?;
    names.map(|n| n.map(|s| s.trim().to_lowercase())).collect()
}

pub fn delete_all_students(conn: &Connection) -> rusqlite::Result<(usize, usize)> {
    let reports = conn.execute("DELETE FROM prayer_reports", [])?;
    let students = conn.execute("DELETE FROM students", [])?;
    Ok((students, reports))
}

fn filter_clause(filter: &ReportFilter) -> (String, Vec<Value>) {
    let mut clauses: Vec<&str> = Vec::new();
    let mut args: Vec<Value> = Vec::new();
    if let Some(g) = filter.gender {
        clauses.push("s.gender = ?");
        args.push(Value::Text(g.code().to_string()));
    }
    if let Some(q) = &filter.search {
        clauses.push("instr(fold_case(s.name), ?) > 0");
        args.push(Value::Text(q.to_lowercase()));
    }
    if let Some((start, end)) = filter.period.range() {
        clauses.push("r.report_date BETWEEN ? AND ?");
        args.push(Value::Text(date_key(start)));
        args.push(Value::Text(date_key(end)));
    }
    if clauses.is_empty() {
        (String::new(), args)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), args)
    }
}

pub fn count_records(conn: &Connection, filter: &ReportFilter) -> rusqlite::Result<i64> {
    let (clause, args) = filter_clause(filter);
    let sql = format!(
        "SELECT COUNT(*) FROM prayer_reports r JOIN students s ON s.id = r.student_id{}",
        clause
    );
    conn.query_row(&sql, params_from_iter(args), |r| r.get(0))
}

/// Records matching `filter`, newest date first. `page` is `(limit, offset)`.
pub fn query_records(
    conn: &Connection,
    filter: &ReportFilter,
    page: Option<(i64, i64)>,
) -> rusqlite::Result<Vec<AttendanceRecord>> {
    let (clause, mut args) = filter_clause(filter);
    let mut sql = format!(
        "{}{} ORDER BY r.report_date DESC, s.name COLLATE NOCASE, r.id",
        RECORD_SELECT, clause
    );
    if let Some((limit, offset)) = page {
        sql.push_str(" LIMIT ? OFFSET ?");
        args.push(Value::Integer(limit));
        args.push(Value::Integer(offset));
    }
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args), record_from_row)?;
    rows.collect()
}

pub fn report_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<AttendanceRecord>> {
    let sql = format!("{} WHERE r.id = ?", RECORD_SELECT);
    conn.query_row(&sql, [id], record_from_row).optional()
}

pub fn report_for_day(
    conn: &Connection,
    student_id: &str,
    date: NaiveDate,
) -> rusqlite::Result<Option<AttendanceRecord>> {
    let sql = format!(
        "{} WHERE r.student_id = ? AND r.report_date = ?",
        RECORD_SELECT
    );
    conn.query_row(&sql, (student_id, date_key(date)), record_from_row)
        .optional()
}

pub fn reports_between(
    conn: &Connection,
    student_id: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> rusqlite::Result<Vec<AttendanceRecord>> {
    let sql = format!(
        "{} WHERE r.student_id = ? AND r.report_date BETWEEN ? AND ?
         ORDER BY r.report_date DESC",
        RECORD_SELECT
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map((student_id, date_key(start), date_key(end)), record_from_row)?;
    rows.collect()
}

/// Writes a student's flags for a date; a second write on the same date
/// replaces the first. Returns the stored record and whether it was new.
pub fn upsert_report(
    conn: &Connection,
    student_id: &str,
    date: NaiveDate,
    flags: &PrayerFlags,
) -> rusqlite::Result<(AttendanceRecord, bool)> {
    let existing = report_for_day(conn, student_id, date)?;
    let created = existing.is_none();
    let id = match existing {
        Some(r) => {
            write_flags(conn, &r.id, flags)?;
            r.id
        }
        None => {
            let id = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO prayer_reports(
                   id, student_id, report_date, subuh, dzuhur, ashar, maghrib, isya, updated_at)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
                (
                    &id,
                    student_id,
                    date_key(date),
                    flags.subuh,
                    flags.dzuhur,
                    flags.ashar,
                    flags.maghrib,
                    flags.isya,
                    now_timestamp(),
                ),
            )?;
            id
        }
    };
    let stored = report_by_id(conn, &id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
    Ok((stored, created))
}

pub fn write_flags(conn: &Connection, report_id: &str, flags: &PrayerFlags) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE prayer_reports
         SET subuh = ?, dzuhur = ?, ashar = ?, maghrib = ?, isya = ?, updated_at = ?
         WHERE id = ?",
        (
            flags.subuh,
            flags.dzuhur,
            flags.ashar,
            flags.maghrib,
            flags.isya,
            now_timestamp(),
            report_id,
        ),
    )
}

pub fn delete_report(conn: &Connection, report_id: &str) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM prayer_reports WHERE id = ?", [report_id])
}
