use crate::ipc::error::{db_failed, respond, HandlerErr};
use crate::ipc::helpers::{date_or_today, db_conn, optional_u64, parse_flags, required_str};
use crate::ipc::types::{AppState, Request};
use crate::period::parse_report_filter;
use crate::prayer::{AttendanceRecord, PrayerFlags};
use crate::store;
use chrono::{Days, NaiveDate};
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashMap;

const DEFAULT_ROWS_PER_PAGE: u64 = 20;
const MAX_ROWS_PER_PAGE: u64 = 500;
const DEFAULT_HISTORY_DAYS: u64 = 7;
const MAX_HISTORY_DAYS: u64 = 366;

fn require_student(conn: &Connection, student_id: &str) -> Result<(), HandlerErr> {
    store::student_by_id(conn, student_id)
        .map_err(db_failed("db_query_failed"))?
        .map(|_| ())
        .ok_or_else(|| HandlerErr::not_found("student not found"))
}

fn reports_submit(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    let date = date_or_today(params, "date")?;
    let flags = parse_flags(params.get("prayers"), PrayerFlags::default())?;
    require_student(conn, &student_id)?;

    let (record, created) = store::upsert_report(conn, &student_id, date, &flags).map_err(|e| {
        HandlerErr::new("db_update_failed", e.to_string())
            .with_details(json!({ "table": "prayer_reports" }))
    })?;
    Ok(json!({ "report": record.to_json(), "created": created }))
}

fn reports_today(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    let date = date_or_today(params, "date")?;
    require_student(conn, &student_id)?;

    let report = store::report_for_day(conn, &student_id, date).map_err(db_failed("db_query_failed"))?;
    Ok(json!({
        "date": date.format("%Y-%m-%d").to_string(),
        "submitted": report.is_some(),
        "report": report.map(|r| r.to_json()),
    }))
}

fn reports_history(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    let today = date_or_today(params, "today")?;
    let days = optional_u64(params, "days")?.unwrap_or(DEFAULT_HISTORY_DAYS);
    if days == 0 || days > MAX_HISTORY_DAYS {
        return Err(HandlerErr::bad_params(format!(
            "days must be between 1 and {}",
            MAX_HISTORY_DAYS
        )));
    }
    require_student(conn, &student_id)?;

    let start = today
        .checked_sub_days(Days::new(days - 1))
        .ok_or_else(|| HandlerErr::bad_params("history window starts before the calendar"))?;
    let mut by_date: HashMap<NaiveDate, AttendanceRecord> =
        store::reports_between(conn, &student_id, start, today)
            .map_err(db_failed("db_query_failed"))?
            .into_iter()
            .map(|r| (r.date, r))
            .collect();

    let entries: Vec<serde_json::Value> = (0..days)
        .filter_map(|i| today.checked_sub_days(Days::new(i)))
        .map(|d| {
            json!({
                "date": d.format("%Y-%m-%d").to_string(),
                "report": by_date.remove(&d).map(|r| r.to_json()),
            })
        })
        .collect();
    Ok(json!({ "studentId": student_id, "days": entries }))
}

fn reports_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let filter = parse_report_filter(params.get("filters"))?;
    let rows_per_page = optional_u64(params, "rowsPerPage")?
        .unwrap_or(DEFAULT_ROWS_PER_PAGE)
        .clamp(1, MAX_ROWS_PER_PAGE);
    let requested_page = optional_u64(params, "page")?.unwrap_or(1);

    let total_rows = store::count_records(conn, &filter).map_err(db_failed("db_query_failed"))? as u64;
    let total_pages = total_rows.div_ceil(rows_per_page).max(1);
    let page = requested_page.clamp(1, total_pages);
    let offset = (page - 1) * rows_per_page;

    let records = store::query_records(conn, &filter, Some((rows_per_page as i64, offset as i64)))
        .map_err(db_failed("db_query_failed"))?;
    let rows: Vec<serde_json::Value> = records.iter().map(|r| r.to_json()).collect();
    Ok(json!({
        "rows": rows,
        "page": page,
        "totalPages": total_pages,
        "totalRows": total_rows,
        "rowsPerPage": rows_per_page,
    }))
}

fn reports_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let report_id = required_str(params, "reportId")?;
    let Some(patch) = params.get("patch") else {
        return Err(HandlerErr::bad_params("missing patch"));
    };
    let existing = store::report_by_id(conn, &report_id)
        .map_err(db_failed("db_query_failed"))?
        .ok_or_else(|| HandlerErr::not_found("report not found"))?;
    let flags = parse_flags(Some(patch), existing.flags)?;

    store::write_flags(conn, &report_id, &flags).map_err(|e| {
        HandlerErr::new("db_update_failed", e.to_string())
            .with_details(json!({ "table": "prayer_reports" }))
    })?;
    let updated = store::report_by_id(conn, &report_id)
        .map_err(db_failed("db_query_failed"))?
        .ok_or_else(|| HandlerErr::not_found("report not found"))?;
    Ok(json!({ "report": updated.to_json() }))
}

fn reports_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let report_id = required_str(params, "reportId")?;
    let n = store::delete_report(conn, &report_id).map_err(|e| {
        HandlerErr::new("db_delete_failed", e.to_string())
            .with_details(json!({ "table": "prayer_reports" }))
    })?;
    if n == 0 {
        return Err(HandlerErr::not_found("report not found"));
    }
    tracing::info!(report_id = %report_id, "report deleted");
    Ok(json!({ "deleted": report_id }))
}

type Op = fn(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>;

fn run(state: &mut AppState, req: &Request, op: Op) -> serde_json::Value {
    respond(&req.id, db_conn(state).and_then(|conn| op(conn, &req.params)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let op: Op = match req.method.as_str() {
        "reports.submit" => reports_submit,
        "reports.today" => reports_today,
        "reports.history" => reports_history,
        "reports.list" => reports_list,
        "reports.update" => reports_update,
        "reports.delete" => reports_delete,
        _ => return None,
    };
    Some(run(state, req, op))
}
