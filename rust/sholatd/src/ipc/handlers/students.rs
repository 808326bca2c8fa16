use crate::ipc::error::{db_failed, respond, HandlerErr};
use crate::ipc::helpers::{db_conn, optional_bool, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::prayer::{Gender, StudentRef};
use crate::{roster, store};
use rusqlite::Connection;
use serde_json::json;
use std::path::PathBuf;

fn student_json(s: &StudentRef) -> serde_json::Value {
    json!({
        "id": s.id,
        "name": s.name,
        "gender": s.gender.code(),
        "genderLabel": s.gender.label(),
    })
}

fn parse_gender(raw: &str) -> Result<Gender, HandlerErr> {
    Gender::parse(raw).ok_or_else(|| {
        HandlerErr::bad_params("gender must be L or P").with_details(json!({ "gender": raw }))
    })
}

fn students_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let gender = match optional_str(params, "gender")? {
        None => None,
        Some(g) if g.eq_ignore_ascii_case("ALL") => None,
        Some(g) => Some(parse_gender(g)?),
    };
    let students = store::list_students(conn, gender).map_err(db_failed("db_query_failed"))?;
    let rows: Vec<serde_json::Value> = students.iter().map(student_json).collect();
    Ok(json!({ "students": rows }))
}

fn students_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = required_str(params, "name")?;
    let gender = parse_gender(&required_str(params, "gender")?)?;
    let id = store::insert_student(conn, &name, gender).map_err(|e| {
        HandlerErr::new("db_insert_failed", e.to_string()).with_details(json!({ "table": "students" }))
    })?;
    Ok(json!({ "studentId": id, "name": name, "gender": gender.code() }))
}

fn students_import_csv(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let path = PathBuf::from(required_str(params, "path")?);
    let replace = optional_bool(params, "replace")?.unwrap_or(false);

    let parsed = roster::parse_roster_file(&path)
        .map_err(|e| HandlerErr::new("import_failed", format!("{e:#}")))?;

    let tx = conn
        .unchecked_transaction()
        .map_err(db_failed("db_tx_failed"))?;

    let replaced = if replace {
        let (students, reports) =
            store::delete_all_students(&tx).map_err(db_failed("db_delete_failed"))?;
        Some(json!({ "students": students, "reports": reports }))
    } else {
        None
    };

    let mut known = store::student_name_keys(&tx).map_err(db_failed("db_query_failed"))?;
    let mut inserted: usize = 0;
    let mut skipped: Vec<String> = Vec::new();
    let mut rejected: Vec<serde_json::Value> = parsed
        .rejected
        .iter()
        .map(|r| json!({ "line": r.line, "name": r.name, "reason": r.reason }))
        .collect();

    for entry in &parsed.entries {
        let key = entry.name.to_lowercase();
        if known.contains(&key) {
            skipped.push(entry.name.clone());
            continue;
        }
        match store::insert_student(&tx, &entry.name, entry.gender) {
            Ok(_) => {
                inserted += 1;
                known.insert(key);
            }
            Err(e) => {
                tracing::warn!(name = %entry.name, error = %e, "roster row not inserted");
                rejected.push(json!({ "line": null, "name": entry.name, "reason": e.to_string() }));
            }
        }
    }

    tx.commit().map_err(db_failed("db_commit_failed"))?;
    tracing::info!(
        path = %path.display(),
        inserted,
        skipped = skipped.len(),
        rejected = rejected.len(),
        replace,
        "roster imported"
    );

    Ok(json!({
        "inserted": inserted,
        "skipped": skipped,
        "rejected": rejected,
        "blankRows": parsed.blank_rows,
        "replaced": replaced,
    }))
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(
        &req.id,
        db_conn(state).and_then(|conn| students_list(conn, &req.params)),
    )
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(
        &req.id,
        db_conn(state).and_then(|conn| students_create(conn, &req.params)),
    )
}

fn handle_students_import_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(
        &req.id,
        db_conn(state).and_then(|conn| students_import_csv(conn, &req.params)),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.importCsv" => Some(handle_students_import_csv(state, req)),
        _ => None,
    }
}
