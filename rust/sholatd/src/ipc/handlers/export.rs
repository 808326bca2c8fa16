use crate::calc::{build_export_table, ExportTable};
use crate::ipc::error::{db_failed, respond, HandlerErr};
use crate::ipc::helpers::{db_conn, optional_str};
use crate::ipc::types::{AppState, Request};
use crate::period::parse_report_filter;
use crate::{store, xlsx};
use serde_json::json;
use std::path::{Path, PathBuf};

const EXPORT_DIR: &str = "exports";

fn load_table(state: &AppState, params: &serde_json::Value) -> Result<ExportTable, HandlerErr> {
    let conn = db_conn(state)?;
    let filter = parse_report_filter(params.get("filters"))?;
    let records = store::query_records(conn, &filter, None).map_err(db_failed("db_query_failed"))?;
    Ok(build_export_table(&records, &filter))
}

/// `outPath` wins; otherwise the generated file name goes into `outDir`,
/// or `<workspace>/exports` when neither is given.
fn resolve_out_path(
    workspace: Option<&Path>,
    params: &serde_json::Value,
    filename: &str,
) -> Result<PathBuf, HandlerErr> {
    if let Some(p) = optional_str(params, "outPath")? {
        return Ok(PathBuf::from(p));
    }
    if let Some(dir) = optional_str(params, "outDir")? {
        return Ok(PathBuf::from(dir).join(filename));
    }
    workspace
        .map(|w| w.join(EXPORT_DIR).join(filename))
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

fn export_preview(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let table = load_table(state, params)?;
    Ok(table.to_json())
}

fn export_xlsx(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let table = load_table(state, params)?;
    let filename = table.filename();
    let out = resolve_out_path(state.workspace.as_deref(), params, &filename)?;

    let summary = xlsx::write_workbook(&table, &out).map_err(|e| {
        HandlerErr::new("export_failed", format!("{e:#}"))
            .with_details(json!({ "path": out.to_string_lossy() }))
    })?;
    tracing::info!(
        path = %out.display(),
        rows = summary.row_count,
        layout = ?table.layout,
        "workbook exported"
    );

    Ok(json!({
        "path": out.to_string_lossy(),
        "filename": filename,
        "layout": table.layout,
        "title": table.title(),
        "rowCount": summary.row_count,
        "columnCount": summary.column_count,
    }))
}

fn handle_export_preview(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(&req.id, export_preview(state, &req.params))
}

fn handle_export_xlsx(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(&req.id, export_xlsx(state, &req.params))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "export.preview" => Some(handle_export_preview(state, req)),
        "export.xlsx" => Some(handle_export_xlsx(state, req)),
        _ => None,
    }
}
