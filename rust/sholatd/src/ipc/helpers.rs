use chrono::NaiveDate;
use rusqlite::Connection;

use crate::ipc::error::HandlerErr;
use crate::ipc::types::AppState;
use crate::period::parse_date;
use crate::prayer::{Prayer, PrayerFlags};

pub fn db_conn(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    let v = params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))?;
    if v.is_empty() {
        return Err(HandlerErr::bad_params(format!("{} must not be empty", key)));
    }
    Ok(v)
}

pub fn optional_str<'a>(
    params: &'a serde_json::Value,
    key: &str,
) -> Result<Option<&'a str>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.trim()).filter(|s| !s.is_empty()))
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a string", key))),
    }
}

pub fn optional_bool(params: &serde_json::Value, key: &str) -> Result<Option<bool>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_bool()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a boolean", key))),
    }
}

pub fn optional_u64(params: &serde_json::Value, key: &str) -> Result<Option<u64>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a positive integer", key))),
    }
}

/// Reads a `YYYY-MM-DD` param, falling back to the local calendar day.
pub fn date_or_today(params: &serde_json::Value, key: &str) -> Result<NaiveDate, HandlerErr> {
    match optional_str(params, key)? {
        Some(s) => Ok(parse_date(s)?),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

/// Applies `{subuh, dzuhur, ashar, maghrib, isya}` booleans on top of `base`.
/// Keys that are absent keep their value from `base`.
pub fn parse_flags(
    raw: Option<&serde_json::Value>,
    base: PrayerFlags,
) -> Result<PrayerFlags, HandlerErr> {
    let Some(raw) = raw else {
        return Ok(base);
    };
    let Some(obj) = raw.as_object() else {
        return Err(HandlerErr::bad_params("prayers must be an object"));
    };
    let mut flags = base;
    for p in Prayer::ALL {
        match obj.get(p.key()) {
            None => {}
            Some(v) if v.is_null() => {}
            Some(v) => {
                let Some(done) = v.as_bool() else {
                    return Err(HandlerErr::bad_params(format!(
                        "{} must be a boolean",
                        p.key()
                    )));
                };
                flags.set(p, done);
            }
        }
    }
    Ok(flags)
}
