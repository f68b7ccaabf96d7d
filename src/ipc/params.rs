use crate::db;
use crate::ipc::error::HandlerErr;
use crate::ipc::types::AppState;
use crate::models::User;
use crate::rules::weekday::parse_day_name;
use crate::rules::WeekdaySet;
use chrono::{Datelike, NaiveDate};
use rusqlite::Connection;
use serde_json::Value;
use std::collections::BTreeSet;

pub fn require_conn(state: &AppState) -> Result<&Connection, HandlerErr> {
    state.db.as_ref().ok_or_else(|| HandlerErr {
        code: "no_workspace",
        message: "select a workspace first".to_string(),
        details: None,
    })
}

/// The acting user. Authentication happens in front of the sidecar; here we
/// only need the id to find the user's school.
pub fn require_user(conn: &Connection, params: &Value) -> Result<User, HandlerErr> {
    let user_id = get_required_str(params, "userId")?;
    db::user_get(conn, &user_id)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?
        .ok_or_else(|| HandlerErr::not_found("user"))
}

pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_required_text(params: &Value, key: &str, max_len: usize) -> Result<String, HandlerErr> {
    let s = get_required_str(params, key)?;
    let s = s.trim();
    if s.is_empty() {
        return Err(HandlerErr::bad_params(format!("{} must not be empty", key)));
    }
    if s.chars().count() > max_len {
        return Err(HandlerErr::bad_params(format!(
            "{} length must be <= {}",
            key, max_len
        )));
    }
    Ok(s.to_string())
}

pub fn get_optional_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Dates outside this span are rejected so later day arithmetic cannot
/// run off the end of the calendar.
pub const MIN_YEAR: i32 = 1;
pub const MAX_YEAR: i32 = 9999;

/// Upper bound on ids per request; each id is bound as one SQL parameter.
pub const MAX_ID_SET: usize = 500;

pub fn check_date_range(date: NaiveDate, key: &str) -> Result<NaiveDate, HandlerErr> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&date.year()) {
        return Err(HandlerErr::bad_params(format!(
            "{} year must be in {}..={}",
            key, MIN_YEAR, MAX_YEAR
        )));
    }
    Ok(date)
}

pub fn parse_date(v: &Value, key: &str) -> Result<NaiveDate, HandlerErr> {
    let s = v
        .as_str()
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a YYYY-MM-DD string", key)))?;
    let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| HandlerErr::bad_params(format!("{} must be a YYYY-MM-DD date", key)))?;
    check_date_range(date, key)
}

pub fn get_optional_date(params: &Value, key: &str) -> Result<Option<NaiveDate>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => parse_date(v, key).map(Some),
    }
}

/// `today` may be pinned by the caller; otherwise the local date is used.
pub fn get_today(params: &Value) -> Result<NaiveDate, HandlerErr> {
    Ok(get_optional_date(params, "today")?.unwrap_or_else(|| chrono::Local::now().date_naive()))
}

pub fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, HandlerErr> {
    let n = v
        .as_i64()
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be integer", key)))?;
    if !(min..=max).contains(&n) {
        return Err(HandlerErr::bad_params(format!(
            "{} must be in {}..={}",
            key, min, max
        )));
    }
    Ok(n)
}

/// Weekday input as submitted by the front end. Accepts a list of day names
/// (`["Monday", "wed"]`), a map of checkbox flags (`{"monday": "on"}`), or the
/// raw bitmask.
pub fn weekdays_from_value(v: &Value) -> Result<WeekdaySet, String> {
    match v {
        Value::Array(items) => {
            let mut set = WeekdaySet::EMPTY;
            for item in items {
                let name = item.as_str().ok_or("weekday names must be strings")?;
                let day = parse_day_name(name).ok_or_else(|| format!("unknown weekday: {}", name))?;
                set.insert(day);
            }
            Ok(set)
        }
        Value::Object(flags) => {
            let mut set = WeekdaySet::EMPTY;
            for (name, flag) in flags {
                let day = parse_day_name(name).ok_or_else(|| format!("unknown weekday: {}", name))?;
                if flag_is_on(flag) {
                    set.insert(day);
                }
            }
            Ok(set)
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(WeekdaySet::from_bits)
            .ok_or_else(|| "weekday mask must be in 0..=127".to_string()),
        _ => Err("days must be a list, a flag map, or a mask".to_string()),
    }
}

fn flag_is_on(flag: &Value) -> bool {
    match flag {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "on" | "true" | "1" | "yes"),
        Value::Number(n) => n.as_i64().map(|n| n != 0).unwrap_or(false),
        _ => false,
    }
}

pub fn get_optional_weekdays(params: &Value, key: &str) -> Result<Option<WeekdaySet>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => weekdays_from_value(v)
            .map(Some)
            .map_err(|msg| HandlerErr::bad_params(format!("{}: {}", key, msg))),
    }
}

/// Ids from a list parameter. An absent key is an empty selection, so the
/// rules layer gets to report it.
pub fn get_id_set(params: &Value, key: &str) -> Result<BTreeSet<String>, HandlerErr> {
    match params.get(key) {
        None => Ok(BTreeSet::new()),
        Some(v) => id_set_from_value(v, key),
    }
}

pub fn id_set_from_value(v: &Value, key: &str) -> Result<BTreeSet<String>, HandlerErr> {
    match v {
        Value::Null => Ok(BTreeSet::new()),
        Value::Array(items) if items.len() > MAX_ID_SET => Err(HandlerErr::bad_params(format!(
            "{} may hold at most {} ids",
            key, MAX_ID_SET
        ))),
        Value::Array(items) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| HandlerErr::bad_params(format!("{} must contain id strings", key)))
            })
            .collect(),
        _ => Err(HandlerErr::bad_params(format!("{} must be an array", key))),
    }
}

pub fn get_patch(params: &Value) -> Result<&serde_json::Map<String, Value>, HandlerErr> {
    params
        .get("patch")
        .and_then(|v| v.as_object())
        .ok_or_else(|| HandlerErr::bad_params("patch must be an object"))
}
