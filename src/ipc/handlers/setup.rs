use crate::db;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::params::{parse_i64_range, require_conn, weekdays_from_value};
use crate::ipc::types::{AppState, Request};
use crate::rules::WeekdaySet;
use rusqlite::Connection;
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
pub enum SetupSection {
    Courses,
    SchoolYears,
    Accounts,
}

impl SetupSection {
    const ALL: [SetupSection; 3] = [Self::Courses, Self::SchoolYears, Self::Accounts];

    fn parse(s: &str) -> Option<Self> {
        match s {
            "courses" => Some(Self::Courses),
            "schoolYears" => Some(Self::SchoolYears),
            "accounts" => Some(Self::Accounts),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Courses => "courses",
            Self::SchoolYears => "schoolYears",
            Self::Accounts => "accounts",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Courses => "setup.courses",
            Self::SchoolYears => "setup.schoolYears",
            Self::Accounts => "setup.accounts",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Courses => json!({
            "defaultTaskDuration": 30
        }),
        SetupSection::SchoolYears => json!({
            "defaultDaysOfWeek": WeekdaySet::SCHOOL_WEEK,
            "defaultLengthDays": 270
        }),
        SetupSection::Accounts => json!({
            "trialDays": 30
        }),
    }
}

fn int_field(v: &Value, key: &str, min: i64, max: i64) -> Result<Value, String> {
    parse_i64_range(v, key, min, max)
        .map(Value::from)
        .map_err(|e| e.message)
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            SetupSection::Courses => match k.as_str() {
                "defaultTaskDuration" => {
                    obj.insert(k.clone(), int_field(v, k, 1, 600)?);
                }
                _ => return Err(format!("unknown courses field: {}", k)),
            },
            SetupSection::SchoolYears => match k.as_str() {
                "defaultDaysOfWeek" => {
                    let days = weekdays_from_value(v).map_err(|e| format!("{}: {}", k, e))?;
                    obj.insert(k.clone(), json!(days));
                }
                "defaultLengthDays" => {
                    obj.insert(k.clone(), int_field(v, k, 1, 730)?);
                }
                _ => return Err(format!("unknown schoolYears field: {}", k)),
            },
            SetupSection::Accounts => match k.as_str() {
                "trialDays" => {
                    obj.insert(k.clone(), int_field(v, k, 0, 365)?);
                }
                _ => return Err(format!("unknown accounts field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Best-effort apply: malformed historical values should not block setup.
            if let Err(e) = merge_section_patch(section, &mut current, saved_obj) {
                tracing::warn!(section = section.name(), error = %e, "ignoring saved settings");
                current = default_section(section);
            }
        }
    }
    Ok(current)
}

fn load(conn: &Connection, section: SetupSection) -> Result<Value, HandlerErr> {
    load_section(conn, section).map_err(|e| HandlerErr::db("db_query_failed", e))
}

/// Workspace defaults consumed by the other handlers.
#[derive(Debug, Clone, Copy)]
pub struct Defaults {
    pub task_duration: i64,
    pub school_year_days: WeekdaySet,
    pub school_year_length_days: i64,
    pub trial_days: i64,
}

pub fn defaults(conn: &Connection) -> Result<Defaults, HandlerErr> {
    let courses = load(conn, SetupSection::Courses)?;
    let years = load(conn, SetupSection::SchoolYears)?;
    let accounts = load(conn, SetupSection::Accounts)?;
    Ok(Defaults {
        task_duration: courses["defaultTaskDuration"].as_i64().unwrap_or(30),
        school_year_days: weekdays_from_value(&years["defaultDaysOfWeek"])
            .unwrap_or(WeekdaySet::SCHOOL_WEEK),
        school_year_length_days: years["defaultLengthDays"].as_i64().unwrap_or(270),
        trial_days: accounts["trialDays"].as_i64().unwrap_or(30),
    })
}

fn setup_get(state: &mut AppState, _req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let mut out = Map::new();
    for section in SetupSection::ALL {
        out.insert(section.name().to_string(), load(conn, section)?);
    }
    Ok(Value::Object(out))
}

fn setup_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return Err(HandlerErr::bad_params("missing section"));
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return Err(HandlerErr::bad_params("unknown section"));
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("patch must be an object"));
    };

    let mut current = load(conn, section)?;
    merge_section_patch(section, &mut current, patch_obj).map_err(HandlerErr::bad_params)?;
    db::settings_set_json(conn, section.key(), &current)
        .map_err(|e| HandlerErr::db("db_update_failed", e))?;
    tracing::info!(section = section.name(), "setup updated");
    Ok(json!({ section.name(): current }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(respond(&req.id, setup_get(state, req))),
        "setup.update" => Some(respond(&req.id, setup_update(state, req))),
        _ => None,
    }
}
