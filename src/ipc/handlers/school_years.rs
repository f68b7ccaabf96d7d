use crate::db;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::handlers::setup;
use crate::ipc::params::{
    check_date_range, get_optional_date, get_optional_weekdays, get_patch, get_required_str,
    get_required_text, get_today, parse_date, require_conn, require_user, weekdays_from_value,
};
use crate::ipc::types::{AppState, Request};
use crate::models::{SchoolYear, User};
use crate::rules::{self, check_course_days, resolve_current, RecordKind, WeekdaySet};
use chrono::{Duration, NaiveDate};
use rusqlite::Connection;
use serde_json::{json, Value};
use uuid::Uuid;

fn check_dates(start: NaiveDate, end: NaiveDate) -> Result<(), HandlerErr> {
    if end < start {
        return Err(HandlerErr::bad_params(
            "The start date must be before the end date.",
        ));
    }
    Ok(())
}

/// Detail lookup. Another school's year is reported exactly like a missing one.
pub fn visible_school_year(
    conn: &Connection,
    user: &User,
    school_year_id: &str,
) -> Result<SchoolYear, HandlerErr> {
    let sy = db::school_year_get(conn, school_year_id)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    rules::visible_to(user, sy).ok_or_else(|| HandlerErr::not_found(RecordKind::SchoolYear.label()))
}

fn school_year_detail(conn: &Connection, sy: &SchoolYear) -> Result<Value, HandlerErr> {
    let grade_levels = db::grade_levels_for_school_year(conn, &sy.id)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let mut levels = Vec::with_capacity(grade_levels.len());
    for gl in &grade_levels {
        let courses = db::courses_for_grade_level(conn, &gl.id)
            .map_err(|e| HandlerErr::db("db_query_failed", e))?;
        levels.push(json!({
            "id": gl.id,
            "name": gl.name,
            "courses": courses,
        }));
    }
    let mut out = json!(sy);
    out["gradeLevels"] = Value::Array(levels);
    Ok(out)
}

fn school_years_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let user = require_user(conn, &req.params)?;
    let defaults = setup::defaults(conn)?;

    let start = parse_date(
        req.params
            .get("startDate")
            .ok_or_else(|| HandlerErr::bad_params("missing startDate"))?,
        "startDate",
    )?;
    let end = match get_optional_date(&req.params, "endDate")? {
        Some(end) => end,
        None => {
            let end = start
                .checked_add_signed(Duration::days(defaults.school_year_length_days - 1))
                .ok_or_else(|| HandlerErr::bad_params("startDate is too far in the future"))?;
            check_date_range(end, "endDate")?
        }
    };
    check_dates(start, end)?;
    let days = get_optional_weekdays(&req.params, "daysOfWeek")?.unwrap_or(defaults.school_year_days);

    let sy = SchoolYear {
        id: Uuid::new_v4().to_string(),
        school_id: user.school_id.clone(),
        start_date: start,
        end_date: end,
        days_of_week: days,
    };
    conn.execute(
        "INSERT INTO school_years(id, school_id, start_date, end_date, days_of_week)
         VALUES(?, ?, ?, ?, ?)",
        (&sy.id, &sy.school_id, sy.start_date, sy.end_date, sy.days_of_week.bits()),
    )
    .map_err(|e| HandlerErr::db_table("db_insert_failed", "school_years", e))?;

    tracing::info!(school_year_id = %sy.id, user_id = %user.id, "school year created");
    Ok(json!({ "schoolYearId": sy.id, "schoolYear": sy }))
}

fn school_years_list(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let user = require_user(conn, &req.params)?;
    let years = db::school_years_for_school(conn, &user.school_id)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    Ok(json!({ "schoolYears": years }))
}

fn school_years_get(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let user = require_user(conn, &req.params)?;
    let school_year_id = get_required_str(&req.params, "schoolYearId")?;
    let sy = visible_school_year(conn, &user, &school_year_id)?;
    Ok(json!({ "schoolYear": school_year_detail(conn, &sy)? }))
}

fn school_years_current(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let user = require_user(conn, &req.params)?;
    let today = get_today(&req.params)?;

    // Filter to the tenant first, then select.
    let owned = db::school_years_for_school(conn, &user.school_id)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    match resolve_current(today, &owned) {
        Some(sy) => Ok(json!({
            "today": today,
            "schoolYear": school_year_detail(conn, sy)?,
        })),
        None => Ok(json!({
            "today": today,
            "schoolYear": null,
            "fallback": "schoolYears.list",
        })),
    }
}

fn school_years_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let user = require_user(conn, &req.params)?;
    let school_year_id = get_required_str(&req.params, "schoolYearId")?;
    let patch = get_patch(&req.params)?;

    let found = db::school_year_get(conn, &school_year_id)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let mut sy = rules::check_reference(&user, found, RecordKind::SchoolYear, None)?;

    for (k, v) in patch {
        match k.as_str() {
            "startDate" => sy.start_date = parse_date(v, k)?,
            "endDate" => sy.end_date = parse_date(v, k)?,
            "daysOfWeek" => {
                sy.days_of_week = weekdays_from_value(v)
                    .map_err(|e| HandlerErr::bad_params(format!("{}: {}", k, e)))?
            }
            _ => return Err(HandlerErr::bad_params(format!("unknown field: {}", k))),
        }
    }
    check_dates(sy.start_date, sy.end_date)?;

    // Narrowing the year's days must not strand any of its courses.
    let courses = db::courses_for_school_year(conn, &sy.id)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let scheduled: WeekdaySet = courses.iter().flat_map(|c| c.days_of_week.iter()).collect();
    check_course_days(sy.days_of_week, scheduled)?;

    conn.execute(
        "UPDATE school_years SET start_date = ?, end_date = ?, days_of_week = ? WHERE id = ?",
        (sy.start_date, sy.end_date, sy.days_of_week.bits(), &sy.id),
    )
    .map_err(|e| HandlerErr::db_table("db_update_failed", "school_years", e))?;

    Ok(json!({ "schoolYear": sy }))
}

fn grade_levels_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let user = require_user(conn, &req.params)?;
    let school_year_id = get_required_str(&req.params, "schoolYearId")?;
    let name = get_required_text(&req.params, "name", 128)?;

    let found = db::school_year_get(conn, &school_year_id)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let sy = rules::check_reference(
        &user,
        found,
        RecordKind::SchoolYear,
        Some(RecordKind::GradeLevel),
    )?;

    let grade_level_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO grade_levels(id, school_year_id, name) VALUES(?, ?, ?)",
        (&grade_level_id, &sy.id, &name),
    )
    .map_err(|e| HandlerErr::db_table("db_insert_failed", "grade_levels", e))?;

    Ok(json!({
        "gradeLevelId": grade_level_id,
        "schoolYearId": sy.id,
        "name": name,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "schoolYears.create" => school_years_create(state, req),
        "schoolYears.list" => school_years_list(state, req),
        "schoolYears.get" => school_years_get(state, req),
        "schoolYears.current" => school_years_current(state, req),
        "schoolYears.update" => school_years_update(state, req),
        "gradeLevels.create" => grade_levels_create(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
