use crate::db;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::handlers::setup;
use crate::ipc::params::{
    get_id_set, get_optional_str, get_optional_weekdays, get_patch, get_required_str,
    get_required_text, id_set_from_value, parse_i64_range, require_conn, require_user,
    weekdays_from_value,
};
use crate::ipc::types::{AppState, Request};
use crate::models::{Course, GradeLevel, SchoolYear, User};
use crate::rules::{self, validate_course_schedule, RecordKind, RuleError, WeekdaySet};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Loads the school year a course is being created in. An absent id is a
/// missing school year, not an invalid reference.
fn course_school_year(
    conn: &Connection,
    user: &User,
    school_year_id: Option<&str>,
) -> Result<Option<SchoolYear>, HandlerErr> {
    let Some(id) = school_year_id else {
        return Ok(None);
    };
    let found = db::school_year_get(conn, id).map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let sy = rules::check_reference(user, found, RecordKind::SchoolYear, Some(RecordKind::Course))?;
    Ok(Some(sy))
}

/// Every grade level must be the user's and sit in the course's school year.
fn course_grade_levels(
    conn: &Connection,
    user: &User,
    school_year: &SchoolYear,
    ids: &BTreeSet<String>,
) -> Result<Vec<GradeLevel>, HandlerErr> {
    if ids.is_empty() {
        return Err(RuleError::NoSelection(RecordKind::GradeLevel).into());
    }
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        let found = db::grade_level_get(conn, id).map_err(|e| HandlerErr::db("db_query_failed", e))?;
        let gl = rules::check_reference(user, found, RecordKind::GradeLevel, Some(RecordKind::Course))?;
        if gl.school_year_id != school_year.id {
            return Err(RuleError::InvalidReference(RecordKind::GradeLevel).into());
        }
        out.push(gl);
    }
    Ok(out)
}

fn replace_grade_level_links(
    conn: &Connection,
    course_id: &str,
    grade_levels: &[GradeLevel],
) -> Result<(), HandlerErr> {
    conn.execute(
        "DELETE FROM course_grade_levels WHERE course_id = ?",
        [course_id],
    )
    .map_err(|e| HandlerErr::db_table("db_delete_failed", "course_grade_levels", e))?;
    for gl in grade_levels {
        conn.execute(
            "INSERT INTO course_grade_levels(course_id, grade_level_id) VALUES(?, ?)",
            (course_id, &gl.id),
        )
        .map_err(|e| HandlerErr::db_table("db_insert_failed", "course_grade_levels", e))?;
    }
    Ok(())
}

pub fn load_course(conn: &Connection, course_id: &str) -> Result<Option<Course>, HandlerErr> {
    db::course_get(conn, course_id).map_err(|e| HandlerErr::db("db_query_failed", e))
}

fn courses_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let user = require_user(conn, &req.params)?;
    let name = get_required_text(&req.params, "name", 256)?;
    let days = get_optional_weekdays(&req.params, "days")?.unwrap_or(WeekdaySet::EMPTY);
    let grade_level_ids = get_id_set(&req.params, "gradeLevelIds")?;
    let default_task_duration = match req.params.get("defaultTaskDuration") {
        Some(v) if !v.is_null() => parse_i64_range(v, "defaultTaskDuration", 1, 600)?,
        _ => setup::defaults(conn)?.task_duration,
    };

    let school_year_id = get_optional_str(&req.params, "schoolYearId");
    let school_year = course_school_year(conn, &user, school_year_id.as_deref())?;
    validate_course_schedule(school_year.as_ref().map(|sy| sy.days_of_week), days)?;
    let Some(school_year) = school_year else {
        return Err(RuleError::MissingSchoolYear.into());
    };
    let grade_levels = course_grade_levels(conn, &user, &school_year, &grade_level_ids)?;

    let course_id = Uuid::new_v4().to_string();
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e))?;
    tx.execute(
        "INSERT INTO courses(id, name, days_of_week, default_task_duration) VALUES(?, ?, ?, ?)",
        (&course_id, &name, days.bits(), default_task_duration),
    )
    .map_err(|e| HandlerErr::db_table("db_insert_failed", "courses", e))?;
    replace_grade_level_links(&tx, &course_id, &grade_levels)?;
    tx.commit().map_err(|e| HandlerErr::db("db_tx_failed", e))?;

    tracing::info!(course_id = %course_id, school_year_id = %school_year.id, "course created");
    let course = load_course(conn, &course_id)?.ok_or_else(|| HandlerErr::not_found("course"))?;
    Ok(json!({ "courseId": course_id, "course": course }))
}

fn courses_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let user = require_user(conn, &req.params)?;
    let course_id = get_required_str(&req.params, "courseId")?;
    let patch = get_patch(&req.params)?;

    let found = load_course(conn, &course_id)?;
    let mut course = rules::check_reference(&user, found, RecordKind::Course, None)?;

    let mut grade_level_ids: Option<BTreeSet<String>> = None;
    for (k, v) in patch {
        match k.as_str() {
            "name" => {
                let name = v
                    .as_str()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| HandlerErr::bad_params("name must be a non-empty string"))?;
                course.name = name.to_string();
            }
            "days" => {
                course.days_of_week = weekdays_from_value(v)
                    .map_err(|e| HandlerErr::bad_params(format!("{}: {}", k, e)))?;
            }
            "defaultTaskDuration" => {
                course.default_task_duration = parse_i64_range(v, k, 1, 600)?;
            }
            "gradeLevelIds" => {
                grade_level_ids = Some(id_set_from_value(v, k)?);
            }
            _ => return Err(HandlerErr::bad_params(format!("unknown field: {}", k))),
        }
    }

    let school_year = match course.school_year_id.as_deref() {
        Some(id) => db::school_year_get(conn, id).map_err(|e| HandlerErr::db("db_query_failed", e))?,
        None => None,
    };
    validate_course_schedule(school_year.as_ref().map(|sy| sy.days_of_week), course.days_of_week)?;
    let Some(school_year) = school_year else {
        return Err(RuleError::MissingSchoolYear.into());
    };
    let grade_levels = match &grade_level_ids {
        Some(ids) => Some(course_grade_levels(conn, &user, &school_year, ids)?),
        None => None,
    };

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e))?;
    tx.execute(
        "UPDATE courses SET name = ?, days_of_week = ?, default_task_duration = ? WHERE id = ?",
        (
            &course.name,
            course.days_of_week.bits(),
            course.default_task_duration,
            &course.id,
        ),
    )
    .map_err(|e| HandlerErr::db_table("db_update_failed", "courses", e))?;
    if let Some(levels) = &grade_levels {
        replace_grade_level_links(&tx, &course.id, levels)?;
    }
    tx.commit().map_err(|e| HandlerErr::db("db_tx_failed", e))?;

    Ok(json!({ "course": course }))
}

fn courses_get(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let user = require_user(conn, &req.params)?;
    let course_id = get_required_str(&req.params, "courseId")?;
    let course = rules::visible_to(&user, load_course(conn, &course_id)?)
        .ok_or_else(|| HandlerErr::not_found(RecordKind::Course.label()))?;

    let tasks = db::tasks_for_course(conn, &course.id).map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let resources =
        db::resources_for_course(conn, &course.id).map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let grade_level_ids =
        db::course_grade_level_ids(conn, &course.id).map_err(|e| HandlerErr::db("db_query_failed", e))?;

    Ok(json!({
        "course": course,
        "gradeLevelIds": grade_level_ids,
        "tasks": tasks,
        "resources": resources,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "courses.create" => courses_create(state, req),
        "courses.update" => courses_update(state, req),
        "courses.get" => courses_get(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
