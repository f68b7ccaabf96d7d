use crate::db;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::handlers::courses::load_course;
use crate::ipc::params::{
    get_id_set, get_patch, get_required_str, get_required_text, parse_i64_range, require_conn,
    require_user,
};
use crate::ipc::types::{AppState, Request};
use crate::rules::{self, validate_selection, RecordKind};
use rusqlite::params_from_iter;
use serde_json::{json, Value};
use uuid::Uuid;

const MAX_TASK_DURATION: i64 = 24 * 60;

fn tasks_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let user = require_user(conn, &req.params)?;
    let course_id = get_required_str(&req.params, "courseId")?;
    let description = get_required_text(&req.params, "description", 1000)?;

    let found = load_course(conn, &course_id)?;
    let course = rules::check_reference(&user, found, RecordKind::Course, Some(RecordKind::Task))?;

    let duration = match req.params.get("duration") {
        Some(v) if !v.is_null() => parse_i64_range(v, "duration", 0, MAX_TASK_DURATION)?,
        _ => course.default_task_duration,
    };
    let sort_order = db::next_task_sort_order(conn, &course.id)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;

    let task_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO course_tasks(id, course_id, description, duration, sort_order)
         VALUES(?, ?, ?, ?, ?)",
        (&task_id, &course.id, &description, duration, sort_order),
    )
    .map_err(|e| HandlerErr::db_table("db_insert_failed", "course_tasks", e))?;

    Ok(json!({
        "taskId": task_id,
        "courseId": course.id,
        "description": description,
        "duration": duration,
        "sortOrder": sort_order,
    }))
}

fn tasks_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let user = require_user(conn, &req.params)?;
    let task_id = get_required_str(&req.params, "taskId")?;
    let patch = get_patch(&req.params)?;

    let found = db::task_get(conn, &task_id).map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let mut task = rules::check_reference(&user, found, RecordKind::Task, None)?;

    for (k, v) in patch {
        match k.as_str() {
            "description" => {
                let d = v
                    .as_str()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| HandlerErr::bad_params("description must be a non-empty string"))?;
                task.description = d.to_string();
            }
            "duration" => task.duration = parse_i64_range(v, k, 0, MAX_TASK_DURATION)?,
            _ => return Err(HandlerErr::bad_params(format!("unknown field: {}", k))),
        }
    }

    conn.execute(
        "UPDATE course_tasks SET description = ?, duration = ? WHERE id = ?",
        (&task.description, task.duration, &task.id),
    )
    .map_err(|e| HandlerErr::db_table("db_update_failed", "course_tasks", e))?;

    Ok(json!({ "task": task }))
}

fn tasks_bulk_delete(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let user = require_user(conn, &req.params)?;
    let submitted = get_id_set(&req.params, "taskIds")?;

    // Two stages: fetch what this school owns, then check membership.
    let owned = db::owned_task_ids(conn, &user.school_id, &submitted)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let to_delete = validate_selection(&submitted, &owned, RecordKind::Task)?;

    let placeholders = vec!["?"; to_delete.len()].join(", ");
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e))?;
    let deleted = tx
        .execute(
            &format!("DELETE FROM course_tasks WHERE id IN ({placeholders})"),
            params_from_iter(to_delete.iter()),
        )
        .map_err(|e| HandlerErr::db_table("db_delete_failed", "course_tasks", e))?;
    tx.commit().map_err(|e| HandlerErr::db("db_tx_failed", e))?;

    tracing::info!(user_id = %user.id, count = deleted, "tasks deleted");
    Ok(json!({
        "deletedCount": deleted,
        "taskIds": to_delete,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "tasks.create" => tasks_create(state, req),
        "tasks.update" => tasks_update(state, req),
        "tasks.bulkDelete" => tasks_bulk_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
