use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::handlers::courses::load_course;
use crate::ipc::params::{get_required_str, get_required_text, require_conn, require_user};
use crate::ipc::types::{AppState, Request};
use crate::models::CourseResource;
use crate::rules::{self, RecordKind};
use serde_json::{json, Value};
use uuid::Uuid;

fn resources_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let user = require_user(conn, &req.params)?;
    let course_id = get_required_str(&req.params, "courseId")?;
    let title = get_required_text(&req.params, "title", 512)?;
    let details = req
        .params
        .get("details")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    let found = load_course(conn, &course_id)?;
    let course = rules::check_reference(&user, found, RecordKind::Course, Some(RecordKind::Resource))?;

    let resource = CourseResource {
        id: Uuid::new_v4().to_string(),
        course_id: course.id,
        title,
        details,
    };
    conn.execute(
        "INSERT INTO course_resources(id, course_id, title, details) VALUES(?, ?, ?, ?)",
        (&resource.id, &resource.course_id, &resource.title, &resource.details),
    )
    .map_err(|e| HandlerErr::db_table("db_insert_failed", "course_resources", e))?;

    Ok(json!({ "resourceId": resource.id, "resource": resource }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "resources.create" => Some(respond(&req.id, resources_create(state, req))),
        _ => None,
    }
}
