mod test_support;

use serde_json::json;
use std::io::BufReader;
use std::process::{ChildStdin, ChildStdout};
use test_support::{
    create_user, error_code, error_message, open_workspace, request_err, request_ok,
    spawn_sidecar, str_field,
};

struct Seeded {
    school_year_id: String,
    grade_level_id: String,
    course_id: String,
}

fn seed_course(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    user_id: &str,
    tag: &str,
) -> Seeded {
    let sy = request_ok(
        stdin,
        reader,
        &format!("{tag}-sy"),
        "schoolYears.create",
        json!({ "userId": user_id, "startDate": "2024-08-15", "endDate": "2025-05-30" }),
    );
    let school_year_id = str_field(&sy, "schoolYearId").to_string();
    let gl = request_ok(
        stdin,
        reader,
        &format!("{tag}-gl"),
        "gradeLevels.create",
        json!({ "userId": user_id, "schoolYearId": school_year_id, "name": "5th" }),
    );
    let grade_level_id = str_field(&gl, "gradeLevelId").to_string();
    let course = request_ok(
        stdin,
        reader,
        &format!("{tag}-course"),
        "courses.create",
        json!({
            "userId": user_id,
            "schoolYearId": school_year_id,
            "gradeLevelIds": [grade_level_id],
            "name": format!("{tag} science"),
            "days": ["Tuesday", "Thursday"],
            "defaultTaskDuration": 45
        }),
    );
    Seeded {
        school_year_id,
        grade_level_id,
        course_id: str_field(&course, "courseId").to_string(),
    }
}

#[test]
fn writes_against_another_users_records_are_rejected() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _workspace = open_workspace(&mut stdin, &mut reader, "homeschool-tenant-writes");
    let (alice, _) = create_user(&mut stdin, &mut reader, "alice@example.com");
    let (bob, _) = create_user(&mut stdin, &mut reader, "bob@example.com");
    let a = seed_course(&mut stdin, &mut reader, &alice, "a");
    let b = seed_course(&mut stdin, &mut reader, &bob, "b");

    let err = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "tasks.create",
        json!({ "userId": bob, "courseId": a.course_id, "description": "Sneaky" }),
    );
    assert_eq!(error_code(&err), "cross_tenant_access");
    assert_eq!(
        error_message(&err),
        "You may not add a task to another user's course."
    );

    let err = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "resources.create",
        json!({ "userId": bob, "courseId": a.course_id, "title": "Sneaky" }),
    );
    assert_eq!(error_code(&err), "cross_tenant_access");
    assert_eq!(
        error_message(&err),
        "You may not add a resource to another user's course."
    );

    let err = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "tasks.create",
        json!({ "userId": bob, "courseId": "missing-course", "description": "Lost" }),
    );
    assert_eq!(error_code(&err), "invalid_reference");
    assert_eq!(error_message(&err), "Invalid course.");

    let err = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "courses.create",
        json!({
            "userId": bob,
            "schoolYearId": a.school_year_id,
            "gradeLevelIds": [a.grade_level_id],
            "name": "Borrowed"
        }),
    );
    assert_eq!(error_code(&err), "cross_tenant_access");
    assert_eq!(
        error_message(&err),
        "You may not add a course to another user's school year."
    );

    // Own school year, someone else's grade level.
    let err = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "courses.create",
        json!({
            "userId": bob,
            "schoolYearId": b.school_year_id,
            "gradeLevelIds": [a.grade_level_id],
            "name": "Mixed"
        }),
    );
    assert_eq!(error_code(&err), "cross_tenant_access");

    let err = request_err(
        &mut stdin,
        &mut reader,
        "6",
        "gradeLevels.create",
        json!({ "userId": bob, "schoolYearId": a.school_year_id, "name": "6th" }),
    );
    assert_eq!(error_code(&err), "cross_tenant_access");
    assert_eq!(
        error_message(&err),
        "You may not add a grade level to another user's school year."
    );

    let err = request_err(
        &mut stdin,
        &mut reader,
        "7",
        "courses.update",
        json!({ "userId": bob, "courseId": a.course_id, "patch": { "name": "Mine now" } }),
    );
    assert_eq!(error_code(&err), "cross_tenant_access");
    assert_eq!(
        error_message(&err),
        "You may not change another user's course."
    );

    let err = request_err(
        &mut stdin,
        &mut reader,
        "8",
        "schoolYears.update",
        json!({ "userId": bob, "schoolYearId": a.school_year_id, "patch": {} }),
    );
    assert_eq!(error_code(&err), "cross_tenant_access");

    // Bob's own course still works, and uses its default duration.
    let task = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "tasks.create",
        json!({ "userId": bob, "courseId": b.course_id, "description": "Read chapter 1" }),
    );
    assert_eq!(task["duration"], json!(45));
    assert_eq!(task["sortOrder"], json!(0));

    let detail = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "courses.get",
        json!({ "userId": alice, "courseId": a.course_id }),
    );
    assert_eq!(detail["course"]["name"], json!("a science"));
    assert_eq!(detail["tasks"], json!([]));
    assert_eq!(detail["resources"], json!([]));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn reads_of_another_users_records_look_missing() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _workspace = open_workspace(&mut stdin, &mut reader, "homeschool-tenant-reads");
    let (alice, _) = create_user(&mut stdin, &mut reader, "alice@example.com");
    let (bob, _) = create_user(&mut stdin, &mut reader, "bob@example.com");
    let a = seed_course(&mut stdin, &mut reader, &alice, "a");

    let err = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "schoolYears.get",
        json!({ "userId": bob, "schoolYearId": a.school_year_id }),
    );
    assert_eq!(error_code(&err), "not_found");

    let err = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "courses.get",
        json!({ "userId": bob, "courseId": a.course_id }),
    );
    assert_eq!(error_code(&err), "not_found");

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "schoolYears.list",
        json!({ "userId": bob }),
    );
    assert_eq!(listed["schoolYears"], json!([]));

    let own = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "schoolYears.get",
        json!({ "userId": alice, "schoolYearId": a.school_year_id }),
    );
    let levels = own["schoolYear"]["gradeLevels"].as_array().expect("grade levels");
    assert_eq!(levels.len(), 1);
    assert_eq!(levels[0]["courses"][0]["id"], json!(a.course_id));

    let err = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "accounts.get",
        json!({ "userId": "nobody" }),
    );
    assert_eq!(error_code(&err), "not_found");

    drop(stdin);
    let _ = child.wait();
}
