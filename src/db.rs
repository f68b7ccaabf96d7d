use crate::models::{Account, AccountStatus, Course, CourseResource, CourseTask, GradeLevel, SchoolYear, User};
use crate::rules::WeekdaySet;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::path::Path;

pub const DB_FILE: &str = "homeschool.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schools(
            id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            school_id TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL,
            FOREIGN KEY(school_id) REFERENCES schools(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS accounts(
            user_id TEXT PRIMARY KEY,
            status INTEGER NOT NULL DEFAULT 3,
            created_at TEXT NOT NULL,
            status_changed_at TEXT,
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_accounts_status ON accounts(status)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS school_years(
            id TEXT PRIMARY KEY,
            school_id TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            days_of_week INTEGER NOT NULL DEFAULT 62,
            FOREIGN KEY(school_id) REFERENCES schools(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_school_years_school ON school_years(school_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grade_levels(
            id TEXT PRIMARY KEY,
            school_year_id TEXT NOT NULL,
            name TEXT NOT NULL,
            FOREIGN KEY(school_year_id) REFERENCES school_years(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grade_levels_school_year ON grade_levels(school_year_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            days_of_week INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;
    ensure_courses_default_task_duration(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS course_grade_levels(
            course_id TEXT NOT NULL,
            grade_level_id TEXT NOT NULL,
            PRIMARY KEY(course_id, grade_level_id),
            FOREIGN KEY(course_id) REFERENCES courses(id),
            FOREIGN KEY(grade_level_id) REFERENCES grade_levels(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_course_grade_levels_grade_level ON course_grade_levels(grade_level_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS course_tasks(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            description TEXT NOT NULL,
            duration INTEGER NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    ensure_course_tasks_sort_order(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_course_tasks_course_sort ON course_tasks(course_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS course_resources(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            title TEXT NOT NULL,
            details TEXT NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_course_resources_course ON course_resources(course_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

fn ensure_courses_default_task_duration(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "courses", "default_task_duration")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE courses ADD COLUMN default_task_duration INTEGER NOT NULL DEFAULT 30",
        [],
    )?;
    Ok(())
}

fn ensure_course_tasks_sort_order(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "course_tasks", "sort_order")? {
        return Ok(());
    }

    conn.execute(
        "ALTER TABLE course_tasks ADD COLUMN sort_order INTEGER NOT NULL DEFAULT 0",
        [],
    )?;

    // Backfill per course using insert order.
    let mut course_stmt = conn.prepare("SELECT DISTINCT course_id FROM course_tasks")?;
    let course_ids = course_stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut task_stmt =
        conn.prepare("SELECT id FROM course_tasks WHERE course_id = ? ORDER BY rowid")?;
    for cid in course_ids {
        let task_ids = task_stmt
            .query_map([&cid], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        for (i, tid) in task_ids.iter().enumerate() {
            conn.execute(
                "UPDATE course_tasks SET sort_order = ? WHERE id = ?",
                (i as i64, tid),
            )?;
        }
    }
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key = ?", [key], |r| r.get(0))
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, value.to_string()),
    )?;
    Ok(())
}

// Ownership chain: course -> grade level -> school year -> school. A course
// spans grade levels of a single school year, so the first link is enough.
fn course_owner_sql(course_col: &str) -> String {
    format!(
        "(SELECT sy.school_id
           FROM course_grade_levels cgl
           JOIN grade_levels gl ON gl.id = cgl.grade_level_id
           JOIN school_years sy ON sy.id = gl.school_year_id
          WHERE cgl.course_id = {course_col}
          LIMIT 1)"
    )
}

fn course_school_year_sql(course_col: &str) -> String {
    format!(
        "(SELECT gl.school_year_id
           FROM course_grade_levels cgl
           JOIN grade_levels gl ON gl.id = cgl.grade_level_id
          WHERE cgl.course_id = {course_col}
          LIMIT 1)"
    )
}

fn weekday_set(row: &Row<'_>, idx: usize) -> rusqlite::Result<WeekdaySet> {
    let bits: i64 = row.get(idx)?;
    WeekdaySet::from_bits(bits).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Integer,
            format!("days_of_week out of range: {bits}").into(),
        )
    })
}

pub fn user_get(conn: &Connection, user_id: &str) -> anyhow::Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, school_id, email, created_at FROM users WHERE id = ?",
            [user_id],
            |r| {
                Ok(User {
                    id: r.get(0)?,
                    school_id: r.get(1)?,
                    email: r.get(2)?,
                    created_at: r.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(user)
}

fn account_from_row(r: &Row<'_>) -> rusqlite::Result<Account> {
    let code: i64 = r.get(1)?;
    Ok(Account {
        user_id: r.get(0)?,
        // Unknown codes from a newer build fall back to the default.
        status: AccountStatus::from_code(code).unwrap_or_default(),
        created_at: r.get(2)?,
    })
}

pub fn account_get(conn: &Connection, user_id: &str) -> anyhow::Result<Option<Account>> {
    let account = conn
        .query_row(
            "SELECT user_id, status, created_at FROM accounts WHERE user_id = ?",
            [user_id],
            account_from_row,
        )
        .optional()?;
    Ok(account)
}

pub fn accounts_with_status(conn: &Connection, status: AccountStatus) -> anyhow::Result<Vec<Account>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, status, created_at FROM accounts WHERE status = ? ORDER BY created_at",
    )?;
    let rows = stmt
        .query_map([status.code()], account_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn school_year_from_row(r: &Row<'_>) -> rusqlite::Result<SchoolYear> {
    Ok(SchoolYear {
        id: r.get(0)?,
        school_id: r.get(1)?,
        start_date: r.get(2)?,
        end_date: r.get(3)?,
        days_of_week: weekday_set(r, 4)?,
    })
}

pub fn school_year_get(conn: &Connection, school_year_id: &str) -> anyhow::Result<Option<SchoolYear>> {
    let sy = conn
        .query_row(
            "SELECT id, school_id, start_date, end_date, days_of_week
             FROM school_years
             WHERE id = ?",
            [school_year_id],
            school_year_from_row,
        )
        .optional()?;
    Ok(sy)
}

/// Tenant-scoped fetch: only ever returns years of `school_id`.
pub fn school_years_for_school(conn: &Connection, school_id: &str) -> anyhow::Result<Vec<SchoolYear>> {
    let mut stmt = conn.prepare(
        "SELECT id, school_id, start_date, end_date, days_of_week
         FROM school_years
         WHERE school_id = ?
         ORDER BY start_date DESC",
    )?;
    let rows = stmt
        .query_map([school_id], school_year_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn grade_level_from_row(r: &Row<'_>) -> rusqlite::Result<GradeLevel> {
    Ok(GradeLevel {
        id: r.get(0)?,
        school_year_id: r.get(1)?,
        name: r.get(2)?,
        school_id: r.get(3)?,
    })
}

pub fn grade_level_get(conn: &Connection, grade_level_id: &str) -> anyhow::Result<Option<GradeLevel>> {
    let gl = conn
        .query_row(
            "SELECT gl.id, gl.school_year_id, gl.name, sy.school_id
             FROM grade_levels gl
             JOIN school_years sy ON sy.id = gl.school_year_id
             WHERE gl.id = ?",
            [grade_level_id],
            grade_level_from_row,
        )
        .optional()?;
    Ok(gl)
}

pub fn grade_levels_for_school_year(conn: &Connection, school_year_id: &str) -> anyhow::Result<Vec<GradeLevel>> {
    let mut stmt = conn.prepare(
        "SELECT gl.id, gl.school_year_id, gl.name, sy.school_id
         FROM grade_levels gl
         JOIN school_years sy ON sy.id = gl.school_year_id
         WHERE gl.school_year_id = ?
         ORDER BY gl.rowid",
    )?;
    let rows = stmt
        .query_map([school_year_id], grade_level_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn course_select_sql() -> String {
    format!(
        "SELECT c.id, c.name, c.days_of_week, c.default_task_duration, {}, {}
         FROM courses c",
        course_school_year_sql("c.id"),
        course_owner_sql("c.id"),
    )
}

fn course_from_row(r: &Row<'_>) -> rusqlite::Result<Course> {
    Ok(Course {
        id: r.get(0)?,
        name: r.get(1)?,
        days_of_week: weekday_set(r, 2)?,
        default_task_duration: r.get(3)?,
        school_year_id: r.get(4)?,
        school_id: r.get(5)?,
    })
}

pub fn course_get(conn: &Connection, course_id: &str) -> anyhow::Result<Option<Course>> {
    let sql = format!("{} WHERE c.id = ?", course_select_sql());
    let course = conn.query_row(&sql, [course_id], course_from_row).optional()?;
    Ok(course)
}

pub fn courses_for_grade_level(conn: &Connection, grade_level_id: &str) -> anyhow::Result<Vec<Course>> {
    let sql = format!(
        "{} JOIN course_grade_levels link ON link.course_id = c.id
         WHERE link.grade_level_id = ?
         ORDER BY c.name",
        course_select_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([grade_level_id], course_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn courses_for_school_year(conn: &Connection, school_year_id: &str) -> anyhow::Result<Vec<Course>> {
    let sql = format!(
        "{} WHERE c.id IN (
           SELECT cgl.course_id
           FROM course_grade_levels cgl
           JOIN grade_levels gl ON gl.id = cgl.grade_level_id
           WHERE gl.school_year_id = ?
         )
         ORDER BY c.name",
        course_select_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([school_year_id], course_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn course_grade_level_ids(conn: &Connection, course_id: &str) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT grade_level_id FROM course_grade_levels WHERE course_id = ? ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map([course_id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn task_from_row(r: &Row<'_>) -> rusqlite::Result<CourseTask> {
    Ok(CourseTask {
        id: r.get(0)?,
        course_id: r.get(1)?,
        description: r.get(2)?,
        duration: r.get(3)?,
        sort_order: r.get(4)?,
        school_id: r.get(5)?,
    })
}

pub fn task_get(conn: &Connection, task_id: &str) -> anyhow::Result<Option<CourseTask>> {
    let sql = format!(
        "SELECT t.id, t.course_id, t.description, t.duration, t.sort_order, {}
         FROM course_tasks t
         WHERE t.id = ?",
        course_owner_sql("t.course_id")
    );
    let task = conn.query_row(&sql, [task_id], task_from_row).optional()?;
    Ok(task)
}

pub fn tasks_for_course(conn: &Connection, course_id: &str) -> anyhow::Result<Vec<CourseTask>> {
    let sql = format!(
        "SELECT t.id, t.course_id, t.description, t.duration, t.sort_order, {}
         FROM course_tasks t
         WHERE t.course_id = ?
         ORDER BY t.sort_order",
        course_owner_sql("t.course_id")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([course_id], task_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// The subset of `candidates` that are tasks owned by `school_id`.
pub fn owned_task_ids(
    conn: &Connection,
    school_id: &str,
    candidates: &BTreeSet<String>,
) -> anyhow::Result<BTreeSet<String>> {
    if candidates.is_empty() {
        return Ok(BTreeSet::new());
    }
    let placeholders = vec!["?"; candidates.len()].join(", ");
    let sql = format!(
        "SELECT t.id
         FROM course_tasks t
         WHERE t.id IN ({placeholders})
           AND {} = ?",
        course_owner_sql("t.course_id")
    );
    let mut bind: Vec<Value> = candidates.iter().cloned().map(Value::Text).collect();
    bind.push(Value::Text(school_id.to_string()));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(bind), |r| r.get::<_, String>(0))?
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(rows)
}

pub fn resources_for_course(conn: &Connection, course_id: &str) -> anyhow::Result<Vec<CourseResource>> {
    let mut stmt = conn.prepare(
        "SELECT id, course_id, title, details
         FROM course_resources
         WHERE course_id = ?
         ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map([course_id], |r| {
            Ok(CourseResource {
                id: r.get(0)?,
                course_id: r.get(1)?,
                title: r.get(2)?,
                details: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn next_task_sort_order(conn: &Connection, course_id: &str) -> anyhow::Result<i64> {
    let next: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM course_tasks WHERE course_id = ?",
        [course_id],
        |r| r.get(0),
    )?;
    Ok(next)
}
