use crate::db;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::handlers::setup;
use crate::ipc::params::{get_required_text, get_today, require_conn, require_user};
use crate::ipc::types::{AppState, Request};
use crate::models::{Account, AccountStatus};
use chrono::NaiveDate;
use rusqlite::OptionalExtension;
use serde_json::{json, Value};
use uuid::Uuid;

fn account_json(account: &Account, trial_days: i64) -> Value {
    json!({
        "userId": account.user_id,
        "status": account.status.code(),
        "statusLabel": account.status.label(),
        "isActive": account.status.is_active(),
        "trialEndsAt": account.trial_ends_at(trial_days),
    })
}

fn parse_status(v: &Value) -> Result<AccountStatus, HandlerErr> {
    let parsed = match v {
        Value::Number(n) => n.as_i64().and_then(AccountStatus::from_code),
        Value::String(s) => AccountStatus::from_label(s),
        _ => None,
    };
    parsed.ok_or_else(|| {
        let known: Vec<&str> = AccountStatus::ALL.iter().map(|s| s.label()).collect();
        HandlerErr::bad_params(format!("status must be one of: {}", known.join(", ")))
    })
}

fn users_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let email = get_required_text(&req.params, "email", 254)?.to_ascii_lowercase();
    if !email.contains('@') {
        return Err(HandlerErr::bad_params("email must contain @"));
    }
    let today = get_today(&req.params)?;

    let taken: Option<i64> = conn
        .query_row("SELECT 1 FROM users WHERE email = ?", [&email], |r| r.get(0))
        .optional()
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    if taken.is_some() {
        return Err(HandlerErr {
            code: "already_exists",
            message: "a user with that email already exists".to_string(),
            details: None,
        });
    }

    let school_id = Uuid::new_v4().to_string();
    let user_id = Uuid::new_v4().to_string();
    let status = AccountStatus::default();

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e))?;
    tx.execute(
        "INSERT INTO schools(id, created_at) VALUES(?, ?)",
        (&school_id, today),
    )
    .map_err(|e| HandlerErr::db_table("db_insert_failed", "schools", e))?;
    tx.execute(
        "INSERT INTO users(id, school_id, email, created_at) VALUES(?, ?, ?, ?)",
        (&user_id, &school_id, &email, today),
    )
    .map_err(|e| HandlerErr::db_table("db_insert_failed", "users", e))?;
    tx.execute(
        "INSERT INTO accounts(user_id, status, created_at) VALUES(?, ?, ?)",
        (&user_id, status.code(), today),
    )
    .map_err(|e| HandlerErr::db_table("db_insert_failed", "accounts", e))?;
    tx.commit().map_err(|e| HandlerErr::db("db_tx_failed", e))?;

    tracing::info!(user_id = %user_id, school_id = %school_id, "user created");
    Ok(json!({
        "userId": user_id,
        "schoolId": school_id,
        "email": email,
        "accountStatus": status.code(),
    }))
}

fn load_account(conn: &rusqlite::Connection, user_id: &str) -> Result<Account, HandlerErr> {
    db::account_get(conn, user_id)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?
        .ok_or_else(|| HandlerErr::not_found("account"))
}

fn accounts_get(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let user = require_user(conn, &req.params)?;
    let account = load_account(conn, &user.id)?;
    let defaults = setup::defaults(conn)?;
    Ok(account_json(&account, defaults.trial_days))
}

fn set_status(
    conn: &rusqlite::Connection,
    user_id: &str,
    status: AccountStatus,
    today: NaiveDate,
) -> Result<(), HandlerErr> {
    conn.execute(
        "UPDATE accounts SET status = ?, status_changed_at = ? WHERE user_id = ?",
        (status.code(), today, user_id),
    )
    .map_err(|e| HandlerErr::db_table("db_update_failed", "accounts", e))?;
    Ok(())
}

fn accounts_set_status(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let user = require_user(conn, &req.params)?;
    let Some(raw) = req.params.get("status") else {
        return Err(HandlerErr::bad_params("missing status"));
    };
    let status = parse_status(raw)?;
    let today = get_today(&req.params)?;

    let mut account = load_account(conn, &user.id)?;
    set_status(conn, &user.id, status, today)?;
    tracing::info!(
        user_id = %user.id,
        from = account.status.label(),
        to = status.label(),
        "account status changed"
    );
    account.status = status;

    let defaults = setup::defaults(conn)?;
    Ok(account_json(&account, defaults.trial_days))
}

/// Moves every lapsed trial to Trial Expired. Runs for the whole workspace,
/// not on behalf of a user.
fn accounts_expire_trials(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(state)?;
    let today = get_today(&req.params)?;
    let defaults = setup::defaults(conn)?;

    let trialing = db::accounts_with_status(conn, AccountStatus::Trialing)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let lapsed: Vec<String> = trialing
        .into_iter()
        .filter(|a| a.trial_lapsed(today, defaults.trial_days))
        .map(|a| a.user_id)
        .collect();

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e))?;
    for user_id in &lapsed {
        set_status(&tx, user_id, AccountStatus::TrialExpired, today)?;
    }
    tx.commit().map_err(|e| HandlerErr::db("db_tx_failed", e))?;

    tracing::info!(count = lapsed.len(), "expired lapsed trials");
    Ok(json!({
        "expiredCount": lapsed.len(),
        "userIds": lapsed,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "users.create" => users_create(state, req),
        "accounts.get" => accounts_get(state, req),
        "accounts.setStatus" => accounts_set_status(state, req),
        "accounts.expireTrials" => accounts_expire_trials(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
