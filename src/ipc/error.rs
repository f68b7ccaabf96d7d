use crate::rules::RuleError;
use serde_json::json;
use std::fmt::Display;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

#[derive(Debug)]
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn not_found(kind: &str) -> Self {
        Self {
            code: "not_found",
            message: format!("{} not found", kind),
            details: None,
        }
    }

    /// Storage failure; `code` is one of the `db_*` wire codes.
    pub fn db(code: &'static str, e: impl Display) -> Self {
        let message = e.to_string();
        tracing::warn!(code, error = %message, "storage failure");
        Self {
            code,
            message,
            details: None,
        }
    }

    pub fn db_table(code: &'static str, table: &str, e: impl Display) -> Self {
        let mut h = Self::db(code, e);
        h.details = Some(json!({ "table": table }));
        h
    }
}

impl From<RuleError> for HandlerErr {
    fn from(e: RuleError) -> Self {
        tracing::info!(code = e.code(), message = %e, "request rejected");
        Self {
            code: e.code(),
            message: e.to_string(),
            details: e.details(),
        }
    }
}

pub fn respond(id: &str, result: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match result {
        Ok(v) => ok(id, v),
        Err(e) => e.response(id),
    }
}
