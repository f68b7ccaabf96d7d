use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

/// One line of stdin. `params` is left as raw JSON; each handler pulls what
/// it needs through `ipc::params`.
#[derive(Debug, Deserialize)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Sidecar state between requests: the selected workspace directory and its
/// open `homeschool.sqlite3` connection. Both stay `None` until
/// `workspace.select` (or `HOMESCHOOLD_WORKSPACE` at start-up) succeeds.
#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
}
