mod config;
mod db;
mod ipc;
mod logging;
mod models;
mod rules;

use std::io::{self, BufRead, Write};

fn main() {
    let config = config::Config::from_env();
    if let Err(e) = logging::init(&config) {
        eprintln!("homeschoold: logging disabled: {e}");
    }

    let mut state = ipc::AppState::default();
    if let Some(path) = config.workspace.as_deref() {
        // A bad start-up workspace leaves the sidecar running; the front end
        // can still pick another one with workspace.select.
        if let Err(e) = ipc::select_workspace(&mut state, path) {
            tracing::warn!(workspace = %path.display(), error = %e, "start-up workspace not opened");
        }
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "homeschoold ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                tracing::info!(error = %e, "bad request line");
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
