use std::path::PathBuf;

pub const ENV_WORKSPACE: &str = "HOMESCHOOLD_WORKSPACE";
pub const ENV_LOG: &str = "HOMESCHOOLD_LOG";
pub const ENV_LOG_FORMAT: &str = "HOMESCHOOLD_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Process level settings. Workspace level settings live in the
/// `settings` table and are edited through `setup.*`.
#[derive(Debug, Clone)]
pub struct Config {
    pub workspace: Option<PathBuf>,
    pub log_filter: String,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let workspace = non_empty(ENV_WORKSPACE).map(PathBuf::from);
        let log_filter = non_empty(ENV_LOG)
            .or_else(|| non_empty("RUST_LOG"))
            .unwrap_or_else(|| "info".to_string());
        let log_format = match non_empty(ENV_LOG_FORMAT).as_deref().map(str::trim) {
            Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Self {
            workspace,
            log_filter,
            log_format,
        }
    }
}
