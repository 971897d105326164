//! Logger setup

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Log verbosity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Pick the filter: command line, then `RUST_LOG`, then the config file
pub fn resolve_log_level(cli: Option<LogLevel>, env: Option<String>, config: Option<LogLevel>) -> String {
    if let Some(level) = cli {
        return level.as_str().to_string();
    }
    if let Some(level) = env.filter(|l| !l.trim().is_empty()) {
        return level;
    }
    if let Some(level) = config {
        return level.as_str().to_string();
    }
    DEFAULT_LOG_LEVEL.to_string()
}

/// Initialise `env_logger` on stderr; stdout is reserved for the report
pub fn init_logger(filters: &str) {
    let mut builder = env_logger::Builder::new();
    builder.target(env_logger::Target::Stderr);
    builder.filter_level(log::LevelFilter::Warn);
    builder.parse_filters(filters);
    builder.format(|buf, record| {
        use std::io::Write;
        let module = record.module_path().unwrap_or(record.target());
        writeln!(
            buf,
            "{} [{}] {}: {}",
            buf.timestamp_millis(),
            record.level(),
            module,
            record.args()
        )
    });

    if builder.try_init().is_err() {
        log::debug!("logger already initialised");
    }
}
