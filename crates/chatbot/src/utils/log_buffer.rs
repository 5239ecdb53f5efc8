//! Recent log lines kept in memory for the admin log view.

use std::collections::VecDeque;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::time_format::now_standard_string;

pub const LOG_BUFFER_CAPACITY: usize = 500;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "error" => Some(Self::Error),
            "warn" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            _ => None,
        }
    }
}

impl From<&tracing::Level> for LogLevel {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::ERROR => Self::Error,
            tracing::Level::WARN => Self::Warn,
            tracing::Level::INFO => Self::Info,
            tracing::Level::DEBUG | tracing::Level::TRACE => Self::Debug,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
    pub target: Option<String>,
}

static LOG_BUFFER: Lazy<Mutex<VecDeque<LogEntry>>> =
    Lazy::new(|| Mutex::new(VecDeque::with_capacity(LOG_BUFFER_CAPACITY)));

pub fn add_log_entry(level: LogLevel, message: String, target: Option<String>) {
    let entry = LogEntry {
        timestamp: now_standard_string(),
        level,
        message,
        target,
    };
    let mut buffer = LOG_BUFFER.lock();
    if buffer.len() == LOG_BUFFER_CAPACITY {
        buffer.pop_front();
    }
    buffer.push_back(entry);
}

/// Newest first, optionally only one level.
pub fn recent_logs(level: Option<LogLevel>, limit: usize) -> Vec<LogEntry> {
    LOG_BUFFER
        .lock()
        .iter()
        .rev()
        .filter(|entry| level.map_or(true, |l| entry.level == l))
        .take(limit)
        .cloned()
        .collect()
}
