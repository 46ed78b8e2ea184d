//! Bounded in-memory ring of structured log events.
//!
//! Feeds the admin debug API. Newest entries first; when the buffer is full
//! the oldest entry is evicted. Appends also emit `tracing` events so the
//! same information reaches stdout/journald.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Hard cap on retained entries.
const MAX_ENTRIES: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Error,
    Warning,
    Success,
    Info,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARNING",
            LogLevel::Success => "SUCCESS",
            LogLevel::Info => "INFO",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ERROR" => Ok(LogLevel::Error),
            "WARNING" => Ok(LogLevel::Warning),
            "SUCCESS" => Ok(LogLevel::Success),
            "INFO" => Ok(LogLevel::Info),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogCategory {
    Server,
    Bot,
    Api,
    Auth,
    Database,
    Telegram,
    Settings,
    Support,
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogCategory::Server => "SERVER",
            LogCategory::Bot => "BOT",
            LogCategory::Api => "API",
            LogCategory::Auth => "AUTH",
            LogCategory::Database => "DATABASE",
            LogCategory::Telegram => "TELEGRAM",
            LogCategory::Settings => "SETTINGS",
            LogCategory::Support => "SUPPORT",
        };
        f.write_str(s)
    }
}

impl FromStr for LogCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SERVER" => Ok(LogCategory::Server),
            "BOT" => Ok(LogCategory::Bot),
            "API" => Ok(LogCategory::Api),
            "AUTH" => Ok(LogCategory::Auth),
            "DATABASE" => Ok(LogCategory::Database),
            "TELEGRAM" => Ok(LogCategory::Telegram),
            "SETTINGS" => Ok(LogCategory::Settings),
            "SUPPORT" => Ok(LogCategory::Support),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: LogLevel,
    pub category: LogCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Process-wide bounded log ring. Thread-safe; readers get a snapshot.
pub struct LogBuffer {
    entries: Mutex<VecDeque<LogEntry>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(MAX_ENTRIES)),
        }
    }

    /// Insert an entry at the front, evicting the oldest when full.
    pub fn append(
        &self,
        level: LogLevel,
        category: LogCategory,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) {
        let message = message.into();
        match level {
            LogLevel::Error => tracing::error!(category = %category, "{message}"),
            LogLevel::Warning => tracing::warn!(category = %category, "{message}"),
            _ => tracing::info!(category = %category, "{message}"),
        }

        let entry = LogEntry {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level,
            category,
            message,
            details,
        };

        let mut entries = self.entries.lock().unwrap();
        if entries.len() >= MAX_ENTRIES {
            entries.pop_back();
        }
        entries.push_front(entry);
    }

    /// Snapshot of up to `limit` matching entries, newest first.
    pub fn read(
        &self,
        limit: usize,
        level: Option<LogLevel>,
        category: Option<LogCategory>,
    ) -> Vec<LogEntry> {
        let entries = self.entries.lock().unwrap();
        entries
            .iter()
            .filter(|e| level.map(|l| e.level == l).unwrap_or(true))
            .filter(|e| category.map(|c| e.category == c).unwrap_or(true))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newest_first() {
        let buf = LogBuffer::new();
        buf.append(LogLevel::Info, LogCategory::Server, "first", None);
        buf.append(LogLevel::Info, LogCategory::Server, "second", None);
        let entries = buf.read(10, None, None);
        assert_eq!(entries[0].message, "second");
        assert_eq!(entries[1].message, "first");
    }

    #[test]
    fn capped_at_max_entries() {
        let buf = LogBuffer::new();
        for i in 0..1100 {
            buf.append(LogLevel::Info, LogCategory::Bot, format!("m{i}"), None);
        }
        assert_eq!(buf.len(), 1000);
        // Oldest entries were evicted.
        let entries = buf.read(1000, None, None);
        assert_eq!(entries[0].message, "m1099");
        assert_eq!(entries.last().unwrap().message, "m100");
    }

    #[test]
    fn filters_by_level_and_category() {
        let buf = LogBuffer::new();
        buf.append(LogLevel::Error, LogCategory::Telegram, "tg error", None);
        buf.append(LogLevel::Info, LogCategory::Telegram, "tg info", None);
        buf.append(LogLevel::Error, LogCategory::Api, "api error", None);

        let errors = buf.read(10, Some(LogLevel::Error), None);
        assert_eq!(errors.len(), 2);

        let tg_errors = buf.read(10, Some(LogLevel::Error), Some(LogCategory::Telegram));
        assert_eq!(tg_errors.len(), 1);
        assert_eq!(tg_errors[0].message, "tg error");
    }

    #[test]
    fn limit_respected() {
        let buf = LogBuffer::new();
        for i in 0..20 {
            buf.append(LogLevel::Info, LogCategory::Server, format!("m{i}"), None);
        }
        assert_eq!(buf.read(5, None, None).len(), 5);
    }

    #[test]
    fn level_round_trips_from_str() {
        assert_eq!("warning".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert_eq!("TELEGRAM".parse::<LogCategory>(), Ok(LogCategory::Telegram));
        assert!("bogus".parse::<LogLevel>().is_err());
    }
}
