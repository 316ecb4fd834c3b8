//! Status lines and the structured event log.
//!
//! Two sinks, mirroring what the dashboard showed the operator:
//!
//! - **Status lines** go to stdout, prefixed with the display-zone time
//!   (`[01/05/2025 10:15:30 WIB] WebSocket connected`).
//! - **Events** are appended as JSON lines to `~/.gasmon/events.jsonl` for
//!   later inspection. Best-effort: write failures are ignored.
//!
//! Log file: `~/.gasmon/events.jsonl` (configurable via `[logging] path`).

use std::fs::{OpenOptions, create_dir_all};
use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;
use colored::Colorize;
use serde::Serialize;

use crate::config::schema::LoggingConfig;
use crate::reading::format::{DisplayZone, format_datetime};

// ---------------------------------------------------------------------------
// Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    /// Parse a level name. Unknown names map to `Info`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Self::Debug,
            "warn" | "warning" => Self::Warn,
            "error" => Self::Error,
            _ => Self::Info,
        }
    }
}

// ---------------------------------------------------------------------------
// Event log
// ---------------------------------------------------------------------------

/// A single entry in `events.jsonl`.
#[derive(Debug, Serialize)]
pub struct EventEntry<'a> {
    pub timestamp: String,
    pub level: Level,
    /// Short machine-readable category, e.g. `"connect"`, `"dropped"`.
    pub kind: &'a str,
    pub message: &'a str,
}

/// Append-only JSONL event sink.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: Option<PathBuf>,
    min_level: Level,
}

impl EventLog {
    pub fn from_config(config: &LoggingConfig) -> Self {
        let path = if config.enabled {
            expand_home(&config.path)
        } else {
            None
        };
        Self {
            path,
            min_level: Level::parse(&config.level),
        }
    }

    /// A sink that discards everything. Used by tests and `--quiet` paths.
    pub fn disabled() -> Self {
        Self {
            path: None,
            min_level: Level::Error,
        }
    }

    /// Sink writing to an explicit file.
    pub fn to_file(path: impl Into<PathBuf>, min_level: Level) -> Self {
        Self {
            path: Some(path.into()),
            min_level,
        }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    pub fn debug(&self, kind: &str, message: &str) {
        self.record(Level::Debug, kind, message);
    }

    pub fn info(&self, kind: &str, message: &str) {
        self.record(Level::Info, kind, message);
    }

    pub fn warn(&self, kind: &str, message: &str) {
        self.record(Level::Warn, kind, message);
    }

    pub fn error(&self, kind: &str, message: &str) {
        self.record(Level::Error, kind, message);
    }

    /// Record an event if it meets the minimum level. Never fails.
    pub fn record(&self, level: Level, kind: &str, message: &str) {
        if level < self.min_level {
            return;
        }
        let entry = EventEntry {
            timestamp: Utc::now().to_rfc3339(),
            level,
            kind,
            message,
        };
        let _ = self.append(&entry);
    }

    fn append(&self, entry: &EventEntry<'_>) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let json = serde_json::to_string(entry)?;
        writeln!(file, "{json}")?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Status lines
// ---------------------------------------------------------------------------

/// Operator-facing status output with a zone-stamped prefix.
#[derive(Debug, Clone)]
pub struct StatusLine {
    zone: DisplayZone,
    events: EventLog,
}

impl StatusLine {
    pub fn new(zone: DisplayZone, events: EventLog) -> Self {
        Self { zone, events }
    }

    pub fn zone(&self) -> &DisplayZone {
        &self.zone
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Print an informational status line and record it.
    pub fn info(&self, kind: &str, message: &str) {
        println!("{} {}", self.prefix().dimmed(), message);
        self.events.info(kind, message);
    }

    /// Print an error status line and record it.
    pub fn error(&self, kind: &str, message: &str) {
        println!("{} {}", self.prefix().dimmed(), message.red());
        self.events.error(kind, message);
    }

    fn prefix(&self) -> String {
        format!("[{}]", format_datetime(&self.zone.now(), &self.zone))
    }
}

/// Expand a leading `~` to the home directory.
fn expand_home(path: &str) -> Option<PathBuf> {
    if path.trim().is_empty() {
        return None;
    }
    match path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None if path == "~" => dirs::home_dir(),
        None => Some(PathBuf::from(path)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
