/// Configuration schema and defaults for gasmon.
///
/// Defines the TOML-serializable configuration with four sections:
/// `[backend]`, `[stream]`, `[display]`, and `[logging]`.
///
/// Every field has a built-in default. Users only need to set the values
/// they want to override.
use serde::{Deserialize, Serialize};

use crate::api::Interval;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level gasmon configuration.
///
/// Maps directly to `~/.gasmon/config.toml` and `.gasmon.toml`. All sections
/// and fields are optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GasmonConfig {
    pub backend: BackendConfig,
    pub stream: StreamConfig,
    pub display: DisplayConfig,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// [backend]
// ---------------------------------------------------------------------------

/// Where the monitoring backend lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// HTTP base URL for command and history endpoints.
    pub base_url: String,
    /// WebSocket URL. Empty means `base_url` with a `ws` scheme plus
    /// `/sensor/ws`.
    pub stream_url: String,
    /// Timeout for HTTP requests and for opening the stream (milliseconds).
    pub timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            stream_url: String::new(),
            timeout_ms: 10_000,
        }
    }
}

impl BackendConfig {
    /// The effective stream URL.
    pub fn resolved_stream_url(&self) -> String {
        if !self.stream_url.trim().is_empty() {
            return self.stream_url.trim().to_string();
        }
        let base = self.base_url.trim().trim_end_matches('/');
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            format!("ws://{base}")
        };
        format!("{ws_base}/sensor/ws")
    }
}

// ---------------------------------------------------------------------------
// [stream]
// ---------------------------------------------------------------------------

/// Live stream and buffer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Points retained per channel.
    pub capacity: usize,
    /// Fixed delay before reconnecting after the stream drops (milliseconds).
    pub reconnect_delay_ms: u64,
    /// Longest a single event-loop turn waits on the socket (milliseconds).
    pub poll_interval_ms: u64,
    /// History interval fetched on connect.
    pub default_interval: Interval,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            capacity: crate::buffer::DEFAULT_CAPACITY,
            reconnect_delay_ms: 5000,
            poll_interval_ms: 250,
            default_interval: Interval::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// [display]
// ---------------------------------------------------------------------------

/// Terminal rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Whole-hour offset of the display zone from UTC.
    pub utc_offset_hours: i32,
    /// Suffix printed after every time (e.g. `WIB`).
    pub zone_label: String,
    /// Decimal places for sensor values.
    pub precision: usize,
    /// Number of most recent points drawn per chart line.
    pub chart_width: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: 7,
            zone_label: "WIB".to_string(),
            precision: 4,
            chart_width: 60,
        }
    }
}

impl DisplayConfig {
    pub fn zone(&self) -> crate::reading::format::DisplayZone {
        crate::reading::format::DisplayZone::new(self.utc_offset_hours, self.zone_label.clone())
    }
}

// ---------------------------------------------------------------------------
// [logging]
// ---------------------------------------------------------------------------

/// Event log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Whether the JSONL event log is written.
    pub enabled: bool,
    /// Path to the event log. `~` is expanded to the home directory.
    pub path: String,
    /// Minimum level: `"debug"`, `"info"`, `"warn"`, `"error"`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "~/.gasmon/events.jsonl".to_string(),
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default TOML
// ---------------------------------------------------------------------------

impl GasmonConfig {
    /// Annotated default config written by `gasmon config init`.
    pub fn default_toml() -> &'static str {
        DEFAULT_TOML
    }
}

const DEFAULT_TOML: &str = r#"# gasmon configuration
# Values shown are the built-in defaults. Remove any line to keep the default.

[backend]
# HTTP base URL of the monitoring backend.
base_url = "http://127.0.0.1:8000"
# WebSocket URL. Leave empty to derive it from base_url (+ /sensor/ws).
stream_url = ""
# Request and connect timeout in milliseconds.
timeout_ms = 10000

[stream]
# Points kept per sensor channel before the oldest is evicted.
capacity = 1200
# Delay before reconnecting a dropped stream, in milliseconds.
reconnect_delay_ms = 5000
# Longest wait on the socket per event-loop turn, in milliseconds.
poll_interval_ms = 250
# History interval fetched on connect: 3s, 10s, 30s, 1min, 5min.
default_interval = "3s"

[display]
utc_offset_hours = 7
zone_label = "WIB"
precision = 4
chart_width = 60

[logging]
enabled = true
path = "~/.gasmon/events.jsonl"
level = "info"
"#;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
