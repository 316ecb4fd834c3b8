/// HTTP client for the monitoring backend's command and history endpoints.
///
/// Uses the synchronous `ureq` client. Every call is a single request with
/// no retry: failures come back as [`Error::RequestFailure`] carrying a
/// one-line message suitable for the status log.
///
/// | Operation          | Request                              |
/// |--------------------|--------------------------------------|
/// | start a sensor     | `POST /sensor/start/{sensor or all}` |
/// | stop one sensor    | `POST /sensor/stop/{sensor}`         |
/// | stop all sensors   | `POST /sensor/stop`                  |
/// | start / stop AI    | `POST /sensor/start-ai`, `/stop-ai`  |
/// | history            | `GET /sensor/data/db/{interval}`     |
/// | latest reading     | `GET /sensor/latest`                 |
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::schema::BackendConfig;
use crate::error::{Error, Result};
use crate::reading::{self, Channel, Reading};

// ---------------------------------------------------------------------------
// Request parameters
// ---------------------------------------------------------------------------

/// History window token accepted by `/sensor/data/db/{interval}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interval {
    #[default]
    #[serde(rename = "3s")]
    ThreeSeconds,
    #[serde(rename = "10s")]
    TenSeconds,
    #[serde(rename = "30s")]
    ThirtySeconds,
    #[serde(rename = "1min")]
    OneMinute,
    #[serde(rename = "5min")]
    FiveMinutes,
}

impl Interval {
    pub const ALL: [Interval; 5] = [
        Interval::ThreeSeconds,
        Interval::TenSeconds,
        Interval::ThirtySeconds,
        Interval::OneMinute,
        Interval::FiveMinutes,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ThreeSeconds => "3s",
            Self::TenSeconds => "10s",
            Self::ThirtySeconds => "30s",
            Self::OneMinute => "1min",
            Self::FiveMinutes => "5min",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|i| i.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown interval '{s}' (expected 3s, 10s, 30s, 1min, 5min)"))
    }
}

/// What a start command applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SensorTarget {
    All,
    Channel(Channel),
}

impl SensorTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Channel(c) => c.as_str(),
        }
    }
}

impl fmt::Display for SensorTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorTarget {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(Self::All)
        } else {
            s.parse().map(Self::Channel)
        }
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Body returned by every command endpoint.
#[derive(Debug, Clone, Deserialize)]
struct CommandResponse {
    #[serde(default)]
    message: String,
    /// Present on the AI endpoints; `"error"` marks an application failure.
    #[serde(default)]
    status: Option<String>,
    /// Set by the sensor endpoints when a command is rejected, e.g. an
    /// unknown sensor name.
    #[serde(default)]
    error: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Synchronous backend client. Cheap to clone and `Send`, so the history
/// worker thread gets its own copy.
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
    timeout: Duration,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// Build a client from the resolved config.
    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(&config.base_url, Duration::from_millis(config.timeout_ms))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST /sensor/start/{target}`.
    pub fn start_sensor(&self, target: SensorTarget) -> Result<String> {
        self.command(&format!("/sensor/start/{target}"))
    }

    /// `POST /sensor/stop/{channel}`.
    pub fn stop_sensor(&self, channel: Channel) -> Result<String> {
        self.command(&format!("/sensor/stop/{channel}"))
    }

    /// `POST /sensor/stop`, stopping every sensor.
    pub fn stop_all(&self) -> Result<String> {
        self.command("/sensor/stop")
    }

    /// `POST /sensor/start-ai`.
    pub fn start_ai(&self) -> Result<String> {
        self.command("/sensor/start-ai")
    }

    /// `POST /sensor/stop-ai`.
    pub fn stop_ai(&self) -> Result<String> {
        self.command("/sensor/stop-ai")
    }

    /// `GET /sensor/data/db/{interval}`.
    ///
    /// Returns the decoded readings in server order plus the number of
    /// records that were skipped as malformed.
    pub fn history(&self, interval: Interval) -> Result<History> {
        let records: Vec<serde_json::Value> = self.get_json(&format!("/sensor/data/db/{interval}"))?;
        let mut readings = Vec::with_capacity(records.len());
        let mut skipped = 0;
        for record in &records {
            match reading::parse_value(record) {
                Ok(r) => readings.push(r),
                Err(_) => skipped += 1,
            }
        }
        Ok(History { readings, skipped })
    }

    /// `GET /sensor/latest`. `Ok(None)` when the backend has no data yet.
    pub fn latest(&self) -> Result<Option<Reading>> {
        let value: serde_json::Value = self.get_json("/sensor/latest")?;
        if value.get("error").is_some() && value.get("timestamp").is_none() {
            return Ok(None);
        }
        reading::parse_value(&value)
            .map(Some)
            .map_err(|e| Error::RequestFailure(format!("unexpected latest payload: {e}")))
    }

    // -- Internal --

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn command(&self, path: &str) -> Result<String> {
        let resp = ureq::post(&self.url(path))
            .timeout(self.timeout)
            .call()
            .map_err(|e| request_failure(path, e))?;

        let body: CommandResponse = resp
            .into_json()
            .map_err(|e| Error::RequestFailure(format!("invalid response from {path}: {e}")))?;

        if let Some(error) = body.error.filter(|e| !e.trim().is_empty()) {
            return Err(Error::RequestFailure(error));
        }

        if body.status.as_deref() == Some("error") {
            let message = if body.message.is_empty() {
                format!("{path} reported an error")
            } else {
                body.message
            };
            return Err(Error::RequestFailure(message));
        }

        Ok(body.message)
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = ureq::get(&self.url(path))
            .timeout(self.timeout)
            .call()
            .map_err(|e| request_failure(path, e))?;

        resp.into_json()
            .map_err(|e| Error::RequestFailure(format!("invalid response from {path}: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Command seam
// ---------------------------------------------------------------------------

/// The fire-and-forget commands the dashboard issues. Implemented by
/// [`BackendClient`]; tests substitute a recording fake.
pub trait SensorCommands {
    fn start_sensor(&self, target: SensorTarget) -> Result<String>;
    fn stop_sensor(&self, channel: Channel) -> Result<String>;
    fn stop_all(&self) -> Result<String>;
    fn start_ai(&self) -> Result<String>;
    fn stop_ai(&self) -> Result<String>;
}

impl SensorCommands for BackendClient {
    fn start_sensor(&self, target: SensorTarget) -> Result<String> {
        BackendClient::start_sensor(self, target)
    }

    fn stop_sensor(&self, channel: Channel) -> Result<String> {
        BackendClient::stop_sensor(self, channel)
    }

    fn stop_all(&self) -> Result<String> {
        BackendClient::stop_all(self)
    }

    fn start_ai(&self) -> Result<String> {
        BackendClient::start_ai(self)
    }

    fn stop_ai(&self) -> Result<String> {
        BackendClient::stop_ai(self)
    }
}

/// Decoded history batch.
#[derive(Debug, Clone, Default)]
pub struct History {
    pub readings: Vec<Reading>,
    pub skipped: usize,
}

/// Collapse a `ureq` error into a one-line request failure.
fn request_failure(path: &str, err: ureq::Error) -> Error {
    match err {
        ureq::Error::Status(code, resp) => {
            let detail = resp
                .into_json::<serde_json::Value>()
                .ok()
                .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string));
            match detail {
                Some(detail) => Error::RequestFailure(format!("HTTP error: {code} ({detail})")),
                None => Error::RequestFailure(format!("HTTP error: {code}")),
            }
        }
        ureq::Error::Transport(t) => Error::RequestFailure(format!("{path} unreachable: {t}")),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
