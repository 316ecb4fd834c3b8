/// Sensor reading model and decoding of backend messages.
///
/// The backend pushes one JSON object per sample over the stream and
/// returns arrays of the same shape from the history endpoint:
///
/// ```json
/// {
///   "timestamp": "2025-05-01T10:15:30+07:00",
///   "mq135": 1.2345, "mq2": null, "mq4": 0.5, "mq7": 0.01,
///   "jenis": "Arabika",
///   "ai_classification": { "composition": { "Arabika": 0.7, "Robusta": 0.3 } }
/// }
/// ```
///
/// The timestamp is treated as an opaque key. It is compared for
/// de-duplication and formatted for display, never used for arithmetic.
pub mod format;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// One gas-sensor input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Mq135,
    Mq2,
    Mq4,
    Mq7,
}

impl Channel {
    /// All channels in display order. Per-channel arrays use this order.
    pub const ALL: [Channel; 4] = [Channel::Mq135, Channel::Mq2, Channel::Mq4, Channel::Mq7];

    /// Wire name, as used in JSON payloads and endpoint paths.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mq135 => "mq135",
            Self::Mq2 => "mq2",
            Self::Mq4 => "mq4",
            Self::Mq7 => "mq7",
        }
    }

    /// Upper-case label for table headers and chart legends.
    pub fn label(self) -> &'static str {
        match self {
            Self::Mq135 => "MQ135",
            Self::Mq2 => "MQ2",
            Self::Mq4 => "MQ4",
            Self::Mq7 => "MQ7",
        }
    }

    /// Position of this channel in [`Channel::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mq135" => Ok(Self::Mq135),
            "mq2" => Ok(Self::Mq2),
            "mq4" => Ok(Self::Mq4),
            "mq7" => Ok(Self::Mq7),
            other => Err(format!("unknown sensor '{other}' (expected mq135, mq2, mq4, mq7)")),
        }
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// AI classification attached to a reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Classification {
    /// Free-form label produced by the classifier.
    Label(String),
    /// Labeled fractions, sorted by label (e.g. Arabika 0.7, Robusta 0.3).
    Composition(Vec<(String, f64)>),
}

/// One timestamped sample across all channels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub timestamp: String,
    /// Indexed by [`Channel::index`]. `None` when null or missing.
    pub values: [Option<f64>; 4],
    /// Quality or type label (`jenis`, falling back to `kualitas`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
}

impl Reading {
    /// Build a reading with the given timestamp and no channel values.
    pub fn new(timestamp: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            values: [None; 4],
            label: None,
            classification: None,
        }
    }

    /// Builder-style setter for one channel value.
    pub fn with(mut self, channel: Channel, value: f64) -> Self {
        self.values[channel.index()] = Some(value);
        self
    }

    /// Value for a single channel, if present.
    pub fn value(&self, channel: Channel) -> Option<f64> {
        self.values[channel.index()]
    }

    /// Composition fractions, when the classifier produced one.
    pub fn composition(&self) -> Option<&[(String, f64)]> {
        match &self.classification {
            Some(Classification::Composition(parts)) => Some(parts),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode one streamed text message.
pub fn parse_message(text: &str) -> Result<Reading> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| Error::MalformedMessage(format!("invalid JSON: {e}")))?;
    parse_value(&value)
}

/// Decode one reading-shaped JSON value.
///
/// Requires a non-empty string `timestamp` and at least one channel key.
/// Channel values must be numbers or `null`.
pub fn parse_value(value: &Value) -> Result<Reading> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::MalformedMessage("expected a JSON object".to_string()))?;

    let timestamp = match obj.get("timestamp") {
        Some(Value::String(ts)) if !ts.trim().is_empty() => ts.clone(),
        Some(_) => {
            return Err(Error::MalformedMessage(
                "timestamp is not a non-empty string".to_string(),
            ));
        }
        None => {
            if let Some(Value::String(reason)) = obj.get("error") {
                return Err(Error::MalformedMessage(format!("server reported: {reason}")));
            }
            return Err(Error::MalformedMessage("missing timestamp".to_string()));
        }
    };

    let mut values = [None; 4];
    let mut seen = false;
    for channel in Channel::ALL {
        match obj.get(channel.as_str()) {
            None => {}
            Some(Value::Null) => seen = true,
            Some(Value::Number(n)) => {
                seen = true;
                values[channel.index()] = n.as_f64();
            }
            Some(other) => {
                return Err(Error::MalformedMessage(format!(
                    "{channel} is not a number: {other}"
                )));
            }
        }
    }
    if !seen {
        return Err(Error::MalformedMessage("no sensor channel present".to_string()));
    }

    let label = non_empty_str(obj, "jenis").or_else(|| non_empty_str(obj, "kualitas"));

    Ok(Reading {
        timestamp,
        values,
        label,
        classification: parse_classification(obj),
    })
}

fn non_empty_str(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// Pull `ai_classification.composition` out of a payload.
///
/// Unrecognized shapes (including the backend's `{"raw": ...}` fallback)
/// yield `None` rather than rejecting the reading.
fn parse_classification(obj: &Map<String, Value>) -> Option<Classification> {
    let composition = obj.get("ai_classification")?.get("composition")?;
    match composition {
        Value::String(s) if !s.trim().is_empty() => Some(Classification::Label(s.clone())),
        Value::Object(parts) => {
            let mut fractions = Vec::with_capacity(parts.len());
            for (name, v) in parts {
                fractions.push((name.clone(), v.as_f64()?));
            }
            if fractions.is_empty() {
                return None;
            }
            fractions.sort_by(|a, b| a.0.cmp(&b.0));
            Some(Classification::Composition(fractions))
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
