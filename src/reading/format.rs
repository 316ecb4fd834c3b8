//! Display formatting for timestamps, values, and classifications.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};

use super::Classification;

/// Fixed-offset zone used for every displayed timestamp.
#[derive(Debug, Clone)]
pub struct DisplayZone {
    offset: FixedOffset,
    label: String,
}

impl DisplayZone {
    /// Build a zone from a whole-hour UTC offset. Out-of-range offsets
    /// fall back to UTC.
    pub fn new(utc_offset_hours: i32, label: impl Into<String>) -> Self {
        let offset = utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix());
        Self {
            offset,
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Current wall-clock time in this zone, for status line prefixes.
    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }

    /// Interpret a backend timestamp in this zone.
    ///
    /// RFC 3339 timestamps are converted; timestamps without an offset are
    /// taken to already be in this zone.
    pub fn parse(&self, ts: &str) -> Option<DateTime<FixedOffset>> {
        let ts = ts.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
            return Some(dt.with_timezone(&self.offset));
        }
        let naive = NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()?;
        self.offset.from_local_datetime(&naive).single()
    }
}

impl Default for DisplayZone {
    fn default() -> Self {
        Self::new(7, "WIB")
    }
}

/// `dd/mm/yyyy HH:MM:SS WIB`, or `-` when the timestamp does not parse.
pub fn format_timestamp(ts: &str, zone: &DisplayZone) -> String {
    match zone.parse(ts) {
        Some(dt) => format_datetime(&dt, zone),
        None => "-".to_string(),
    }
}

/// Format an already-resolved datetime with the zone label.
pub fn format_datetime(dt: &DateTime<FixedOffset>, zone: &DisplayZone) -> String {
    format!("{} {}", dt.format("%d/%m/%Y %H:%M:%S"), zone.label())
}

/// `HH:MM:SS WIB`, or `-`. Used on the chart axis.
pub fn format_time(ts: &str, zone: &DisplayZone) -> String {
    match zone.parse(ts) {
        Some(dt) => format!("{} {}", dt.format("%H:%M:%S"), zone.label()),
        None => "-".to_string(),
    }
}

/// Fixed-precision value, or `-` for an absent channel.
pub fn format_value(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{v:.precision$}"),
        None => "-".to_string(),
    }
}

/// Human-readable classification: the label itself, or
/// `70.00% Arabika, 30.00% Robusta` for a composition.
pub fn format_classification(classification: Option<&Classification>) -> String {
    match classification {
        Some(Classification::Label(label)) => label.clone(),
        Some(Classification::Composition(parts)) if !parts.is_empty() => parts
            .iter()
            .map(|(name, fraction)| format!("{:.2}% {name}", fraction * 100.0))
            .collect::<Vec<_>>()
            .join(", "),
        _ => "-".to_string(),
    }
}
