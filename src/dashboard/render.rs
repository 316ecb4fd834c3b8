//! Plain-text rendering of readings and the live chart.
//!
//! Functions here return uncolored strings; callers decide on styling.

use crate::buffer::Snapshot;
use crate::reading::format::{DisplayZone, format_classification, format_time, format_timestamp, format_value};
use crate::reading::{Channel, Reading};

/// Upper bound of the chart's y axis.
pub const CHART_MAX: f64 = 5.0;

const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const TIME_WIDTH: usize = 23;
const VALUE_WIDTH: usize = 10;

/// Which channels are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelVisibility([bool; 4]);

impl ChannelVisibility {
    pub fn all() -> Self {
        Self([true; 4])
    }

    pub fn only(channels: &[Channel]) -> Self {
        let mut flags = [false; 4];
        for c in channels {
            flags[c.index()] = true;
        }
        Self(flags)
    }

    pub fn is_visible(&self, channel: Channel) -> bool {
        self.0[channel.index()]
    }

    pub fn visible(&self) -> impl Iterator<Item = Channel> + '_ {
        Channel::ALL.into_iter().filter(|c| self.is_visible(*c))
    }
}

/// Column header matching [`render_row`].
pub fn render_header(visibility: ChannelVisibility) -> String {
    let mut line = format!("{:<TIME_WIDTH$}", "Timestamp");
    for channel in Channel::ALL {
        let name = if visibility.is_visible(channel) {
            channel.label()
        } else {
            ""
        };
        line.push_str(&format!(" {name:>VALUE_WIDTH$}"));
    }
    line.push_str("  Label        Classification");
    line
}

/// One table row. Hidden channels render as blank columns so the layout
/// stays stable when the subscription changes.
pub fn render_row(
    reading: &Reading,
    visibility: ChannelVisibility,
    zone: &DisplayZone,
    precision: usize,
) -> String {
    let mut line = format!(
        "{:<TIME_WIDTH$}",
        format_timestamp(&reading.timestamp, zone)
    );
    for channel in Channel::ALL {
        let cell = if visibility.is_visible(channel) {
            format_value(reading.value(channel), precision)
        } else {
            String::new()
        };
        line.push_str(&format!(" {cell:>VALUE_WIDTH$}"));
    }
    let label = reading.label.as_deref().unwrap_or("-");
    line.push_str(&format!(
        "  {label:<12} {}",
        format_classification(reading.classification.as_ref())
    ));
    line
}

/// Sparkline chart over the last `width` points of each visible channel.
///
/// Absent values plot as zero; values are clamped to `0..=CHART_MAX`.
pub fn render_chart(
    snapshot: &Snapshot,
    visibility: ChannelVisibility,
    zone: &DisplayZone,
    width: usize,
) -> Vec<String> {
    if snapshot.is_empty() {
        return vec!["(no data)".to_string()];
    }

    let width = width.max(1);
    let start = snapshot.len().saturating_sub(width);
    let stamps = &snapshot.timestamps()[start..];
    let mut lines = vec![format!(
        "{} .. {}  ({} of {} points)",
        format_time(&stamps[0], zone),
        format_time(&stamps[stamps.len() - 1], zone),
        stamps.len(),
        snapshot.len()
    )];

    for channel in visibility.visible() {
        let points = &snapshot.series(channel)[start..];
        let bars: String = points
            .iter()
            .map(|p| bar(p.value.unwrap_or(0.0)))
            .collect();
        let last = points.last().and_then(|p| p.value);
        lines.push(format!(
            "{:<6} {bars} {}",
            channel.label(),
            format_value(last, 2)
        ));
    }
    lines
}

fn bar(value: f64) -> char {
    let v = if value.is_finite() { value.clamp(0.0, CHART_MAX) } else { 0.0 };
    let idx = ((v / CHART_MAX) * (BARS.len() - 1) as f64).round() as usize;
    BARS[idx.min(BARS.len() - 1)]
}
