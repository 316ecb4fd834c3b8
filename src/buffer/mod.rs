/// Bounded live time series for the four sensor channels.
///
/// Readings are stored as rows (one timestamp plus one slot per channel),
/// so every channel always has the same length and eviction removes the
/// same index from all of them at once. A reading that omits a channel
/// still writes an explicit `None` placeholder into that channel's slot.
///
/// De-duplication compares only the timestamp against the most recently
/// accepted one. Two distinct readings that share a timestamp (clock
/// resolution collisions) keep the first and drop the second.
///
/// # Defaults
///
/// | Parameter | Default | Description                          |
/// |-----------|---------|--------------------------------------|
/// | Capacity  | 1200    | Points retained per channel          |
use std::collections::VecDeque;

use serde::Serialize;

use crate::reading::{Channel, Reading};

/// Points retained per channel when no capacity is configured.
pub const DEFAULT_CAPACITY: usize = 1200;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Result of offering a reading to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// Appended. `evicted` is set when the oldest row was dropped.
    Accepted { evicted: bool },
    /// Same timestamp as the last accepted reading; nothing changed.
    Duplicate,
}

impl AcceptOutcome {
    pub fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// One `(timestamp, value)` pair in a channel's series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub timestamp: String,
    /// `None` marks an absent value for this channel at this timestamp.
    pub value: Option<f64>,
}

/// Read-only copy of the buffer contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    timestamps: Vec<String>,
    series: [Vec<SeriesPoint>; 4],
}

impl Snapshot {
    /// Ordered points for one channel, oldest first.
    pub fn series(&self, channel: Channel) -> &[SeriesPoint] {
        &self.series[channel.index()]
    }

    /// Shared label axis; index `i` lines up with `series(ch)[i]`.
    pub fn timestamps(&self) -> &[String] {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Buffer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Row {
    timestamp: String,
    values: [Option<f64>; 4],
}

/// Bounded, aligned, timestamp-deduplicated series for all channels.
#[derive(Debug, Clone)]
pub struct LiveSeriesBuffer {
    rows: VecDeque<Row>,
    capacity: usize,
    last_timestamp: Option<String>,
}

impl LiveSeriesBuffer {
    /// Create an empty buffer. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            rows: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY) + 1),
            capacity,
            last_timestamp: None,
        }
    }

    /// Offer a reading.
    ///
    /// Rejected without any state change when its timestamp equals the last
    /// accepted timestamp. Otherwise one point is appended to every channel
    /// and, if that pushes the length past capacity, the oldest point is
    /// removed from every channel.
    pub fn accept(&mut self, reading: &Reading) -> AcceptOutcome {
        if self.last_timestamp.as_deref() == Some(reading.timestamp.as_str()) {
            return AcceptOutcome::Duplicate;
        }

        self.rows.push_back(Row {
            timestamp: reading.timestamp.clone(),
            values: reading.values,
        });
        self.last_timestamp = Some(reading.timestamp.clone());

        let evicted = if self.rows.len() > self.capacity {
            self.rows.pop_front();
            true
        } else {
            false
        };

        AcceptOutcome::Accepted { evicted }
    }

    /// Empty every channel and forget the last accepted timestamp.
    pub fn clear(&mut self) {
        self.rows.clear();
        self.last_timestamp = None;
    }

    /// Replace the contents with a history batch.
    ///
    /// The batch goes through [`accept`](Self::accept), so duplicate
    /// timestamps and capacity apply exactly as for streamed readings.
    /// Returns the number of readings accepted.
    pub fn load_history<'a>(&mut self, readings: impl IntoIterator<Item = &'a Reading>) -> usize {
        self.clear();
        readings
            .into_iter()
            .filter(|r| self.accept(r).is_accepted())
            .count()
    }

    /// Copy out the current series for every channel.
    pub fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot {
            timestamps: Vec::with_capacity(self.rows.len()),
            series: Default::default(),
        };
        for row in &self.rows {
            snapshot.timestamps.push(row.timestamp.clone());
            for channel in Channel::ALL {
                snapshot.series[channel.index()].push(SeriesPoint {
                    timestamp: row.timestamp.clone(),
                    value: row.values[channel.index()],
                });
            }
        }
        snapshot
    }

    /// Most recent row as a reading (without classification).
    pub fn latest(&self) -> Option<Reading> {
        self.rows.back().map(|row| Reading {
            timestamp: row.timestamp.clone(),
            values: row.values,
            label: None,
            classification: None,
        })
    }

    pub fn last_timestamp(&self) -> Option<&str> {
        self.last_timestamp.as_deref()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for LiveSeriesBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
