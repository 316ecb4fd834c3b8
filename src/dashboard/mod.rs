//! Dashboard session state and the operator actions.
//!
//! [`Session`] is the stream listener: it owns the live buffer, the active
//! sensor subscription, the AI state, and the history fetch bookkeeping.
//! [`Dashboard`] wires a session to a [`ConnectionSupervisor`] and a
//! [`SensorCommands`] backend and implements the start/stop/AI/interval
//! actions.
//!
//! History fetches are asynchronous from the session's point of view: a
//! request is queued with a [`FetchTicket`], performed elsewhere, and handed
//! back through [`Session::apply_history`]. Only the most recently issued
//! ticket is applied; anything older is discarded on arrival.

pub mod render;

use std::collections::BTreeSet;
use std::fmt;

use colored::Colorize;

use crate::api::{History, Interval, SensorCommands, SensorTarget};
use crate::buffer::LiveSeriesBuffer;
use crate::error::Result;
use crate::logging::StatusLine;
use crate::reading::format::format_classification;
use crate::reading::{Channel, Reading};
use crate::supervisor::{Clock, ConnectionSupervisor, Listener, Poll, SystemClock, Transport};

use render::{ChannelVisibility, render_chart, render_header, render_row};

/// AI result text while the classifier is off.
pub const AI_INACTIVE: &str = "AI NOT ACTIVE";
/// AI result text while waiting for the first composition.
pub const AI_WAITING: &str = "Waiting...";

// ---------------------------------------------------------------------------
// Active sensors
// ---------------------------------------------------------------------------

/// The current sensor subscription: `all`, or a set of channels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveSensors {
    all: bool,
    channels: BTreeSet<Channel>,
}

impl ActiveSensors {
    pub fn is_all(&self) -> bool {
        self.all
    }

    pub fn is_empty(&self) -> bool {
        !self.all && self.channels.is_empty()
    }

    pub fn contains(&self, channel: Channel) -> bool {
        self.channels.contains(&channel)
    }

    /// Individually active channels (empty while `all` is active).
    pub fn channels(&self) -> Vec<Channel> {
        self.channels.iter().copied().collect()
    }

    pub fn insert(&mut self, channel: Channel) {
        self.channels.insert(channel);
    }

    pub fn remove(&mut self, target: SensorTarget) {
        match target {
            SensorTarget::All => self.all = false,
            SensorTarget::Channel(c) => {
                self.channels.remove(&c);
            }
        }
    }

    pub fn set_all(&mut self) {
        self.channels.clear();
        self.all = true;
    }

    pub fn set_only(&mut self, channel: Channel) {
        self.all = false;
        self.channels.clear();
        self.channels.insert(channel);
    }

    pub fn clear(&mut self) {
        self.all = false;
        self.channels.clear();
    }

    /// Channels to display. An empty subscription applies no filter.
    pub fn visibility(&self) -> ChannelVisibility {
        if self.all || self.channels.is_empty() {
            ChannelVisibility::all()
        } else {
            ChannelVisibility::only(&self.channels())
        }
    }
}

impl fmt::Display for ActiveSensors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.all {
            return f.write_str("all");
        }
        if self.channels.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&str> = self.channels.iter().map(|c| c.as_str()).collect();
        f.write_str(&names.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Identifies one history fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket(u64);

/// A queued history fetch for the caller to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryRequest {
    pub ticket: FetchTicket,
    pub interval: Interval,
}

/// Rendering options taken from `[display]`.
#[derive(Debug, Clone)]
pub struct DisplayOptions {
    pub precision: usize,
    pub chart_width: usize,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            precision: 4,
            chart_width: 60,
        }
    }
}

/// Per-run dashboard state. Implements the stream [`Listener`].
pub struct Session {
    buffer: LiveSeriesBuffer,
    active: ActiveSensors,
    ai_running: bool,
    ai_result: String,
    interval: Interval,
    fetch_generation: u64,
    pending: Vec<HistoryRequest>,
    status: StatusLine,
    display: DisplayOptions,
}

impl Session {
    pub fn new(capacity: usize, interval: Interval, status: StatusLine, display: DisplayOptions) -> Self {
        Self {
            buffer: LiveSeriesBuffer::new(capacity),
            active: ActiveSensors::default(),
            ai_running: false,
            ai_result: AI_INACTIVE.to_string(),
            interval,
            fetch_generation: 0,
            pending: Vec::new(),
            status,
            display,
        }
    }

    pub fn buffer(&self) -> &LiveSeriesBuffer {
        &self.buffer
    }

    pub fn active(&self) -> &ActiveSensors {
        &self.active
    }

    pub fn ai_running(&self) -> bool {
        self.ai_running
    }

    pub fn ai_result(&self) -> &str {
        &self.ai_result
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn status(&self) -> &StatusLine {
        &self.status
    }

    /// Queue a history fetch. Any fetch issued earlier becomes stale.
    pub fn request_history(&mut self, interval: Interval) -> FetchTicket {
        self.fetch_generation += 1;
        let ticket = FetchTicket(self.fetch_generation);
        self.pending.push(HistoryRequest { ticket, interval });
        ticket
    }

    /// Drop the current series and queue a fresh fetch. The chart stays
    /// empty if that fetch fails.
    pub fn refetch(&mut self, interval: Interval) -> FetchTicket {
        self.buffer.clear();
        self.request_history(interval)
    }

    /// Hand over the queued fetches.
    pub fn take_history_requests(&mut self) -> Vec<HistoryRequest> {
        std::mem::take(&mut self.pending)
    }

    /// Apply a completed fetch. Returns `false` when the ticket is stale
    /// and the result was discarded.
    pub fn apply_history(&mut self, request: HistoryRequest, result: Result<History>) -> bool {
        if request.ticket != FetchTicket(self.fetch_generation) {
            self.status
                .events()
                .debug("history", &format!("discarded stale fetch for {}", request.interval));
            return false;
        }

        match result {
            Ok(history) => {
                if history.skipped > 0 {
                    self.status.events().warn(
                        "history",
                        &format!("skipped {} malformed records", history.skipped),
                    );
                }
                let accepted = self.buffer.load_history(&history.readings);
                if accepted == 0 {
                    self.status
                        .info("history", &format!("No data for interval {}", request.interval));
                } else {
                    self.status.info(
                        "history",
                        &format!("Chart updated for interval {} ({accepted} points)", request.interval),
                    );
                }
            }
            Err(e) => {
                self.status
                    .error("history", &format!("Error fetching chart data: {e}"));
            }
        }
        true
    }

    /// Drop all series data and invalidate in-flight fetches.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.fetch_generation += 1;
        self.pending.clear();
    }

    /// Chart lines for the current buffer and subscription.
    pub fn chart(&self) -> Vec<String> {
        render_chart(
            &self.buffer.snapshot(),
            self.active.visibility(),
            self.status.zone(),
            self.display.chart_width,
        )
    }

    /// Table header for the current subscription.
    pub fn header(&self) -> String {
        render_header(self.active.visibility())
    }

    fn set_ai(&mut self, running: bool) {
        self.ai_running = running;
        self.ai_result = if running { AI_WAITING } else { AI_INACTIVE }.to_string();
    }
}

impl Listener for Session {
    fn on_connected(&mut self) {
        self.status.info("connect", "WebSocket connected");
        let interval = self.interval;
        self.request_history(interval);
    }

    fn on_message(&mut self, reading: Reading) {
        if !self.buffer.accept(&reading).is_accepted() {
            return;
        }

        let row = render_row(
            &reading,
            self.active.visibility(),
            self.status.zone(),
            self.display.precision,
        );
        println!("{row}");

        if self.ai_running && reading.classification.is_some() {
            self.ai_result = format_classification(reading.classification.as_ref());
            println!("{} {}", "AI:".bold(), self.ai_result.cyan());
        }
    }

    fn on_disconnected(&mut self) {
        self.status.info("disconnect", "WebSocket disconnected");
    }

    fn on_error(&mut self, reason: &str) {
        self.status.error("transport", &format!("WebSocket error: {reason}"));
        self.request_history(Interval::ThreeSeconds);
    }
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

/// Session + stream supervisor + command backend.
pub struct Dashboard<B: SensorCommands, T: Transport, C: Clock = SystemClock> {
    session: Session,
    supervisor: ConnectionSupervisor<T, C>,
    backend: B,
}

impl<B: SensorCommands, T: Transport, C: Clock> Dashboard<B, T, C> {
    pub fn new(session: Session, supervisor: ConnectionSupervisor<T, C>, backend: B) -> Self {
        Self {
            session,
            supervisor,
            backend,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn supervisor(&self) -> &ConnectionSupervisor<T, C> {
        &self.supervisor
    }

    /// Open the stream (no-op when already open or opening).
    pub fn connect(&mut self) {
        self.supervisor.start(&mut self.session);
    }

    /// Drive the stream one turn.
    pub fn tick(&mut self) -> Poll {
        self.supervisor.poll(&mut self.session)
    }

    /// Start one sensor or all of them.
    ///
    /// Switching to `all` first stops each individually running sensor;
    /// switching from `all` to a single sensor first stops everything. On
    /// success the stream is opened if needed, otherwise history is
    /// refetched for the new subscription.
    pub fn start_sensor(&mut self, target: SensorTarget) -> Result<()> {
        match target {
            SensorTarget::All => {
                for channel in self.session.active.channels() {
                    self.report(self.backend.stop_sensor(channel));
                }
                self.session.active.set_all();
            }
            SensorTarget::Channel(channel) => {
                if self.session.active.is_all() {
                    self.report(self.backend.stop_all());
                    self.session.active.set_only(channel);
                } else {
                    self.session.active.insert(channel);
                }
            }
        }

        match self.backend.start_sensor(target) {
            Ok(message) => self.session.status.info("command", &message),
            Err(e) => {
                self.session.status.error("command", &format!("Error: {e}"));
                self.session.active.remove(target);
                return Err(e);
            }
        }

        if self.supervisor.is_connected() {
            let interval = self.session.interval;
            self.session.refetch(interval);
        } else {
            self.connect();
        }
        self.session.status.events().info(
            "active",
            &format!("active sensors: {}", self.session.active),
        );
        Ok(())
    }

    /// Stop every sensor, close the stream for good, and clear the chart.
    pub fn stop_sensors(&mut self) -> Result<()> {
        self.session.active.clear();
        match self.backend.stop_all() {
            Ok(message) => {
                self.session.status.info("command", &message);
                self.supervisor.stop();
                self.session.clear();
                let running = self.session.ai_running;
                self.session.set_ai(running);
                Ok(())
            }
            Err(e) => {
                self.session
                    .status
                    .error("command", &format!("Error stopping sensors: {e}"));
                Err(e)
            }
        }
    }

    /// Start the AI classifier if it is off, stop it if it is on. The flag
    /// only flips when the backend confirms.
    pub fn toggle_ai(&mut self) -> Result<()> {
        let running = self.session.ai_running;
        let result = if running {
            self.backend.stop_ai()
        } else {
            self.backend.start_ai()
        };
        match result {
            Ok(message) => {
                self.session.status.info("ai", &message);
                self.session.set_ai(!running);
                Ok(())
            }
            Err(e) => {
                let action = if running { "stopping" } else { "starting" };
                self.session
                    .status
                    .error("ai", &format!("Error {action} AI: {e}"));
                Err(e)
            }
        }
    }

    /// Change the history interval and refetch.
    pub fn set_interval(&mut self, interval: Interval) {
        self.session.interval = interval;
        self.session.refetch(interval);
    }

    fn report(&self, result: Result<String>) {
        match result {
            Ok(message) => self.session.status.info("command", &message),
            Err(e) => self.session.status.error("command", &format!("Error: {e}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
