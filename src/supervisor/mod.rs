//! Single-connection stream supervisor with fixed-delay reconnect.
//!
//! Owns at most one live streaming connection and drives it through:
//!
//! ```text
//!            start()                open ok
//! Disconnected ──────► Connecting ──────────► Connected
//!      ▲                   │ open failed          │ close / error
//!      │                   ▼                      ▼
//!      └───── timer fires ◄── Disconnected + one reconnect timer
//!
//! stop() from any state ──► Closed (no timer, no connection)
//! ```
//!
//! The supervisor is a single-threaded, poll-driven state machine: the
//! caller invokes [`poll`](ConnectionSupervisor::poll) in a loop and every
//! callback runs on that thread. Exactly one reconnect timer can be pending
//! (it is an `Option`), and starting a connection always cancels it, so two
//! live connections or two overlapping timers cannot exist.
//!
//! # Configuration Defaults
//!
//! | Parameter       | Default | Description                         |
//! |-----------------|---------|-------------------------------------|
//! | Reconnect delay | 5000 ms | Wait after a drop before reopening  |

pub mod clock;
pub mod transport;

use std::time::{Duration, Instant};

use crate::logging::EventLog;
use crate::reading::{self, Reading};

pub use clock::{Clock, ManualClock, SystemClock};
pub use transport::{Connection, Inbound, Transport, WsConnection, WsTransport};

/// Reconnect delay when none is configured.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5000);

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Terminal until the next explicit `start()`.
    Closed,
}

/// Lifecycle callbacks. All run on the thread that calls `start`/`poll`.
pub trait Listener {
    fn on_connected(&mut self) {}
    fn on_message(&mut self, reading: Reading);
    fn on_disconnected(&mut self) {}
    fn on_error(&mut self, _reason: &str) {}
}

/// What one call to [`ConnectionSupervisor::poll`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    /// A reading was delivered to the listener.
    Message,
    /// A frame arrived but was dropped as malformed.
    Dropped,
    /// Connected, nothing arrived in the poll window.
    Idle,
    /// Disconnected; the reconnect timer fires after this long.
    Waiting(Duration),
    /// A connection attempt was made (timer fired).
    Reconnected,
    /// The connection closed or failed during this poll.
    Disconnected,
    /// `stop()` was called, or no reconnect is scheduled.
    Stopped,
}

/// Counters for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorStats {
    /// Successful opens.
    pub connects: u64,
    /// Reconnect timers scheduled over the supervisor's lifetime.
    pub timers_scheduled: u64,
    /// Readings delivered to the listener.
    pub messages: u64,
    /// Frames dropped as malformed.
    pub dropped: u64,
}

#[derive(Debug, Clone, Copy)]
struct ReconnectTimer {
    due: Instant,
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

pub struct ConnectionSupervisor<T: Transport, C: Clock = SystemClock> {
    url: String,
    transport: T,
    clock: C,
    reconnect_delay: Duration,
    state: ConnectionState,
    conn: Option<T::Conn>,
    timer: Option<ReconnectTimer>,
    generation: u64,
    stats: SupervisorStats,
    events: EventLog,
}

impl<T: Transport> ConnectionSupervisor<T, SystemClock> {
    /// Supervisor on the wall clock.
    pub fn new(url: impl Into<String>, transport: T, reconnect_delay: Duration, events: EventLog) -> Self {
        Self::with_clock(url, transport, SystemClock, reconnect_delay, events)
    }
}

impl<T: Transport, C: Clock> ConnectionSupervisor<T, C> {
    pub fn with_clock(
        url: impl Into<String>,
        transport: T,
        clock: C,
        reconnect_delay: Duration,
        events: EventLog,
    ) -> Self {
        Self {
            url: url.into(),
            transport,
            clock,
            reconnect_delay,
            state: ConnectionState::Disconnected,
            conn: None,
            timer: None,
            generation: 0,
            stats: SupervisorStats::default(),
            events,
        }
    }

    /// Open the stream unless one is already open or opening.
    ///
    /// Cancels any pending reconnect timer first. A failed open reports
    /// `on_error` and then schedules a reconnect like any other drop.
    pub fn start(&mut self, listener: &mut dyn Listener) {
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            return;
        }

        self.timer = None;
        self.generation += 1;
        self.state = ConnectionState::Connecting;
        self.events
            .info("connect", &format!("opening {} (attempt {})", self.url, self.generation));

        match self.transport.open(&self.url) {
            Ok(conn) => {
                self.conn = Some(conn);
                self.state = ConnectionState::Connected;
                self.stats.connects += 1;
                listener.on_connected();
            }
            Err(e) => {
                let reason = e.to_string();
                self.events.warn("transport", &reason);
                listener.on_error(&reason);
                self.handle_close(listener);
            }
        }
    }

    /// Run one turn of the event loop.
    pub fn poll(&mut self, listener: &mut dyn Listener) -> Poll {
        match self.state {
            ConnectionState::Connected => self.poll_connection(listener),
            ConnectionState::Disconnected => self.poll_timer(listener),
            ConnectionState::Connecting | ConnectionState::Closed => Poll::Stopped,
        }
    }

    /// Close the stream for good and cancel any pending reconnect.
    pub fn stop(&mut self) {
        self.state = ConnectionState::Closed;
        self.timer = None;
        if let Some(mut conn) = self.conn.take() {
            conn.close();
        }
        self.events.info("stop", "stream closed by request");
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Number of connection attempts made so far. Changes on every `start`.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Remaining delay of the pending reconnect timer, if one exists.
    pub fn reconnect_pending(&self) -> Option<Duration> {
        self.timer
            .map(|t| t.due.saturating_duration_since(self.clock.now()))
    }

    pub fn stats(&self) -> SupervisorStats {
        self.stats
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    // -- Internal --

    fn poll_connection(&mut self, listener: &mut dyn Listener) -> Poll {
        let Some(conn) = self.conn.as_mut() else {
            self.handle_close(listener);
            return Poll::Disconnected;
        };

        match conn.recv() {
            Ok(Inbound::Text(text)) => match reading::parse_message(&text) {
                Ok(reading) => {
                    self.stats.messages += 1;
                    listener.on_message(reading);
                    Poll::Message
                }
                Err(e) => {
                    self.stats.dropped += 1;
                    self.events.debug("dropped", &e.to_string());
                    Poll::Dropped
                }
            },
            Ok(Inbound::Idle) => Poll::Idle,
            Ok(Inbound::Closed) => {
                self.handle_close(listener);
                Poll::Disconnected
            }
            Err(e) => {
                let reason = e.to_string();
                self.events.warn("transport", &reason);
                listener.on_error(&reason);
                self.handle_close(listener);
                Poll::Disconnected
            }
        }
    }

    fn poll_timer(&mut self, listener: &mut dyn Listener) -> Poll {
        let Some(timer) = self.timer else {
            return Poll::Stopped;
        };
        let now = self.clock.now();
        if now < timer.due {
            return Poll::Waiting(timer.due - now);
        }
        self.timer = None;
        self.start(listener);
        Poll::Reconnected
    }

    /// Drop the connection, notify, and schedule the single reconnect.
    fn handle_close(&mut self, listener: &mut dyn Listener) {
        if let Some(mut conn) = self.conn.take() {
            conn.close();
        }
        if self.state == ConnectionState::Closed {
            return;
        }

        self.state = ConnectionState::Disconnected;
        listener.on_disconnected();

        debug_assert!(self.timer.is_none(), "reconnect timer already pending");
        self.timer = Some(ReconnectTimer {
            due: self.clock.now() + self.reconnect_delay,
        });
        self.stats.timers_scheduled += 1;
        self.events.info(
            "reconnect",
            &format!("retrying in {} ms", self.reconnect_delay.as_millis()),
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
