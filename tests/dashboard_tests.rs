/// Dashboard actions against a recording command backend and a scripted
/// stream transport.
use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

use gasmon::api::{History, Interval, SensorCommands, SensorTarget};
use gasmon::dashboard::{AI_INACTIVE, AI_WAITING, Dashboard, DisplayOptions, Session};
use gasmon::logging::{EventLog, StatusLine};
use gasmon::reading::format::DisplayZone;
use gasmon::reading::{Channel, Reading};
use gasmon::supervisor::{
    Connection, ConnectionState, ConnectionSupervisor, DEFAULT_RECONNECT_DELAY, Inbound,
    ManualClock, Poll, Transport,
};
use gasmon::{Error, Result};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Records every command; commands listed in `failing` return an error.
#[derive(Clone, Default)]
struct FakeBackend {
    calls: Rc<RefCell<Vec<String>>>,
    failing: Rc<RefCell<HashSet<String>>>,
}

impl FakeBackend {
    fn fail(&self, call: &str) {
        self.failing.borrow_mut().insert(call.to_string());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: String) -> Result<String> {
        self.calls.borrow_mut().push(call.clone());
        if self.failing.borrow().contains(&call) {
            Err(Error::RequestFailure("HTTP error: 500".into()))
        } else {
            Ok(format!("{call} ok"))
        }
    }
}

impl SensorCommands for FakeBackend {
    fn start_sensor(&self, target: SensorTarget) -> Result<String> {
        self.record(format!("start {target}"))
    }
    fn stop_sensor(&self, channel: Channel) -> Result<String> {
        self.record(format!("stop {channel}"))
    }
    fn stop_all(&self) -> Result<String> {
        self.record("stop all".into())
    }
    fn start_ai(&self) -> Result<String> {
        self.record("start ai".into())
    }
    fn stop_ai(&self) -> Result<String> {
        self.record("stop ai".into())
    }
}

/// Shared inbound queue: tests push frames after the connection opens.
#[derive(Clone, Default)]
struct Feed(Rc<RefCell<VecDeque<Inbound>>>);

impl Feed {
    fn push(&self, text: &str) {
        self.0.borrow_mut().push_back(Inbound::Text(text.to_string()));
    }
}

struct FeedConn(Feed);

impl Connection for FeedConn {
    fn recv(&mut self) -> Result<Inbound> {
        Ok(self.0.0.borrow_mut().pop_front().unwrap_or(Inbound::Idle))
    }
    fn close(&mut self) {}
}

#[derive(Clone, Default)]
struct FeedTransport {
    feed: Feed,
    opens: Rc<RefCell<usize>>,
}

impl Transport for FeedTransport {
    type Conn = FeedConn;
    fn open(&mut self, _url: &str) -> Result<FeedConn> {
        *self.opens.borrow_mut() += 1;
        Ok(FeedConn(self.feed.clone()))
    }
}

type TestDashboard = Dashboard<FakeBackend, FeedTransport, ManualClock>;

fn dashboard() -> (TestDashboard, FakeBackend, FeedTransport) {
    let backend = FakeBackend::default();
    let transport = FeedTransport::default();
    let session = Session::new(
        100,
        Interval::TenSeconds,
        StatusLine::new(DisplayZone::default(), EventLog::disabled()),
        DisplayOptions::default(),
    );
    let supervisor = ConnectionSupervisor::with_clock(
        "ws://test/sensor/ws",
        transport.clone(),
        ManualClock::new(),
        DEFAULT_RECONNECT_DELAY,
        EventLog::disabled(),
    );
    (
        Dashboard::new(session, supervisor, backend.clone()),
        backend,
        transport,
    )
}

// ---------------------------------------------------------------------------
// Start / stop
// ---------------------------------------------------------------------------

#[test]
fn first_start_opens_stream_and_requests_history() {
    let (mut dash, backend, transport) = dashboard();
    dash.start_sensor(SensorTarget::Channel(Channel::Mq2)).unwrap();

    assert_eq!(backend.calls(), vec!["start mq2"]);
    assert_eq!(*transport.opens.borrow(), 1);
    assert!(dash.supervisor().is_connected());
    assert!(dash.session().active().contains(Channel::Mq2));

    let requests = dash.session_mut().take_history_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].interval, Interval::TenSeconds);
}

#[test]
fn start_while_connected_refetches_history() {
    let (mut dash, _backend, transport) = dashboard();
    dash.start_sensor(SensorTarget::Channel(Channel::Mq2)).unwrap();
    dash.session_mut().take_history_requests();

    dash.start_sensor(SensorTarget::Channel(Channel::Mq4)).unwrap();
    assert_eq!(*transport.opens.borrow(), 1);
    assert_eq!(dash.session_mut().take_history_requests().len(), 1);
    assert_eq!(
        dash.session().active().channels(),
        vec![Channel::Mq2, Channel::Mq4]
    );
}

#[test]
fn start_all_stops_individual_sensors_first() {
    let (mut dash, backend, _) = dashboard();
    dash.start_sensor(SensorTarget::Channel(Channel::Mq135)).unwrap();
    dash.start_sensor(SensorTarget::Channel(Channel::Mq7)).unwrap();
    dash.start_sensor(SensorTarget::All).unwrap();

    assert_eq!(
        backend.calls(),
        vec![
            "start mq135",
            "start mq7",
            "stop mq135",
            "stop mq7",
            "start all",
        ]
    );
    assert!(dash.session().active().is_all());
}

#[test]
fn single_start_after_all_stops_everything_first() {
    let (mut dash, backend, _) = dashboard();
    dash.start_sensor(SensorTarget::All).unwrap();
    dash.start_sensor(SensorTarget::Channel(Channel::Mq4)).unwrap();

    assert_eq!(backend.calls(), vec!["start all", "stop all", "start mq4"]);
    assert!(!dash.session().active().is_all());
    assert_eq!(dash.session().active().channels(), vec![Channel::Mq4]);
}

#[test]
fn failed_start_removes_channel_and_keeps_stream_closed() {
    let (mut dash, backend, transport) = dashboard();
    backend.fail("start mq7");

    assert!(dash.start_sensor(SensorTarget::Channel(Channel::Mq7)).is_err());
    assert!(dash.session().active().is_empty());
    assert_eq!(*transport.opens.borrow(), 0);
}

#[test]
fn stop_closes_stream_and_clears_chart() {
    let (mut dash, backend, transport) = dashboard();
    dash.start_sensor(SensorTarget::All).unwrap();
    transport.feed.push(r#"{"timestamp": "t1", "mq135": 1.0}"#);
    assert_eq!(dash.tick(), Poll::Message);
    assert_eq!(dash.session().buffer().len(), 1);

    dash.stop_sensors().unwrap();
    assert_eq!(backend.calls().last().map(String::as_str), Some("stop all"));
    assert_eq!(dash.supervisor().state(), ConnectionState::Closed);
    assert!(dash.session().buffer().is_empty());
    assert!(dash.session().active().is_empty());
    assert_eq!(dash.tick(), Poll::Stopped);
}

#[test]
fn stop_invalidates_in_flight_history() {
    let (mut dash, _, _) = dashboard();
    dash.start_sensor(SensorTarget::All).unwrap();
    let request = dash.session_mut().take_history_requests()[0];

    dash.stop_sensors().unwrap();
    let late = History {
        readings: vec![Reading::new("old").with(Channel::Mq2, 1.0)],
        skipped: 0,
    };
    assert!(!dash.session_mut().apply_history(request, Ok(late)));
    assert!(dash.session().buffer().is_empty());
}

#[test]
fn failed_stop_keeps_stream_open() {
    let (mut dash, backend, _) = dashboard();
    dash.start_sensor(SensorTarget::All).unwrap();
    backend.fail("stop all");

    assert!(dash.stop_sensors().is_err());
    assert!(dash.supervisor().is_connected());
}

// ---------------------------------------------------------------------------
// AI and interval
// ---------------------------------------------------------------------------

#[test]
fn ai_toggle_flips_only_on_success() {
    let (mut dash, backend, _) = dashboard();
    assert_eq!(dash.session().ai_result(), AI_INACTIVE);

    dash.toggle_ai().unwrap();
    assert!(dash.session().ai_running());
    assert_eq!(dash.session().ai_result(), AI_WAITING);

    backend.fail("stop ai");
    assert!(dash.toggle_ai().is_err());
    assert!(dash.session().ai_running());

    assert_eq!(backend.calls(), vec!["start ai", "stop ai"]);
}

#[test]
fn ai_composition_updates_result_text() {
    let (mut dash, _, transport) = dashboard();
    dash.toggle_ai().unwrap();
    dash.start_sensor(SensorTarget::All).unwrap();

    transport.feed.push(
        r#"{"timestamp": "t1", "mq135": 1.0,
            "ai_classification": {"composition": {"Arabika": 0.8, "Robusta": 0.2}}}"#,
    );
    dash.tick();
    assert_eq!(dash.session().ai_result(), "80.00% Arabika, 20.00% Robusta");
}

#[test]
fn interval_change_queues_only_latest_fetch_as_current() {
    let (mut dash, _, _) = dashboard();
    dash.set_interval(Interval::OneMinute);
    dash.set_interval(Interval::FiveMinutes);
    let requests = dash.session_mut().take_history_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(dash.session().interval(), Interval::FiveMinutes);

    let batch = || History {
        readings: vec![Reading::new("h1").with(Channel::Mq2, 0.5)],
        skipped: 0,
    };
    assert!(!dash.session_mut().apply_history(requests[0], Ok(batch())));
    assert!(dash.session_mut().apply_history(requests[1], Ok(batch())));
    assert_eq!(dash.session().buffer().len(), 1);
}

#[test]
fn failed_refetch_after_switching_to_all_clears_old_series() {
    let (mut dash, _, transport) = dashboard();
    dash.start_sensor(SensorTarget::Channel(Channel::Mq135)).unwrap();
    transport.feed.push(r#"{"timestamp": "t1", "mq135": 1.0}"#);
    assert_eq!(dash.tick(), Poll::Message);
    assert_eq!(dash.session().buffer().len(), 1);

    dash.start_sensor(SensorTarget::All).unwrap();
    let request = *dash.session_mut().take_history_requests().last().unwrap();
    let failure = Err(Error::RequestFailure("HTTP error: 500".into()));
    assert!(dash.session_mut().apply_history(request, failure));
    assert!(dash.session().buffer().is_empty());
}

#[test]
fn failed_refetch_after_interval_change_clears_old_series() {
    let (mut dash, _, transport) = dashboard();
    dash.start_sensor(SensorTarget::All).unwrap();
    transport.feed.push(r#"{"timestamp": "t1", "mq2": 0.4}"#);
    dash.tick();
    dash.session_mut().take_history_requests();

    dash.set_interval(Interval::OneMinute);
    assert!(dash.session().buffer().is_empty());
    let request = dash.session_mut().take_history_requests()[0];
    let failure = Err(Error::RequestFailure("HTTP error: 500".into()));
    assert!(dash.session_mut().apply_history(request, failure));
    assert!(dash.session().buffer().is_empty());
}
