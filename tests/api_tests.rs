/// BackendClient against a local fake backend.
///
/// Each test starts a `tiny_http` server on an ephemeral port that answers
/// a fixed list of routes and records the requests it saw.
use std::thread::{self, JoinHandle};
use std::time::Duration;

use gasmon::Error;
use gasmon::api::{BackendClient, Interval, SensorTarget};
use gasmon::reading::{Channel, Classification};
use tiny_http::{Header, Response, Server};

struct Route {
    status: u16,
    body: &'static str,
}

fn route(status: u16, body: &'static str) -> Route {
    Route { status, body }
}

/// Serve the routes in order, one request each. Joins to the list of
/// `METHOD /path` lines received.
fn fake_backend(routes: Vec<Route>) -> (BackendClient, JoinHandle<Vec<String>>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        for route in routes {
            let request = server.recv().unwrap();
            seen.push(format!("{} {}", request.method(), request.url()));
            let content_type =
                Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
            let response = Response::from_string(route.body)
                .with_status_code(route.status)
                .with_header(content_type);
            request.respond(response).unwrap();
        }
        seen
    });
    let client = BackendClient::new(&format!("http://{addr}/"), Duration::from_secs(5));
    (client, handle)
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[test]
fn sensor_commands_hit_expected_paths() {
    let (client, server) = fake_backend(vec![
        route(200, r#"{"message": "Sensor mq135 started"}"#),
        route(200, r#"{"message": "All sensors started"}"#),
        route(200, r#"{"message": "Sensor mq7 stopped"}"#),
        route(200, r#"{"message": "All sensors stopped"}"#),
    ]);

    assert_eq!(
        client.start_sensor(SensorTarget::Channel(Channel::Mq135)).unwrap(),
        "Sensor mq135 started"
    );
    client.start_sensor(SensorTarget::All).unwrap();
    client.stop_sensor(Channel::Mq7).unwrap();
    assert_eq!(client.stop_all().unwrap(), "All sensors stopped");

    assert_eq!(
        server.join().unwrap(),
        vec![
            "POST /sensor/start/mq135",
            "POST /sensor/start/all",
            "POST /sensor/stop/mq7",
            "POST /sensor/stop",
        ]
    );
}

#[test]
fn ai_error_status_is_request_failure() {
    let (client, server) = fake_backend(vec![
        route(200, r#"{"status": "success", "message": "AI started"}"#),
        route(200, r#"{"status": "error", "message": "Model not loaded"}"#),
    ]);

    assert_eq!(client.start_ai().unwrap(), "AI started");
    assert_eq!(
        client.stop_ai().unwrap_err(),
        Error::RequestFailure("Model not loaded".into())
    );
    assert_eq!(
        server.join().unwrap(),
        vec!["POST /sensor/start-ai", "POST /sensor/stop-ai"]
    );
}

#[test]
fn rejected_sensor_command_with_ok_status_is_request_failure() {
    let (client, server) = fake_backend(vec![
        route(200, r#"{"error": "Invalid sensor"}"#),
        route(200, r#"{"message": "Sensor mq2 started", "error": ""}"#),
    ]);

    assert_eq!(
        client
            .start_sensor(SensorTarget::Channel(Channel::Mq7))
            .unwrap_err(),
        Error::RequestFailure("Invalid sensor".into())
    );
    assert_eq!(
        client
            .start_sensor(SensorTarget::Channel(Channel::Mq2))
            .unwrap(),
        "Sensor mq2 started"
    );
    assert_eq!(
        server.join().unwrap(),
        vec!["POST /sensor/start/mq7", "POST /sensor/start/mq2"]
    );
}

#[test]
fn http_error_carries_status_and_detail() {
    let (client, server) = fake_backend(vec![
        route(500, r#"{"detail": "serial port busy"}"#),
        route(404, "not json"),
    ]);

    assert_eq!(
        client.start_sensor(SensorTarget::All).unwrap_err().to_string(),
        "HTTP error: 500 (serial port busy)"
    );
    assert_eq!(
        client.stop_all().unwrap_err().to_string(),
        "HTTP error: 404"
    );
    server.join().unwrap();
}

#[test]
fn undecodable_body_is_request_failure() {
    let (client, server) = fake_backend(vec![route(200, "<html>")]);
    let err = client.stop_all().unwrap_err();
    assert!(matches!(err, Error::RequestFailure(ref m) if m.contains("invalid response")));
    server.join().unwrap();
}

// ---------------------------------------------------------------------------
// History and latest
// ---------------------------------------------------------------------------

#[test]
fn history_decodes_and_skips_malformed_records() {
    let (client, server) = fake_backend(vec![route(
        200,
        r#"[
            {"timestamp": "2025-05-01T10:00:00", "mq135": 0.5, "mq2": null, "mq4": 1.25, "mq7": 0.1, "jenis": "Arabika"},
            {"mq135": 1.0},
            {"timestamp": "2025-05-01T10:00:03", "mq7": 0.2,
             "ai_classification": {"composition": {"Robusta": 0.4, "Arabika": 0.6}}}
        ]"#,
    )]);

    let history = client.history(Interval::OneMinute).unwrap();
    assert_eq!(history.readings.len(), 2);
    assert_eq!(history.skipped, 1);

    let first = &history.readings[0];
    assert_eq!(first.value(Channel::Mq135), Some(0.5));
    assert_eq!(first.value(Channel::Mq2), None);
    assert_eq!(first.label.as_deref(), Some("Arabika"));

    let second = &history.readings[1];
    assert_eq!(
        second.classification,
        Some(Classification::Composition(vec![
            ("Arabika".into(), 0.6),
            ("Robusta".into(), 0.4),
        ]))
    );

    assert_eq!(server.join().unwrap(), vec!["GET /sensor/data/db/1min"]);
}

#[test]
fn empty_history_is_ok() {
    let (client, server) = fake_backend(vec![route(200, "[]")]);
    let history = client.history(Interval::ThreeSeconds).unwrap();
    assert!(history.readings.is_empty());
    assert_eq!(server.join().unwrap(), vec!["GET /sensor/data/db/3s"]);
}

#[test]
fn latest_without_data_is_none() {
    let (client, server) = fake_backend(vec![
        route(200, r#"{"error": "No sensor data available"}"#),
        route(200, r#"{"timestamp": "2025-05-01T10:00:00", "mq4": 2.0}"#),
    ]);

    assert!(client.latest().unwrap().is_none());
    let reading = client.latest().unwrap().unwrap();
    assert_eq!(reading.value(Channel::Mq4), Some(2.0));
    assert_eq!(
        server.join().unwrap(),
        vec!["GET /sensor/latest", "GET /sensor/latest"]
    );
}
