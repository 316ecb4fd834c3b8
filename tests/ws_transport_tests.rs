/// WsTransport against a loopback `tungstenite` server.
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use gasmon::Error;
use gasmon::supervisor::{Connection, Inbound, Transport, WsTransport};
use tungstenite::Message;

fn transport() -> WsTransport {
    WsTransport::new(Duration::from_secs(2), Duration::from_millis(50))
}

/// Accept one client, send `frames` as text, then close.
fn serve_once(frames: Vec<&'static str>) -> (String, thread::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut socket = tungstenite::accept(stream).unwrap();
        for frame in frames {
            socket.send(Message::text(frame)).unwrap();
        }
        socket.close(None).unwrap();
        // Drive the closing handshake until the client answers.
        while socket.read().is_ok() {}
    });
    (format!("ws://{addr}/sensor/ws"), handle)
}

#[test]
fn receives_text_frames_then_closed() {
    let (url, server) = serve_once(vec![
        r#"{"timestamp": "t1", "mq135": 1.0}"#,
        r#"{"timestamp": "t2", "mq135": 2.0}"#,
    ]);

    let mut conn = transport().open(&url).unwrap();
    let mut texts = Vec::new();
    let mut closed = false;
    for _ in 0..200 {
        match conn.recv().unwrap() {
            Inbound::Text(t) => texts.push(t),
            Inbound::Idle => {}
            Inbound::Closed => {
                closed = true;
                break;
            }
        }
    }
    conn.close();
    server.join().unwrap();

    assert!(closed);
    assert_eq!(texts.len(), 2);
    assert!(texts[0].contains("t1"));
}

#[test]
fn quiet_connection_reports_idle() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut socket = tungstenite::accept(stream).unwrap();
        // Wait for the client's close.
        while socket.read().is_ok() {}
    });

    let mut conn = transport().open(&format!("ws://{addr}/sensor/ws")).unwrap();
    assert_eq!(conn.recv().unwrap(), Inbound::Idle);
    conn.close();
    server.join().unwrap();
}

#[test]
fn refused_connection_is_transport_failure() {
    // Bind then drop to get a port with no listener.
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let err = transport()
        .open(&format!("ws://127.0.0.1:{port}/sensor/ws"))
        .err()
        .unwrap();
    assert!(matches!(err, Error::TransportFailure(_)));
}

#[test]
fn tls_urls_are_rejected() {
    let err = transport().open("wss://example.com/sensor/ws").err().unwrap();
    assert!(err.to_string().contains("only ws://"));
}
