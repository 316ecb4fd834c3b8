//! Streaming transport seam and its WebSocket implementation.
//!
//! The supervisor only needs three things from a transport: open a
//! connection, receive at most one frame without blocking indefinitely, and
//! close. [`WsTransport`] provides them with `tungstenite` over a plain TCP
//! stream whose read timeout bounds each receive.

use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tungstenite::client::IntoClientRequest;
use tungstenite::{Message, WebSocket};

use crate::error::{Error, Result};

/// Outcome of a single receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text frame.
    Text(String),
    /// Nothing arrived within the poll window (or a control frame did).
    Idle,
    /// The peer closed the connection.
    Closed,
}

/// One open streaming connection.
pub trait Connection {
    fn recv(&mut self) -> Result<Inbound>;
    fn close(&mut self);
}

/// Factory for connections.
pub trait Transport {
    type Conn: Connection;
    fn open(&mut self, url: &str) -> Result<Self::Conn>;
}

// ---------------------------------------------------------------------------
// WebSocket implementation
// ---------------------------------------------------------------------------

/// Plain `ws://` transport.
#[derive(Debug, Clone)]
pub struct WsTransport {
    connect_timeout: Duration,
    poll_interval: Duration,
}

impl WsTransport {
    pub fn new(connect_timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            connect_timeout,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }
}

impl Transport for WsTransport {
    type Conn = WsConnection;

    fn open(&mut self, url: &str) -> Result<WsConnection> {
        let request = url
            .into_client_request()
            .map_err(|e| Error::TransportFailure(format!("invalid stream URL {url}: {e}")))?;

        let uri = request.uri();
        match uri.scheme_str() {
            Some("ws") => {}
            Some(other) => {
                return Err(Error::TransportFailure(format!(
                    "unsupported stream scheme '{other}' (only ws:// is supported)"
                )));
            }
            None => return Err(Error::TransportFailure(format!("stream URL has no scheme: {url}"))),
        }
        let host = uri
            .host()
            .ok_or_else(|| Error::TransportFailure(format!("stream URL has no host: {url}")))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = uri.port_u16().unwrap_or(80);

        let addr = (host.as_str(), port)
            .to_socket_addrs()
            .map_err(|e| Error::TransportFailure(format!("cannot resolve {host}: {e}")))?
            .next()
            .ok_or_else(|| Error::TransportFailure(format!("no address for {host}")))?;

        let stream = TcpStream::connect_timeout(&addr, self.connect_timeout)
            .map_err(|e| Error::TransportFailure(format!("connect to {addr} failed: {e}")))?;
        // Handshake under the connect timeout, then switch to the poll window.
        stream
            .set_read_timeout(Some(self.connect_timeout))
            .map_err(|e| Error::TransportFailure(e.to_string()))?;

        let (socket, _response) = tungstenite::client(request, stream)
            .map_err(|e| Error::TransportFailure(format!("handshake failed: {e}")))?;

        socket
            .get_ref()
            .set_read_timeout(Some(self.poll_interval))
            .map_err(|e| Error::TransportFailure(e.to_string()))?;

        Ok(WsConnection { socket })
    }
}

/// Open WebSocket connection.
pub struct WsConnection {
    socket: WebSocket<TcpStream>,
}

impl Connection for WsConnection {
    fn recv(&mut self) -> Result<Inbound> {
        match self.socket.read() {
            Ok(Message::Text(text)) => Ok(Inbound::Text(text)),
            Ok(Message::Close(_)) => Ok(Inbound::Closed),
            Ok(_) => Ok(Inbound::Idle),
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                Ok(Inbound::Closed)
            }
            Err(tungstenite::Error::Io(e))
                if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
            {
                Ok(Inbound::Idle)
            }
            Err(e) => Err(Error::TransportFailure(e.to_string())),
        }
    }

    fn close(&mut self) {
        let _ = self.socket.close(None);
        let _ = self.socket.flush();
    }
}
