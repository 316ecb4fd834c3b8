/// Error taxonomy shared by the library modules.
///
/// None of these are fatal to the process. Malformed stream messages are
/// dropped, transport failures feed the reconnect policy, and request
/// failures surface as a single status line.
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// JSON parse failure or a missing required field in a reading.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// The streaming connection failed to open, errored, or was closed.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// A command or history request returned non-2xx or never completed.
    #[error("{0}")]
    RequestFailure(String),

    /// A config file could not be read, parsed, or written.
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
