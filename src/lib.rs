//! Terminal client for an MQ-series gas sensor monitoring backend.
//!
//! Streams live readings over a WebSocket, keeps a bounded per-channel
//! series for charting, and issues sensor/AI commands and history queries
//! over HTTP.

pub mod api;
pub mod buffer;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod logging;
pub mod reading;
pub mod supervisor;
pub mod watch;

pub use error::{Error, Result};
