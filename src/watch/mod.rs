//! `gasmon watch`: the interactive console dashboard.
//!
//! One loop thread owns all state. Two helper threads feed it through
//! `crossbeam-channel`:
//!
//! - a stdin reader that forwards console lines (channel closes on EOF);
//! - a history worker that performs `GET /sensor/data/db/{interval}` and
//!   sends the result back tagged with its fetch ticket.
//!
//! Between channel events the loop drives the stream supervisor. While a
//! connection is open each `tick` blocks for at most the configured poll
//! interval; otherwise the loop waits on the channels for that long.
//!
//! # Console commands
//!
//! | Command              | Action                                   |
//! |----------------------|------------------------------------------|
//! | `start <sensor|all>` | Start a sensor (or all) and stream       |
//! | `stop`               | Stop all sensors and close the stream    |
//! | `ai`                 | Toggle the AI classifier                 |
//! | `interval <token>`   | Change the history window and refetch    |
//! | `chart`              | Print the sparkline chart                |
//! | `status`             | Print connection and subscription state  |
//! | `help`               | List commands                            |
//! | `quit`               | Exit                                     |

use std::io::BufRead;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use crossbeam_channel::{Receiver, Sender, select, unbounded};

use crate::api::{BackendClient, History, Interval, SensorCommands, SensorTarget};
use crate::config::schema::GasmonConfig;
use crate::dashboard::{Dashboard, DisplayOptions, HistoryRequest, Session};
use crate::logging::{EventLog, StatusLine};
use crate::supervisor::{Clock, ConnectionSupervisor, Poll, Transport, WsTransport};

// ---------------------------------------------------------------------------
// Console commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start(SensorTarget),
    Stop,
    Ai,
    Interval(Interval),
    Chart,
    Status,
    Help,
    Quit,
}

/// Parse one console line. `Ok(None)` for a blank line.
pub fn parse_command(line: &str) -> std::result::Result<Option<ConsoleCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();
    if words.next().is_some() {
        return Err(format!("too many arguments for '{verb}'"));
    }

    let command = match (verb.to_ascii_lowercase().as_str(), arg) {
        ("start", Some(target)) => ConsoleCommand::Start(target.parse()?),
        ("start", None) => return Err("usage: start <mq135|mq2|mq4|mq7|all>".to_string()),
        ("stop", None) => ConsoleCommand::Stop,
        ("ai", None) => ConsoleCommand::Ai,
        ("interval", Some(token)) => ConsoleCommand::Interval(token.parse()?),
        ("interval", None) => return Err("usage: interval <3s|10s|30s|1min|5min>".to_string()),
        ("chart", None) => ConsoleCommand::Chart,
        ("status", None) => ConsoleCommand::Status,
        ("help" | "?", None) => ConsoleCommand::Help,
        ("quit" | "exit" | "q", None) => ConsoleCommand::Quit,
        ("stop" | "ai" | "chart" | "status" | "help" | "quit", Some(_)) => {
            return Err(format!("'{verb}' takes no arguments"));
        }
        (other, _) => return Err(format!("unknown command '{other}' (try 'help')")),
    };
    Ok(Some(command))
}

const HELP: &str = "\
  start <sensor|all>   start mq135, mq2, mq4, mq7 or all sensors
  stop                 stop all sensors and close the stream
  ai                   toggle AI classification
  interval <token>     history window: 3s, 10s, 30s, 1min, 5min
  chart                show the live chart
  status               show connection state
  quit                 exit";

// ---------------------------------------------------------------------------
// Event loop
// ---------------------------------------------------------------------------

/// Run the console dashboard until `quit` or end of input.
pub fn run(config: &GasmonConfig, interval: Option<Interval>) -> Result<()> {
    let events = EventLog::from_config(&config.logging);
    let status = StatusLine::new(config.display.zone(), events.clone());
    let interval = interval.unwrap_or(config.stream.default_interval);
    let poll_interval = Duration::from_millis(config.stream.poll_interval_ms.max(1));

    let session = Session::new(
        config.stream.capacity,
        interval,
        status,
        DisplayOptions {
            precision: config.display.precision,
            chart_width: config.display.chart_width,
        },
    );
    let transport = WsTransport::new(Duration::from_millis(config.backend.timeout_ms), poll_interval);
    let supervisor = ConnectionSupervisor::new(
        config.backend.resolved_stream_url(),
        transport,
        Duration::from_millis(config.stream.reconnect_delay_ms),
        events.clone(),
    );
    let client = BackendClient::from_config(&config.backend);
    let mut dashboard = Dashboard::new(session, supervisor, client.clone());

    println!(
        "{} {} (stream {})",
        "gasmon".bold().cyan(),
        client.base_url(),
        dashboard.supervisor().url()
    );
    println!("{}", "Type 'help' for commands.".dimmed());

    let console = spawn_console_reader();
    let (fetch_tx, results) = spawn_history_worker(client);

    dashboard.session_mut().request_history(interval);
    dashboard.connect();
    dispatch_fetches(&mut dashboard, &fetch_tx);

    let mut console_open = true;
    let mut quit = false;
    while !quit {
        let wait = match dashboard.tick() {
            Poll::Waiting(remaining) => remaining.min(poll_interval),
            Poll::Stopped => poll_interval,
            _ => Duration::ZERO,
        };

        if console_open {
            select! {
                recv(console) -> line => match line {
                    Ok(line) => quit = handle_line(&mut dashboard, &line),
                    Err(_) => console_open = false,
                },
                recv(results) -> done => {
                    if let Ok((request, result)) = done {
                        dashboard.session_mut().apply_history(request, result);
                    }
                }
                default(wait) => {}
            }
        } else {
            // End of input: let the last fetches land, then exit.
            if let Ok((request, result)) = results.recv_timeout(poll_interval) {
                dashboard.session_mut().apply_history(request, result);
                continue;
            }
            break;
        }

        for (request, result) in results.try_iter() {
            dashboard.session_mut().apply_history(request, result);
        }
        dispatch_fetches(&mut dashboard, &fetch_tx);
    }

    events.info("watch", "console closed");
    Ok(())
}

/// Execute one console line. Returns `true` to quit.
fn handle_line<B, T, C>(dashboard: &mut Dashboard<B, T, C>, line: &str) -> bool
where
    B: SensorCommands,
    T: Transport,
    C: Clock,
{
    let command = match parse_command(line) {
        Ok(Some(command)) => command,
        Ok(None) => return false,
        Err(e) => {
            eprintln!("{}", e.yellow());
            return false;
        }
    };

    // Command failures are already reported on the status line.
    match command {
        ConsoleCommand::Start(target) => {
            if dashboard.start_sensor(target).is_ok() {
                println!("{}", dashboard.session().header().bold());
            }
        }
        ConsoleCommand::Stop => {
            let _ = dashboard.stop_sensors();
        }
        ConsoleCommand::Ai => {
            if dashboard.toggle_ai().is_ok() {
                println!("{} {}", "AI:".bold(), dashboard.session().ai_result().cyan());
            }
        }
        ConsoleCommand::Interval(interval) => dashboard.set_interval(interval),
        ConsoleCommand::Chart => {
            for line in dashboard.session().chart() {
                println!("{line}");
            }
        }
        ConsoleCommand::Status => print_status(dashboard),
        ConsoleCommand::Help => println!("{HELP}"),
        ConsoleCommand::Quit => return true,
    }
    false
}

fn print_status<B, T, C>(dashboard: &Dashboard<B, T, C>)
where
    B: SensorCommands,
    T: Transport,
    C: Clock,
{
    let session = dashboard.session();
    let supervisor = dashboard.supervisor();
    let stats = supervisor.stats();

    println!("  {} {:?}", "Stream:   ".bold(), supervisor.state());
    if let Some(remaining) = supervisor.reconnect_pending() {
        println!("  {} in {} ms", "Reconnect:".bold(), remaining.as_millis());
    }
    println!("  {} {}", "Sensors:  ".bold(), session.active());
    println!("  {} {}", "Interval: ".bold(), session.interval());
    println!(
        "  {} {} of {}",
        "Points:   ".bold(),
        session.buffer().len(),
        session.buffer().capacity()
    );
    println!("  {} {}", "AI:       ".bold(), session.ai_result());
    println!(
        "  {} {} connects, {} messages, {} dropped",
        "Totals:   ".bold(),
        stats.connects,
        stats.messages,
        stats.dropped
    );
}

fn dispatch_fetches<B, T, C>(dashboard: &mut Dashboard<B, T, C>, worker: &Sender<HistoryRequest>)
where
    B: SensorCommands,
    T: Transport,
    C: Clock,
{
    for request in dashboard.session_mut().take_history_requests() {
        if worker.send(request).is_err() {
            dashboard
                .session()
                .status()
                .error("history", "history worker stopped");
        }
    }
}

// ---------------------------------------------------------------------------
// Helper threads
// ---------------------------------------------------------------------------

fn spawn_console_reader() -> Receiver<String> {
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

type FetchResult = (HistoryRequest, crate::error::Result<History>);

fn spawn_history_worker(client: BackendClient) -> (Sender<HistoryRequest>, Receiver<FetchResult>) {
    let (request_tx, request_rx) = unbounded::<HistoryRequest>();
    let (result_tx, result_rx) = unbounded();
    thread::spawn(move || {
        for request in request_rx {
            let result = client.history(request.interval);
            if result_tx.send((request, result)).is_err() {
                break;
            }
        }
    });
    (request_tx, result_rx)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::Channel;

    #[test]
    fn parses_commands() {
        assert_eq!(
            parse_command("start mq7").unwrap(),
            Some(ConsoleCommand::Start(SensorTarget::Channel(Channel::Mq7)))
        );
        assert_eq!(
            parse_command("  START all ").unwrap(),
            Some(ConsoleCommand::Start(SensorTarget::All))
        );
        assert_eq!(
            parse_command("interval 1min").unwrap(),
            Some(ConsoleCommand::Interval(Interval::OneMinute))
        );
        assert_eq!(parse_command("q").unwrap(), Some(ConsoleCommand::Quit));
        assert_eq!(parse_command("").unwrap(), None);
    }

    #[test]
    fn rejects_bad_commands() {
        assert!(parse_command("start").is_err());
        assert!(parse_command("start co2").is_err());
        assert!(parse_command("interval 1h").is_err());
        assert!(parse_command("stop now please").is_err());
        assert!(parse_command("reboot").is_err());
    }
}
