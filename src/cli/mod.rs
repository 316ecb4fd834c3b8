//! One-shot subcommand implementations.
//!
//! Provides handlers for:
//! - `gasmon start <sensor|all>` / `gasmon stop [sensor]`: sensor commands
//! - `gasmon ai start|stop`: AI classifier
//! - `gasmon history <interval>`: stored readings for a window
//! - `gasmon latest`: most recent reading
//! - `gasmon health`: config, backend and stream reachability
//! - `gasmon config show|init|set|reset|path`: configuration management

use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;

use crate::api::{BackendClient, Interval, SensorTarget};
use crate::config::{self, GasmonConfig};
use crate::dashboard::render::{ChannelVisibility, render_header, render_row};
use crate::logging::EventLog;
use crate::reading::format::{DisplayZone, format_classification};
use crate::reading::{Channel, Reading};
use crate::supervisor::{Connection, Transport, WsTransport};

/// Output format for data commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl OutputFormat {
    pub fn from_str_opt(s: Option<&str>) -> Self {
        match s {
            Some("json") => Self::Json,
            Some("csv") => Self::Csv,
            _ => Self::Table,
        }
    }
}

// ---------------------------------------------------------------------------
// gasmon start | stop | ai
// ---------------------------------------------------------------------------

/// Start one sensor or all of them.
pub fn run_start(config: &GasmonConfig, target: SensorTarget) -> Result<()> {
    let client = BackendClient::from_config(&config.backend);
    let message = client
        .start_sensor(target)
        .with_context(|| format!("failed to start {target}"))?;
    report_command(config, "start", &message);
    Ok(())
}

/// Stop one sensor, or all sensors when none is given.
pub fn run_stop(config: &GasmonConfig, channel: Option<Channel>) -> Result<()> {
    let client = BackendClient::from_config(&config.backend);
    let message = match channel {
        Some(c) => client
            .stop_sensor(c)
            .with_context(|| format!("failed to stop {c}"))?,
        None => client.stop_all().context("failed to stop sensors")?,
    };
    report_command(config, "stop", &message);
    Ok(())
}

/// Start or stop the AI classifier.
pub fn run_ai(config: &GasmonConfig, start: bool) -> Result<()> {
    let client = BackendClient::from_config(&config.backend);
    let message = if start {
        client.start_ai().context("failed to start AI")?
    } else {
        client.stop_ai().context("failed to stop AI")?
    };
    report_command(config, "ai", &message);
    Ok(())
}

fn report_command(config: &GasmonConfig, kind: &str, message: &str) {
    EventLog::from_config(&config.logging).info(kind, message);
    println!("{} {}", "✓".green().bold(), message);
}

// ---------------------------------------------------------------------------
// gasmon history | latest
// ---------------------------------------------------------------------------

/// Print stored readings for one history window.
pub fn run_history(config: &GasmonConfig, interval: Interval, format: OutputFormat) -> Result<()> {
    let client = BackendClient::from_config(&config.backend);
    let history = client
        .history(interval)
        .with_context(|| format!("failed to fetch history for {interval}"))?;

    if history.skipped > 0 {
        EventLog::from_config(&config.logging).warn(
            "history",
            &format!("skipped {} malformed records", history.skipped),
        );
    }

    if history.readings.is_empty() && format == OutputFormat::Table {
        println!("{}", format!("No data for interval {interval}").yellow());
        return Ok(());
    }

    print_readings(config, &history.readings, format)?;

    if format == OutputFormat::Table && history.skipped > 0 {
        println!(
            "{}",
            format!("({} malformed records skipped)", history.skipped).dimmed()
        );
    }
    Ok(())
}

/// Print the most recent reading.
pub fn run_latest(config: &GasmonConfig, format: OutputFormat) -> Result<()> {
    let client = BackendClient::from_config(&config.backend);
    match client.latest().context("failed to fetch latest reading")? {
        Some(reading) => print_readings(config, std::slice::from_ref(&reading), format),
        None => {
            println!("{}", "No sensor data available yet.".yellow());
            Ok(())
        }
    }
}

fn print_readings(config: &GasmonConfig, readings: &[Reading], format: OutputFormat) -> Result<()> {
    let zone = config.display.zone();
    match format {
        OutputFormat::Json => print_readings_json(readings)?,
        OutputFormat::Csv => print_readings_csv(readings),
        OutputFormat::Table => print_readings_table(readings, &zone, config.display.precision),
    }
    Ok(())
}

fn print_readings_table(readings: &[Reading], zone: &DisplayZone, precision: usize) {
    let visibility = ChannelVisibility::all();
    println!("{}", render_header(visibility).bold());
    for (i, reading) in readings.iter().enumerate() {
        let line = render_row(reading, visibility, zone, precision);
        if i % 2 == 0 {
            println!("{line}");
        } else {
            println!("{}", line.dimmed());
        }
    }
}

fn reading_json(reading: &Reading) -> serde_json::Value {
    let mut object = serde_json::Map::new();
    object.insert("timestamp".into(), reading.timestamp.clone().into());
    for channel in Channel::ALL {
        object.insert(channel.as_str().into(), reading.value(channel).into());
    }
    object.insert("label".into(), reading.label.clone().into());
    let classification = reading
        .classification
        .as_ref()
        .map(|c| format_classification(Some(c)));
    object.insert("classification".into(), classification.into());
    serde_json::Value::Object(object)
}

fn print_readings_json(readings: &[Reading]) -> Result<()> {
    let value: Vec<serde_json::Value> = readings.iter().map(reading_json).collect();
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn csv_line(reading: &Reading) -> String {
    let mut fields = vec![csv_field(&reading.timestamp)];
    for channel in Channel::ALL {
        fields.push(reading.value(channel).map(|v| v.to_string()).unwrap_or_default());
    }
    fields.push(csv_field(reading.label.as_deref().unwrap_or("")));
    let classification = match &reading.classification {
        Some(c) => format_classification(Some(c)),
        None => String::new(),
    };
    fields.push(csv_field(&classification));
    fields.join(",")
}

fn print_readings_csv(readings: &[Reading]) {
    println!("timestamp,mq135,mq2,mq4,mq7,label,classification");
    for reading in readings {
        println!("{}", csv_line(reading));
    }
}

/// Quote a CSV field when it contains a separator or quote.
fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

// ---------------------------------------------------------------------------
// gasmon health
// ---------------------------------------------------------------------------

/// Check config files, backend reachability, the stream endpoint, and the
/// event log.
pub fn run_health(config: &GasmonConfig) -> Result<()> {
    println!("{}", "gasmon Health Check".bold().cyan());
    println!("{}", "=".repeat(40));

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    print_health_item(
        "Global config",
        global_exists,
        if global_exists {
            "~/.gasmon/config.toml found"
        } else {
            "not found (run `gasmon config init` to create)"
        },
    );
    print_health_item(
        "Project config",
        project_exists,
        if project_exists {
            ".gasmon.toml found"
        } else {
            "none (optional)"
        },
    );

    let client = BackendClient::from_config(&config.backend);
    match client.latest() {
        Ok(Some(reading)) => print_health_item(
            "Backend",
            true,
            &format!("reachable at {}, last reading {}", client.base_url(), reading.timestamp),
        ),
        Ok(None) => print_health_item(
            "Backend",
            true,
            &format!("reachable at {}, no data yet", client.base_url()),
        ),
        Err(e) => print_health_item("Backend", false, &e.to_string()),
    }

    let stream_url = config.backend.resolved_stream_url();
    let mut transport = WsTransport::new(
        Duration::from_millis(config.backend.timeout_ms),
        Duration::from_millis(config.stream.poll_interval_ms),
    );
    match transport.open(&stream_url) {
        Ok(mut conn) => {
            conn.close();
            print_health_item("Stream", true, &format!("handshake ok at {stream_url}"));
        }
        Err(e) => print_health_item("Stream", false, &e.to_string()),
    }

    let events = EventLog::from_config(&config.logging);
    let log_exists = events.path().map(|p| p.exists()).unwrap_or(false);
    let log_detail = match events.path() {
        None => "disabled".to_string(),
        Some(p) if log_exists => {
            let lines = std::fs::read_to_string(p)
                .map(|s| s.lines().count())
                .unwrap_or(0);
            format!("{} entries in {}", lines, p.display())
        }
        Some(_) => "no log file yet".to_string(),
    };
    print_health_item("Event log", log_exists, &log_detail);

    Ok(())
}

fn print_health_item(name: &str, ok: bool, detail: &str) {
    let status = if ok {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    println!("  {} {:<16} {}", status, name, detail.dimmed());
}

// ---------------------------------------------------------------------------
// gasmon config show | init | set | reset | path
// ---------------------------------------------------------------------------

/// Show the effective (merged) configuration as TOML.
pub fn run_config_show() -> Result<()> {
    let toml_str = config::show_effective_config()?;
    println!("{}", "Effective gasmon Configuration".bold().cyan());
    println!("{}", "=".repeat(50));
    println!();
    println!("{toml_str}");

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    println!("{}", "Sources (highest priority last):".dimmed());
    println!("  {} built-in defaults", "·".dimmed());
    print_source("~/.gasmon/config.toml", global_exists);
    print_source(".gasmon.toml", project_exists);
    println!(
        "  {} {}",
        "·".dimmed(),
        "GASMON_* environment variables".dimmed()
    );

    Ok(())
}

fn print_source(name: &str, exists: bool) {
    if exists {
        println!("  {} {}", "✓".green(), name.dimmed());
    } else {
        println!("  {} {}", "·".dimmed(), format!("{name} (not found)").dimmed());
    }
}

/// Initialize a default config file at `~/.gasmon/config.toml`.
pub fn run_config_init(force: bool) -> Result<()> {
    let path = config::init_config(force)?;
    println!(
        "{} Config written to {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

/// Set a single configuration value in the global config file.
pub fn run_config_set(key: &str, value: &str) -> Result<()> {
    config::set_config_value(key, value)?;
    println!("{} Set {} = {}", "✓".green().bold(), key.bold(), value);
    Ok(())
}

/// Reset configuration to defaults.
pub fn run_config_reset() -> Result<()> {
    let path = config::reset_config()?;
    println!(
        "{} Config reset to defaults at {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

/// Print where each config layer lives.
pub fn run_config_path() -> Result<()> {
    let global = config::global_config_file().context("cannot determine home directory")?;
    println!("global:  {}", global.display());
    if let Some(project) = config::project_config_file() {
        println!("project: {}", project.display());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
