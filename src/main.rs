use anyhow::Result;
use clap::{Parser, Subcommand};

use gasmon::api::{Interval, SensorTarget};
use gasmon::cli::{self, OutputFormat};
use gasmon::config;
use gasmon::reading::Channel;
use gasmon::watch;

#[derive(Debug, Parser)]
#[command(name = "gasmon")]
#[command(about = "Live dashboard and control client for MQ gas sensors")]
struct App {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Stream live readings with an interactive console
    Watch {
        /// History window: 3s, 10s, 30s, 1min, 5min (default from config)
        #[arg(long)]
        interval: Option<Interval>,
    },
    /// Start one sensor (mq135, mq2, mq4, mq7) or all
    Start {
        target: SensorTarget,
    },
    /// Stop one sensor, or all sensors when none is given
    Stop {
        sensor: Option<Channel>,
    },
    /// Start or stop AI classification
    Ai {
        #[command(subcommand)]
        action: AiAction,
    },
    /// Show stored readings for a history window
    History {
        /// 3s, 10s, 30s, 1min, 5min
        #[arg(default_value = "3s")]
        interval: Interval,
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Show the most recent reading
    Latest {
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Check config, backend and stream reachability
    Health,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum AiAction {
    Start,
    Stop,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Write the default config to ~/.gasmon/config.toml
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Set a dotted key, e.g. `stream.capacity 600`
    Set { key: String, value: String },
    /// Overwrite the global config with defaults
    Reset,
    /// Print config file locations
    Path,
}

fn main() -> Result<()> {
    let app = App::parse();

    match app.command {
        Commands::Config { action } => run_config(action),
        command => run(command),
    }
}

fn run(command: Commands) -> Result<()> {
    let cfg = config::load();
    match command {
        Commands::Watch { interval } => watch::run(&cfg, interval),
        Commands::Start { target } => cli::run_start(&cfg, target),
        Commands::Stop { sensor } => cli::run_stop(&cfg, sensor),
        Commands::Ai { action } => cli::run_ai(&cfg, matches!(action, AiAction::Start)),
        Commands::History { interval, format } => {
            let fmt = OutputFormat::from_str_opt(Some(&format));
            cli::run_history(&cfg, interval, fmt)
        }
        Commands::Latest { format } => {
            let fmt = OutputFormat::from_str_opt(Some(&format));
            cli::run_latest(&cfg, fmt)
        }
        Commands::Health => cli::run_health(&cfg),
        Commands::Config { action } => run_config(action),
    }
}

fn run_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => cli::run_config_show(),
        ConfigAction::Init { force } => cli::run_config_init(force),
        ConfigAction::Set { key, value } => cli::run_config_set(&key, &value),
        ConfigAction::Reset => cli::run_config_reset(),
        ConfigAction::Path => cli::run_config_path(),
    }
}
