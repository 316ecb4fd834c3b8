/// Configuration system for gasmon.
///
/// Provides a layered configuration hierarchy:
///
/// 1. **Built-in defaults**: hardcoded in [`schema::GasmonConfig::default()`]
/// 2. **User global config**: `~/.gasmon/config.toml`
/// 3. **Project local config**: `.gasmon.toml` in the current working directory
/// 4. **Environment variables**: `GASMON_*` overrides (highest precedence)
///
/// A file layer replaces the previous one wholesale; because every section
/// deserializes with `serde(default)`, keys missing from the file keep their
/// built-in values.
///
/// # Usage
///
/// ```rust,ignore
/// let cfg = gasmon::config::load();
/// let client = gasmon::api::BackendClient::from_config(&cfg.backend);
/// ```
pub mod schema;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

pub use schema::GasmonConfig;

use crate::api::Interval;
use crate::error::Error;

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the fully resolved configuration.
///
/// Merges all layers in order: defaults → global TOML → project TOML → env
/// vars. Malformed files are skipped so a bad edit never stops the monitor.
pub fn load() -> GasmonConfig {
    let mut config = GasmonConfig::default();

    if let Some(global) = load_toml_file(global_config_path()) {
        config = global;
    }

    if let Some(project) = load_toml_file(project_config_path()) {
        config = project;
    }

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    config
}

/// Load a TOML config file from the given path (if it exists and parses).
fn load_toml_file(path: Option<PathBuf>) -> Option<GasmonConfig> {
    let path = path?;
    let content = fs::read_to_string(&path).ok()?;
    toml::from_str(&content).ok()
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

/// Path to the user global config: `~/.gasmon/config.toml`.
fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".gasmon").join("config.toml"))
}

/// Path to the project local config: `.gasmon.toml` in the current directory.
fn project_config_path() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|cwd| cwd.join(".gasmon.toml"))
}

/// Return the path to the global config file for display/init purposes.
pub fn global_config_file() -> Option<PathBuf> {
    global_config_path()
}

/// Return the path to the project config file for display purposes.
pub fn project_config_file() -> Option<PathBuf> {
    project_config_path()
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides (highest precedence layer).
///
/// Supported variables:
/// - `GASMON_BACKEND_URL`: HTTP base URL
/// - `GASMON_STREAM_URL`: WebSocket URL
/// - `GASMON_TIMEOUT_MS`: request/connect timeout
/// - `GASMON_CAPACITY`: points retained per channel
/// - `GASMON_RECONNECT_DELAY_MS`: reconnect delay
/// - `GASMON_INTERVAL`: default history interval
/// - `GASMON_LOG_LEVEL`: event log level
/// - `GASMON_LOGGING`: event log on/off (`1`/`true`/`yes`/`on`)
///
/// `lookup` is injected so tests can supply variables without touching the
/// process environment.
fn apply_env_overrides(config: &mut GasmonConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup("GASMON_BACKEND_URL")
        && !val.is_empty()
    {
        config.backend.base_url = val;
    }
    if let Some(val) = lookup("GASMON_STREAM_URL")
        && !val.is_empty()
    {
        config.backend.stream_url = val;
    }
    if let Some(val) = lookup("GASMON_TIMEOUT_MS")
        && let Ok(ms) = val.parse::<u64>()
    {
        config.backend.timeout_ms = ms;
    }
    if let Some(val) = lookup("GASMON_CAPACITY")
        && let Ok(n) = val.parse::<usize>()
    {
        config.stream.capacity = n;
    }
    if let Some(val) = lookup("GASMON_RECONNECT_DELAY_MS")
        && let Ok(ms) = val.parse::<u64>()
    {
        config.stream.reconnect_delay_ms = ms;
    }
    if let Some(val) = lookup("GASMON_INTERVAL")
        && let Ok(interval) = val.parse::<Interval>()
    {
        config.stream.default_interval = interval;
    }
    if let Some(val) = lookup("GASMON_LOG_LEVEL")
        && !val.is_empty()
    {
        config.logging.level = val;
    }
    if let Some(val) = lookup("GASMON_LOGGING") {
        config.logging.enabled = is_truthy(&val);
    }
}

/// Check if a string value represents a truthy boolean.
fn is_truthy(val: &str) -> bool {
    matches!(
        val.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

// ---------------------------------------------------------------------------
// Config init / set / reset
// ---------------------------------------------------------------------------

/// Write the default annotated config to `~/.gasmon/config.toml`.
///
/// Returns an error if the file already exists (use `force = true` to
/// overwrite).
pub fn init_config(force: bool) -> Result<PathBuf> {
    let path = global_config_path().context("could not determine home directory")?;

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create ~/.gasmon/ directory")?;
    }

    fs::write(&path, GasmonConfig::default_toml()).context("failed to write config file")?;

    Ok(path)
}

/// Set a single dotted key (e.g. `stream.capacity`) in the global config.
///
/// Starts from the existing file, or from serialized defaults when there is
/// none, and preserves the type of the value being replaced.
pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let path = global_config_path().context("could not determine home directory")?;

    let source = if path.exists() {
        fs::read_to_string(&path).context("failed to read config file")?
    } else {
        toml::to_string_pretty(&GasmonConfig::default())
            .context("failed to serialize default config")?
    };

    let mut root: toml::Value =
        toml::from_str(&source).context("failed to parse config as TOML value")?;
    set_toml_value(&mut root, key, value)?;

    // Reject edits that would no longer load as a config.
    let updated = toml::to_string_pretty(&root).context("failed to serialize config")?;
    toml::from_str::<GasmonConfig>(&updated)
        .map_err(|e| Error::Config(format!("invalid value for '{key}' ({value}): {}", e.message())))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    fs::write(&path, updated).context("failed to write config file")?;

    Ok(())
}

/// Set a value in a TOML value tree using a dotted key path.
fn set_toml_value(root: &mut toml::Value, key: &str, raw_value: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        anyhow::bail!("invalid config key '{key}'");
    }

    let mut current = root;
    for &part in &parts[..parts.len() - 1] {
        current = current
            .get_mut(part)
            .with_context(|| format!("config key not found: section '{part}' in '{key}'"))?;
    }

    let leaf = parts[parts.len() - 1];
    let table = current.as_table_mut().with_context(|| {
        format!(
            "expected table at '{}'",
            key.rsplit_once('.').map(|(s, _)| s).unwrap_or("")
        )
    })?;

    let new_value = match table.get(leaf) {
        Some(toml::Value::Boolean(_)) => toml::Value::Boolean(is_truthy(raw_value)),
        Some(toml::Value::Integer(_)) => {
            let n: i64 = raw_value
                .parse()
                .with_context(|| format!("expected integer for '{key}', got '{raw_value}'"))?;
            toml::Value::Integer(n)
        }
        Some(toml::Value::Float(_)) => {
            let f: f64 = raw_value
                .parse()
                .with_context(|| format!("expected float for '{key}', got '{raw_value}'"))?;
            toml::Value::Float(f)
        }
        Some(_) => toml::Value::String(raw_value.to_string()),
        None => anyhow::bail!("unknown config key '{key}'"),
    };

    table.insert(leaf.to_string(), new_value);
    Ok(())
}

/// Reset the global config to defaults (overwrite the file).
pub fn reset_config() -> Result<PathBuf> {
    init_config(true)
}

/// Show the effective (fully resolved) config as TOML.
pub fn show_effective_config() -> Result<String> {
    let config = load();
    toml::to_string_pretty(&config).context("failed to serialize effective config")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let owned: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| {
            owned
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        }
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = GasmonConfig::default();
        apply_env_overrides(
            &mut cfg,
            env(&[
                ("GASMON_BACKEND_URL", "http://10.0.0.2:8000"),
                ("GASMON_CAPACITY", "300"),
                ("GASMON_RECONNECT_DELAY_MS", "1000"),
                ("GASMON_INTERVAL", "1min"),
                ("GASMON_LOGGING", "off"),
            ]),
        );
        assert_eq!(cfg.backend.base_url, "http://10.0.0.2:8000");
        assert_eq!(cfg.stream.capacity, 300);
        assert_eq!(cfg.stream.reconnect_delay_ms, 1000);
        assert_eq!(cfg.stream.default_interval, Interval::OneMinute);
        assert!(!cfg.logging.enabled);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut cfg = GasmonConfig::default();
        apply_env_overrides(
            &mut cfg,
            env(&[("GASMON_CAPACITY", "lots"), ("GASMON_INTERVAL", "2h")]),
        );
        assert_eq!(cfg.stream.capacity, 1200);
        assert_eq!(cfg.stream.default_interval, Interval::ThreeSeconds);
    }

    #[test]
    fn is_truthy_accepts_variants() {
        assert!(is_truthy("1"));
        assert!(is_truthy("TRUE"));
        assert!(is_truthy("on"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("off"));
        assert!(!is_truthy(""));
    }

    #[test]
    fn set_toml_value_preserves_types() {
        let mut root: toml::Value = toml::from_str(
            "[stream]\ncapacity = 1200\n[logging]\nenabled = true\nlevel = \"info\"\n",
        )
        .unwrap();
        set_toml_value(&mut root, "stream.capacity", "600").unwrap();
        set_toml_value(&mut root, "logging.enabled", "no").unwrap();
        set_toml_value(&mut root, "logging.level", "debug").unwrap();

        assert_eq!(root["stream"]["capacity"].as_integer(), Some(600));
        assert_eq!(root["logging"]["enabled"].as_bool(), Some(false));
        assert_eq!(root["logging"]["level"].as_str(), Some("debug"));
    }

    #[test]
    fn set_toml_value_rejects_unknown_keys() {
        let mut root: toml::Value = toml::from_str("[stream]\ncapacity = 1\n").unwrap();
        assert!(set_toml_value(&mut root, "stream.nope", "1").is_err());
        assert!(set_toml_value(&mut root, "missing.key", "1").is_err());
        assert!(set_toml_value(&mut root, "stream.capacity", "many").is_err());
        assert!(set_toml_value(&mut root, "", "1").is_err());
    }

    #[test]
    fn show_effective_config_returns_toml() {
        let toml_str = show_effective_config().unwrap();
        let _: GasmonConfig = toml::from_str(&toml_str).unwrap();
    }
}
