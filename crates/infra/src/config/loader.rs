//! Configuration loader
//!
//! Loads relay configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. A `.env` file in the working directory is applied (if present)
//! 2. Attempts to load from environment variables
//! 3. If the required variables are missing, falls back to a config file
//! 4. Probes multiple paths for config files
//! 5. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! Required:
//! - `BDAYBOT_BRIDGE_COMMAND`: Bridge executable
//! - `BDAYBOT_STORAGE`: `local`, `object_store` or `memory`
//!
//! Optional:
//! - `BDAYBOT_PRIMARY_GROUP`: Display name of the default target group
//! - `BDAYBOT_ENVIRONMENT`: `interactive` or `ephemeral` (defaults to
//!   `ephemeral` when `CI` is set, `interactive` otherwise)
//! - `BDAYBOT_BRIDGE_ARGS`: Whitespace-separated bridge arguments
//! - `BDAYBOT_STORAGE_ROOT`: Directory for the `local` backend
//! - `BDAYBOT_OBJECT_STORE_ENDPOINT`, `BDAYBOT_OBJECT_STORE_BUCKET`,
//!   `BDAYBOT_OBJECT_STORE_TOKEN`: Settings for the `object_store` backend
//! - `BDAYBOT_INITIALIZE_TIMEOUT_SECS`, `BDAYBOT_RECONNECT_DELAY_MS`,
//!   `BDAYBOT_MAX_SEND_ATTEMPTS`, `BDAYBOT_SEND_BACKOFF_SECS`
//! - `BDAYBOT_AUTH_REFRESH_DAYS`
//! - `BDAYBOT_SCHEDULE_CRON`, `BDAYBOT_JOB_TIMEOUT_SECS`
//!
//! ## File Locations
//! The loader searches the following paths (in order):
//! 1. `./bdaybot.toml` or `./bdaybot.json` (current working directory)
//! 2. `./config.toml` or `./config.json` (current working directory)
//! 3. `../bdaybot.toml` or `../bdaybot.json` (parent directory)
//! 4. Relative to executable location

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use bdaybot_domain::constants::{
    INITIALIZE_TIMEOUT, MAX_SEND_ATTEMPTS, RECONNECT_DELAY, SEND_RETRY_BACKOFF,
};
use bdaybot_domain::{
    AuthConfig, BridgeConfig, Config, Environment, MessagingConfig, RelayError, Result,
    ScheduleConfig, StorageConfig,
};

const CONFIG_FILE_NAMES: [&str; 4] = ["bdaybot.toml", "bdaybot.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `RelayError::Configuration` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Required fields are missing
pub fn load() -> Result<Config> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "config.dotenv.applied");
    }

    match load_from_env() {
        Ok(config) => {
            tracing::info!(source = "environment", "config.loaded");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "config.env.incomplete");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `RelayError::Configuration` if required variables are missing
/// or have invalid values.
pub fn load_from_env() -> Result<Config> {
    let command = env_var("BDAYBOT_BRIDGE_COMMAND")?;
    let storage = storage_from_env()?;

    let environment = match env_opt("BDAYBOT_ENVIRONMENT") {
        Some(raw) => Environment::from_str(&raw).map_err(RelayError::Configuration)?,
        None if env_bool("CI", false) => Environment::Ephemeral,
        None => Environment::default(),
    };

    let messaging = MessagingConfig {
        primary_group: env_opt("BDAYBOT_PRIMARY_GROUP"),
        environment,
        bridge: BridgeConfig {
            command,
            args: env_opt("BDAYBOT_BRIDGE_ARGS")
                .map(|raw| raw.split_whitespace().map(String::from).collect())
                .unwrap_or_default(),
            env: HashMap::new(),
        },
        initialize_timeout_secs: env_parse(
            "BDAYBOT_INITIALIZE_TIMEOUT_SECS",
            INITIALIZE_TIMEOUT.as_secs(),
        )?,
        reconnect_delay_ms: env_parse(
            "BDAYBOT_RECONNECT_DELAY_MS",
            RECONNECT_DELAY.as_millis() as u64,
        )?,
        max_send_attempts: env_parse("BDAYBOT_MAX_SEND_ATTEMPTS", MAX_SEND_ATTEMPTS)?,
        send_backoff_secs: env_parse(
            "BDAYBOT_SEND_BACKOFF_SECS",
            SEND_RETRY_BACKOFF.as_secs(),
        )?,
    };

    let auth_defaults = AuthConfig::default();
    let schedule_defaults = ScheduleConfig::default();

    Ok(Config {
        messaging,
        storage,
        auth: AuthConfig {
            refresh_threshold_days: env_parse(
                "BDAYBOT_AUTH_REFRESH_DAYS",
                auth_defaults.refresh_threshold_days,
            )?,
        },
        schedule: ScheduleConfig {
            cron_expression: env_opt("BDAYBOT_SCHEDULE_CRON")
                .unwrap_or(schedule_defaults.cron_expression),
            job_timeout_secs: env_parse(
                "BDAYBOT_JOB_TIMEOUT_SECS",
                schedule_defaults.job_timeout_secs,
            )?,
        },
    })
}

fn storage_from_env() -> Result<StorageConfig> {
    let backend = env_var("BDAYBOT_STORAGE")?;
    match backend.to_ascii_lowercase().as_str() {
        "local" => Ok(StorageConfig::Local { root: env_var("BDAYBOT_STORAGE_ROOT")? }),
        "object_store" => Ok(StorageConfig::ObjectStore {
            endpoint: env_var("BDAYBOT_OBJECT_STORE_ENDPOINT")?,
            bucket: env_var("BDAYBOT_OBJECT_STORE_BUCKET")?,
            token: env_opt("BDAYBOT_OBJECT_STORE_TOKEN"),
        }),
        "memory" => Ok(StorageConfig::Memory),
        other => Err(RelayError::Configuration(format!("Unknown storage backend: {other}"))),
    }
}

/// Load configuration from a file
///
/// If `path` is `None`, searches multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `RelayError::Configuration` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Required fields are missing
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(RelayError::Configuration(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => find_config_path().ok_or_else(|| {
            RelayError::Configuration(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "config.file.loading");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| RelayError::Configuration(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| RelayError::Configuration(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| RelayError::Configuration(format!("Invalid JSON format: {e}"))),
        _ => Err(RelayError::Configuration(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// Searches the current working directory, its parent, and the directory of
/// the running executable.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn find_config_path() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd.clone());
        roots.push(cwd.join(".."));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.push(exe_dir.to_path_buf());
        }
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    env_opt(key).ok_or_else(|| {
        RelayError::Configuration(format!("Missing required environment variable: {key}"))
    })
}

/// Non-empty environment variable, if set
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parse an optional environment variable, falling back to `default`
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| RelayError::Configuration(format!("Invalid value for {key}: {e}"))),
        None => Ok(default),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    env_opt(key)
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
