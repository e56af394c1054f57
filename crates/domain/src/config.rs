//! Configuration structures
//!
//! Deserialized by the infra config loader from environment variables or a
//! TOML/JSON file. Every timing knob has a default.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    AUTH_REFRESH_THRESHOLD_DAYS, INITIALIZE_TIMEOUT, MAX_SEND_ATTEMPTS, RECONNECT_DELAY,
    SEND_RETRY_BACKOFF,
};
use crate::impl_domain_status_conversions;

/// Top-level relay configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub messaging: MessagingConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// Where the process runs, which decides how linking is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// An operator can scan a code on this terminal.
    #[default]
    Interactive,
    /// Short-lived serverless invocation without a terminal or disk.
    Ephemeral,
}

impl_domain_status_conversions!(Environment {
    Interactive => "interactive",
    Ephemeral => "ephemeral",
});

/// Messaging connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// Display name of the group that receives notifications.
    #[serde(default)]
    pub primary_group: Option<String>,
    #[serde(default)]
    pub environment: Environment,
    pub bridge: BridgeConfig,
    #[serde(default = "default_initialize_timeout_secs")]
    pub initialize_timeout_secs: u64,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_max_send_attempts")]
    pub max_send_attempts: u32,
    #[serde(default = "default_send_backoff_secs")]
    pub send_backoff_secs: u64,
}

impl MessagingConfig {
    pub fn initialize_timeout(&self) -> Duration {
        Duration::from_secs(self.initialize_timeout_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn send_backoff(&self) -> Duration {
        Duration::from_secs(self.send_backoff_secs)
    }
}

/// External linked-device bridge process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Durable blob storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Directory on the local filesystem.
    Local { root: String },
    /// HTTP object store addressed as `{endpoint}/{bucket}/{key}`.
    ObjectStore {
        endpoint: String,
        bucket: String,
        #[serde(default)]
        token: Option<String>,
    },
    /// Process-local memory; nothing survives a restart.
    Memory,
}

/// Auth staleness settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_refresh_threshold_days")]
    pub refresh_threshold_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { refresh_threshold_days: default_refresh_threshold_days() }
    }
}

/// Cron schedule for relay runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_cron_expression")]
    pub cron_expression: String,
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cron_expression: default_cron_expression(),
            job_timeout_secs: default_job_timeout_secs(),
        }
    }
}

fn default_initialize_timeout_secs() -> u64 {
    INITIALIZE_TIMEOUT.as_secs()
}

fn default_reconnect_delay_ms() -> u64 {
    RECONNECT_DELAY.as_millis() as u64
}

fn default_max_send_attempts() -> u32 {
    MAX_SEND_ATTEMPTS
}

fn default_send_backoff_secs() -> u64 {
    SEND_RETRY_BACKOFF.as_secs()
}

fn default_refresh_threshold_days() -> i64 {
    AUTH_REFRESH_THRESHOLD_DAYS
}

fn default_cron_expression() -> String {
    "0 0 8 * * *".into() // every day at 08:00
}

fn default_job_timeout_secs() -> u64 {
    600
}
