//! Structured logging setup
//!
//! Interactive runs log human-readable lines to stderr. Ephemeral runs emit
//! one JSON object per line so the hosting platform can index the fields,
//! including the link-token marker line.
//!
//! The filter comes from `RUST_LOG` when set, otherwise [`DEFAULT_FILTER`].

use bdaybot_domain::{Environment, RelayError, Result};
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Interactive => LogFormat::Pretty,
            Environment::Ephemeral => LogFormat::Json,
        }
    }
}

/// Install the global subscriber for `environment`.
///
/// # Errors
/// Returns `RelayError::Configuration` if a global subscriber is already set.
pub fn init_tracing(environment: Environment) -> Result<()> {
    let format = LogFormat::for_environment(environment);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
    };

    installed.map_err(|e| RelayError::Configuration(format!("tracing already initialized: {e}")))
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ephemeral_runs_log_json() {
        assert_eq!(LogFormat::for_environment(Environment::Ephemeral), LogFormat::Json);
        assert_eq!(LogFormat::for_environment(Environment::Interactive), LogFormat::Pretty);
    }

    #[test]
    fn second_init_is_rejected() {
        let _ = init_tracing(Environment::Interactive);
        let err = init_tracing(Environment::Ephemeral).unwrap_err();
        assert!(matches!(err, RelayError::Configuration(_)));
    }
}
