//! Relay composition
//!
//! Wires the bridge transport, the configured blob store and (interactively)
//! the terminal presenter into a ready-to-run [`RelayService`].

use std::sync::Arc;

use bdaybot_core::{
    ConnectionManager, ConnectionSettings, MessageDispatcher, NotificationSource, RelayService,
};
use bdaybot_domain::{Config, Environment, Result};
use tracing::info;

use crate::bridge::BridgeTransport;
use crate::presenter::TerminalLinkPresenter;
use crate::storage::build_blob_store;

/// Build a relay service for `config` delivering what `source` yields.
///
/// The bridge process is not started until the first connect.
///
/// # Errors
/// Returns `RelayError::Configuration` if the storage backend settings are
/// invalid.
pub fn build_relay_service(
    config: &Config,
    source: Arc<dyn NotificationSource>,
) -> Result<RelayService> {
    let store = build_blob_store(&config.storage)?;
    let transport = Arc::new(BridgeTransport::spawn(config.messaging.bridge.clone()));
    let settings = ConnectionSettings::from_config(&config.messaging, &config.auth);

    let mut builder = ConnectionManager::builder(transport, store).settings(settings);
    if config.messaging.environment == Environment::Interactive {
        builder = builder.presenter(Arc::new(TerminalLinkPresenter::default()));
    }
    let connection = builder.build();

    let dispatcher = MessageDispatcher::with_retry(
        connection.clone(),
        config.messaging.max_send_attempts,
        config.messaging.send_backoff(),
    );

    info!(
        environment = %config.messaging.environment,
        bridge = %config.messaging.bridge.command,
        "relay.composed"
    );
    Ok(RelayService::new(connection, dispatcher, source))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use async_trait::async_trait;
    use bdaybot_domain::{
        AuthConfig, BridgeConfig, MessagingConfig, OutboundMessage, RelayError, ScheduleConfig,
        StorageConfig,
    };

    use super::*;

    struct NoMessages;

    #[async_trait]
    impl NotificationSource for NoMessages {
        async fn pending(&self) -> Result<Vec<OutboundMessage>> {
            Ok(Vec::new())
        }
    }

    fn config(storage: StorageConfig) -> Config {
        Config {
            messaging: MessagingConfig {
                primary_group: Some("Family".into()),
                environment: Environment::Ephemeral,
                bridge: BridgeConfig {
                    command: "bdaybot-bridge-that-does-not-exist".into(),
                    args: Vec::new(),
                    env: HashMap::new(),
                },
                initialize_timeout_secs: 60,
                reconnect_delay_ms: 250,
                max_send_attempts: 2,
                send_backoff_secs: 1,
            },
            storage,
            auth: AuthConfig { refresh_threshold_days: 5 },
            schedule: ScheduleConfig::default(),
        }
    }

    #[test]
    fn settings_follow_the_config() {
        let service = build_relay_service(&config(StorageConfig::Memory), Arc::new(NoMessages))
            .expect("composed");

        let settings = service.connection().settings();
        assert_eq!(settings.environment, Environment::Ephemeral);
        assert_eq!(settings.primary_group.as_deref(), Some("Family"));
        assert_eq!(settings.initialize_timeout, Duration::from_secs(60));
        assert_eq!(settings.reconnect_delay, Duration::from_millis(250));
        assert_eq!(settings.refresh_threshold_days, 5);
    }

    #[test]
    fn invalid_object_store_endpoint_is_rejected() {
        let storage = StorageConfig::ObjectStore {
            endpoint: "not a url".into(),
            bucket: "relay".into(),
            token: None,
        };

        let result = build_relay_service(&config(storage), Arc::new(NoMessages));

        assert!(matches!(result, Err(RelayError::Configuration(_))));
    }

    #[tokio::test]
    async fn missing_bridge_fails_the_run_as_misconfiguration() {
        let service = build_relay_service(&config(StorageConfig::Memory), Arc::new(NoMessages))
            .expect("composed");

        let err = service.run().await.unwrap_err();

        assert!(matches!(err, RelayError::Configuration(_)), "got {err:?}");
    }
}
