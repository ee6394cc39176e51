use std::sync::Arc;

use parcelwise_agent::ConversationEngine;
use parcelwise_core::config::{AppConfig, ConfigError};
use parcelwise_core::session::ContextManager;
use thiserror::Error;
use tracing::info;

use crate::chat::ChatSessions;

pub struct Application {
    pub config: AppConfig,
    pub engine: Arc<ConversationEngine>,
    pub sessions: Arc<ChatSessions>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Engine(#[from] anyhow::Error),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    config.validate()?;
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        booking_mode = config.booking.effective_auth_mode().as_str(),
        "starting application bootstrap"
    );

    let engine = ConversationEngine::from_config(&config)?;
    info!(
        event_name = "system.bootstrap.engine_ready",
        correlation_id = "bootstrap",
        ai_available = engine.ai_available(),
        "conversation engine initialized"
    );

    Ok(Application {
        config,
        engine: Arc::new(engine),
        sessions: Arc::new(ChatSessions::new(Arc::new(ContextManager::default()))),
    })
}

#[cfg(test)]
mod tests {
    use parcelwise_core::config::{AppConfig, BookingAuthMode, ConfigOverrides, LoadOptions};

    use crate::bootstrap::{bootstrap_with_config, Application, BootstrapError};

    async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
        let config = AppConfig::load(options)?;
        bootstrap_with_config(config).await
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_when_token_mode_has_no_token() {
        let result = bootstrap(LoadOptions {
            config_path: Some("does-not-exist.toml".into()),
            overrides: ConfigOverrides {
                booking_auth_mode: Some(BookingAuthMode::Token),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("token mode without a token must fail").to_string();
        assert!(message.contains("auth_token"), "unexpected error: {message}");
    }

    #[tokio::test]
    async fn bootstrap_in_mock_mode_serves_a_full_session_turn() {
        let app = bootstrap(LoadOptions {
            config_path: Some("does-not-exist.toml".into()),
            overrides: ConfigOverrides {
                booking_auth_mode: Some(BookingAuthMode::Mock),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("mock bootstrap should succeed");

        assert_eq!(app.engine.booking_mode(), BookingAuthMode::Mock);

        let session = app.sessions.create().await.expect("session");
        let reply = app
            .sessions
            .chat(&app.engine, &session.id, "compare pricing for 3 deliveries")
            .await
            .expect("turn");

        assert!(!reply.message.is_empty());
        assert_eq!(reply.session.messages.len(), 2);
        assert!(reply.session.pricing_info.is_some());
    }
}
