use std::env;
use std::fs;
use std::path::Path;

use parcelwise_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

use crate::commands::{load_config, CommandResult};

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match load_config("config", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let config_file_path = resolve_config_path(options.config_path.as_deref());
    CommandResult::report(render(&config, config_file_path.as_deref()))
}

pub fn render(config: &AppConfig, config_file_path: Option<&Path>) -> String {
    let config_file_doc = load_config_file_doc(config_file_path);
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path)
    };

    let booking = &config.booking;
    let llm = &config.llm;
    let fields = [
        field(
            "booking.graphql_endpoint",
            booking.graphql_endpoint.clone(),
            &["PARCELWISE_BOOKING_GRAPHQL_ENDPOINT", "DISPATCH_GRAPHQL_ENDPOINT"],
        ),
        field(
            "booking.auth_mode",
            booking.effective_auth_mode().as_str().to_string(),
            &["PARCELWISE_BOOKING_AUTH_MODE", "USE_IDP_AUTH"],
        ),
        field(
            "booking.auth_token",
            redact(booking.auth_token.as_ref()),
            &["PARCELWISE_BOOKING_AUTH_TOKEN", "DISPATCH_AUTH_TOKEN"],
        ),
        field(
            "booking.organization_id",
            booking.organization_id.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["PARCELWISE_BOOKING_ORGANIZATION_ID", "DISPATCH_ORGANIZATION_ID"],
        ),
        field(
            "booking.timeout_secs",
            booking.timeout_secs.to_string(),
            &["PARCELWISE_BOOKING_TIMEOUT_SECS"],
        ),
        field(
            "booking.idp.token_endpoint",
            booking.idp.token_endpoint.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["PARCELWISE_BOOKING_IDP_TOKEN_ENDPOINT", "IDP_TOKEN_ENDPOINT"],
        ),
        field(
            "booking.idp.client_id",
            booking.idp.client_id.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["PARCELWISE_BOOKING_IDP_CLIENT_ID", "IDP_CLIENT_ID"],
        ),
        field(
            "booking.idp.client_secret",
            redact(booking.idp.client_secret.as_ref()),
            &["PARCELWISE_BOOKING_IDP_CLIENT_SECRET", "IDP_CLIENT_SECRET"],
        ),
        field(
            "booking.idp.scope",
            booking.idp.scope.clone(),
            &["PARCELWISE_BOOKING_IDP_SCOPE", "IDP_SCOPE"],
        ),
        field("llm.provider", llm.provider.as_str().to_string(), &["PARCELWISE_LLM_PROVIDER"]),
        field(
            "llm.api_key",
            redact(llm.api_key.as_ref()),
            &["PARCELWISE_LLM_API_KEY", "ANTHROPIC_API_KEY"],
        ),
        field("llm.base_url", llm.base_url.clone(), &["PARCELWISE_LLM_BASE_URL"]),
        field("llm.model", llm.model.clone(), &["PARCELWISE_LLM_MODEL"]),
        field("llm.max_tokens", llm.max_tokens.to_string(), &["PARCELWISE_LLM_MAX_TOKENS"]),
        field("llm.timeout_secs", llm.timeout_secs.to_string(), &["PARCELWISE_LLM_TIMEOUT_SECS"]),
        field(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["PARCELWISE_SERVER_BIND_ADDRESS"],
        ),
        field("server.port", config.server.port.to_string(), &["PARCELWISE_SERVER_PORT"]),
        field(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["PARCELWISE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        field(
            "session.max_age_secs",
            config.session.max_age_secs.to_string(),
            &["PARCELWISE_SESSION_MAX_AGE_SECS"],
        ),
        field(
            "session.sweep_interval_secs",
            config.session.sweep_interval_secs.to_string(),
            &["PARCELWISE_SESSION_SWEEP_INTERVAL_SECS"],
        ),
        field(
            "logging.level",
            config.logging.level.clone(),
            &["PARCELWISE_LOGGING_LEVEL", "PARCELWISE_LOG_LEVEL"],
        ),
        field(
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            &["PARCELWISE_LOGGING_FORMAT", "PARCELWISE_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in fields {
        lines.push(render_line(key, &value, source(key, env_keys)));
    }
    lines.join("\n")
}

type Field = (&'static str, String, &'static [&'static str]);

fn field(key: &'static str, value: String, env_keys: &'static [&'static str]) -> Field {
    (key, value, env_keys)
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact(secret: Option<&SecretString>) -> String {
    match secret.map(|secret| secret.expose_secret().trim().is_empty()) {
        None => "<unset>".to_string(),
        Some(true) => "<empty>".to_string(),
        Some(false) => "<redacted>".to_string(),
    }
}
