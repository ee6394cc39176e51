use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_GRAPHQL_ENDPOINT: &str = "https://monkey.graph.qa.dispatchfog.io/graphql";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const DEFAULT_LLM_MODEL: &str = "claude-3-sonnet-20240229";
/// Upper bound for session ages and sweep intervals: thirty days.
pub const MAX_SESSION_WINDOW_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub booking: BookingConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct BookingConfig {
    pub graphql_endpoint: String,
    /// Explicit mode; `None` derives the mode from the credentials present.
    pub auth_mode: Option<BookingAuthMode>,
    pub auth_token: Option<SecretString>,
    pub idp: IdpConfig,
    pub organization_id: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct IdpConfig {
    pub token_endpoint: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    pub scope: String,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub max_age_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingAuthMode {
    Mock,
    Token,
    Idp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Anthropic,
    Gateway,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub booking_auth_mode: Option<BookingAuthMode>,
    pub graphql_endpoint: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            booking: BookingConfig {
                graphql_endpoint: DEFAULT_GRAPHQL_ENDPOINT.to_string(),
                auth_mode: None,
                auth_token: None,
                idp: IdpConfig {
                    token_endpoint: None,
                    client_id: None,
                    client_secret: None,
                    scope: "dispatch:api".to_string(),
                },
                organization_id: None,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: LlmProvider::Anthropic,
                api_key: None,
                base_url: DEFAULT_LLM_BASE_URL.to_string(),
                model: DEFAULT_LLM_MODEL.to_string(),
                max_tokens: 1000,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            session: SessionConfig { max_age_secs: 3600, sweep_interval_secs: 300 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl BookingConfig {
    pub fn effective_auth_mode(&self) -> BookingAuthMode {
        if let Some(mode) = self.auth_mode {
            return mode;
        }
        if has_secret(self.auth_token.as_ref()) {
            BookingAuthMode::Token
        } else if self.idp.client_id.is_some() && has_secret(self.idp.client_secret.as_ref()) {
            BookingAuthMode::Idp
        } else {
            BookingAuthMode::Mock
        }
    }
}

impl LlmConfig {
    /// Text generation is only attempted when a non-empty key is present.
    pub fn is_configured(&self) -> bool {
        has_secret(self.api_key.as_ref())
    }
}

impl BookingAuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::Token => "token",
            Self::Idp => "idp",
        }
    }
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::Gateway => "gateway",
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

fn has_secret(value: Option<&SecretString>) -> bool {
    value.map(|secret| !secret.expose_secret().trim().is_empty()).unwrap_or(false)
}

impl std::str::FromStr for BookingAuthMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "token" => Ok(Self::Token),
            "idp" => Ok(Self::Idp),
            other => Err(ConfigError::Validation(format!(
                "unsupported booking auth mode `{other}` (expected mock|token|idp)"
            ))),
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "gateway" => Ok(Self::Gateway),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected anthropic|gateway)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("parcelwise.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(booking) = patch.booking {
            if let Some(graphql_endpoint) = booking.graphql_endpoint {
                self.booking.graphql_endpoint = graphql_endpoint;
            }
            if let Some(auth_mode) = booking.auth_mode {
                self.booking.auth_mode = Some(auth_mode);
            }
            if let Some(auth_token_value) = booking.auth_token {
                self.booking.auth_token = Some(secret_value(auth_token_value));
            }
            if let Some(organization_id) = booking.organization_id {
                self.booking.organization_id = Some(organization_id);
            }
            if let Some(timeout_secs) = booking.timeout_secs {
                self.booking.timeout_secs = timeout_secs;
            }
            if let Some(idp) = booking.idp {
                if let Some(token_endpoint) = idp.token_endpoint {
                    self.booking.idp.token_endpoint = Some(token_endpoint);
                }
                if let Some(client_id) = idp.client_id {
                    self.booking.idp.client_id = Some(client_id);
                }
                if let Some(client_secret_value) = idp.client_secret {
                    self.booking.idp.client_secret = Some(secret_value(client_secret_value));
                }
                if let Some(scope) = idp.scope {
                    self.booking.idp.scope = scope;
                }
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(session) = patch.session {
            if let Some(max_age_secs) = session.max_age_secs {
                self.session.max_age_secs = max_age_secs;
            }
            if let Some(sweep_interval_secs) = session.sweep_interval_secs {
                self.session.sweep_interval_secs = sweep_interval_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let endpoint = read_env("PARCELWISE_BOOKING_GRAPHQL_ENDPOINT")
            .or_else(|| read_env("DISPATCH_GRAPHQL_ENDPOINT"));
        if let Some(value) = endpoint {
            self.booking.graphql_endpoint = value;
        }
        if let Some(value) = read_env("PARCELWISE_BOOKING_AUTH_MODE") {
            self.booking.auth_mode = Some(value.parse()?);
        } else if let Some(value) = read_env("USE_IDP_AUTH") {
            if parse_bool("USE_IDP_AUTH", &value)? {
                self.booking.auth_mode = Some(BookingAuthMode::Idp);
            }
        }
        let auth_token =
            read_env("PARCELWISE_BOOKING_AUTH_TOKEN").or_else(|| read_env("DISPATCH_AUTH_TOKEN"));
        if let Some(value) = auth_token {
            self.booking.auth_token = Some(secret_value(value));
        }
        let organization_id = read_env("PARCELWISE_BOOKING_ORGANIZATION_ID")
            .or_else(|| read_env("DISPATCH_ORGANIZATION_ID"));
        if let Some(value) = organization_id {
            self.booking.organization_id = Some(value);
        }
        if let Some(value) = read_env("PARCELWISE_BOOKING_TIMEOUT_SECS") {
            self.booking.timeout_secs = parse_u64("PARCELWISE_BOOKING_TIMEOUT_SECS", &value)?;
        }

        let token_endpoint = read_env("PARCELWISE_BOOKING_IDP_TOKEN_ENDPOINT")
            .or_else(|| read_env("IDP_TOKEN_ENDPOINT"));
        if let Some(value) = token_endpoint {
            self.booking.idp.token_endpoint = Some(value);
        }
        let client_id =
            read_env("PARCELWISE_BOOKING_IDP_CLIENT_ID").or_else(|| read_env("IDP_CLIENT_ID"));
        if let Some(value) = client_id {
            self.booking.idp.client_id = Some(value);
        }
        let client_secret = read_env("PARCELWISE_BOOKING_IDP_CLIENT_SECRET")
            .or_else(|| read_env("IDP_CLIENT_SECRET"));
        if let Some(value) = client_secret {
            self.booking.idp.client_secret = Some(secret_value(value));
        }
        let scope = read_env("PARCELWISE_BOOKING_IDP_SCOPE").or_else(|| read_env("IDP_SCOPE"));
        if let Some(value) = scope {
            self.booking.idp.scope = value;
        }

        if let Some(value) = read_env("PARCELWISE_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        let api_key = read_env("PARCELWISE_LLM_API_KEY").or_else(|| read_env("ANTHROPIC_API_KEY"));
        if let Some(value) = api_key {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("PARCELWISE_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("PARCELWISE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("PARCELWISE_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_u32("PARCELWISE_LLM_MAX_TOKENS", &value)?;
        }
        if let Some(value) = read_env("PARCELWISE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("PARCELWISE_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("PARCELWISE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("PARCELWISE_SERVER_PORT") {
            self.server.port = parse_u16("PARCELWISE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("PARCELWISE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("PARCELWISE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("PARCELWISE_SESSION_MAX_AGE_SECS") {
            self.session.max_age_secs = parse_u64("PARCELWISE_SESSION_MAX_AGE_SECS", &value)?;
        }
        if let Some(value) = read_env("PARCELWISE_SESSION_SWEEP_INTERVAL_SECS") {
            self.session.sweep_interval_secs =
                parse_u64("PARCELWISE_SESSION_SWEEP_INTERVAL_SECS", &value)?;
        }

        let log_level =
            read_env("PARCELWISE_LOGGING_LEVEL").or_else(|| read_env("PARCELWISE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PARCELWISE_LOGGING_FORMAT").or_else(|| read_env("PARCELWISE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(auth_mode) = overrides.booking_auth_mode {
            self.booking.auth_mode = Some(auth_mode);
        }
        if let Some(graphql_endpoint) = overrides.graphql_endpoint {
            self.booking.graphql_endpoint = graphql_endpoint;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_booking(&self.booking)?;
        validate_llm(&self.llm)?;
        validate_server(&self.server)?;
        validate_session(&self.session)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("parcelwise.toml"), PathBuf::from("config/parcelwise.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn validate_booking(booking: &BookingConfig) -> Result<(), ConfigError> {
    if !is_http_url(booking.graphql_endpoint.trim()) {
        return Err(ConfigError::Validation(
            "booking.graphql_endpoint must start with http:// or https://".to_string(),
        ));
    }

    if booking.timeout_secs == 0 || booking.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "booking.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    match booking.effective_auth_mode() {
        BookingAuthMode::Mock => {}
        BookingAuthMode::Token => {
            if !has_secret(booking.auth_token.as_ref()) {
                return Err(ConfigError::Validation(
                    "booking.auth_token is required when booking.auth_mode is `token`. Set DISPATCH_AUTH_TOKEN or switch to `mock`".to_string(),
                ));
            }
        }
        BookingAuthMode::Idp => {
            let endpoint = booking.idp.token_endpoint.as_deref().map(str::trim).unwrap_or("");
            if !is_http_url(endpoint) {
                return Err(ConfigError::Validation(
                    "booking.idp.token_endpoint must be an http(s) URL when booking.auth_mode is `idp`"
                        .to_string(),
                ));
            }
            let missing_client =
                booking.idp.client_id.as_deref().map(|id| id.trim().is_empty()).unwrap_or(true);
            if missing_client || !has_secret(booking.idp.client_secret.as_ref()) {
                return Err(ConfigError::Validation(
                    "booking.idp.client_id and booking.idp.client_secret are required for `idp` auth"
                        .to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_tokens must be greater than zero".to_string(),
        ));
    }

    if !is_http_url(llm.base_url.trim()) {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
    if !(1..=MAX_SESSION_WINDOW_SECS).contains(&session.sweep_interval_secs) {
        return Err(ConfigError::Validation(format!(
            "session.sweep_interval_secs must be between 1 and {MAX_SESSION_WINDOW_SECS}"
        )));
    }

    if !(1..=MAX_SESSION_WINDOW_SECS).contains(&session.max_age_secs) {
        return Err(ConfigError::Validation(format!(
            "session.max_age_secs must be between 1 and {MAX_SESSION_WINDOW_SECS}"
        )));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    booking: Option<BookingPatch>,
    llm: Option<LlmPatch>,
    server: Option<ServerPatch>,
    session: Option<SessionPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct BookingPatch {
    graphql_endpoint: Option<String>,
    auth_mode: Option<BookingAuthMode>,
    auth_token: Option<String>,
    organization_id: Option<String>,
    timeout_secs: Option<u64>,
    idp: Option<IdpPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct IdpPatch {
    token_endpoint: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    scope: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    max_age_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{
        AppConfig, BookingAuthMode, ConfigError, ConfigOverrides, LoadOptions, LogFormat,
        MAX_SESSION_WINDOW_SECS,
    };

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const ALL_VARS: &[&str] = &[
        "PARCELWISE_BOOKING_AUTH_MODE",
        "PARCELWISE_BOOKING_AUTH_TOKEN",
        "PARCELWISE_LLM_API_KEY",
        "PARCELWISE_LOG_LEVEL",
        "PARCELWISE_LOG_FORMAT",
        "PARCELWISE_SERVER_PORT",
        "DISPATCH_AUTH_TOKEN",
        "DISPATCH_GRAPHQL_ENDPOINT",
        "ANTHROPIC_API_KEY",
        "USE_IDP_AUTH",
        "IDP_CLIENT_ID",
        "IDP_CLIENT_SECRET",
        "IDP_TOKEN_ENDPOINT",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        env::set_var("TEST_BOOKING_TOKEN", "tok-from-env");
        env::set_var("TEST_LLM_KEY", "sk-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("parcelwise.toml");
            fs::write(
                &path,
                r#"
[booking]
auth_token = "${TEST_BOOKING_TOKEN}"

[llm]
api_key = "${TEST_LLM_KEY}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.booking.auth_token.as_ref().map(|t| t.expose_secret().to_string())
                    == Some("tok-from-env".to_string()),
                "booking token should be loaded from environment",
            )?;
            ensure(
                config.booking.effective_auth_mode() == BookingAuthMode::Token,
                "a configured token should select token auth",
            )?;
            ensure(config.llm.is_configured(), "llm key should be loaded from environment")?;
            Ok(())
        })();

        clear_vars(&["TEST_BOOKING_TOKEN", "TEST_LLM_KEY"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("parcelwise.toml");
        fs::write(&path, "[llm]\napi_key = \"${PARCELWISE_TEST_UNSET_VAR}\"\n")
            .map_err(|err| err.to_string())?;

        match AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() }) {
            Err(ConfigError::MissingEnvInterpolation { var }) => {
                ensure(var == "PARCELWISE_TEST_UNSET_VAR", "error should name the variable")
            }
            Err(other) => Err(format!("unexpected error: {other}")),
            Ok(_) => Err("expected interpolation failure".to_string()),
        }
    }

    #[test]
    fn defaults_load_without_credentials_in_mock_mode() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(
            config.booking.effective_auth_mode() == BookingAuthMode::Mock,
            "no credentials should fall back to mock booking",
        )?;
        ensure(!config.llm.is_configured(), "no api key should leave llm unconfigured")?;
        ensure(config.server.port == 8080, "default port should be 8080")?;
        ensure(config.llm.max_tokens == 1000, "default max tokens should be 1000")
    }

    #[test]
    fn conventional_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        env::set_var("ANTHROPIC_API_KEY", "sk-alias");
        env::set_var("DISPATCH_AUTH_TOKEN", "dispatch-alias");
        env::set_var("DISPATCH_GRAPHQL_ENDPOINT", "https://example.test/graphql");
        env::set_var("PARCELWISE_LOG_LEVEL", "warn");
        env::set_var("PARCELWISE_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.llm.is_configured(), "ANTHROPIC_API_KEY should configure the llm")?;
            ensure(
                config.booking.effective_auth_mode() == BookingAuthMode::Token,
                "DISPATCH_AUTH_TOKEN should select token auth",
            )?;
            ensure(
                config.booking.graphql_endpoint == "https://example.test/graphql",
                "DISPATCH_GRAPHQL_ENDPOINT should set the endpoint",
            )?;
            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )
        })();

        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        env::set_var("PARCELWISE_SERVER_PORT", "9090");
        env::set_var("PARCELWISE_LLM_API_KEY", "sk-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("parcelwise.toml");
            fs::write(
                &path,
                r#"
[server]
port = 7070

[llm]
api_key = "sk-from-file"
model = "from-file-model"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    llm_model: Some("from-override-model".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.server.port == 9090, "env port should win over file")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.llm.model == "from-override-model", "override model should win")?;
            ensure(
                config.llm.api_key.as_ref().map(|k| k.expose_secret().to_string())
                    == Some("sk-from-env".to_string()),
                "env api key should win over file and defaults",
            )
        })();

        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        env::set_var("USE_IDP_AUTH", "true");
        env::set_var("IDP_CLIENT_ID", "client-1");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("booking.idp")
            );
            ensure(has_message, "validation failure should mention booking.idp")
        })();

        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn invalid_numeric_env_override_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        env::set_var("PARCELWISE_SERVER_PORT", "eighty");
        let result = match AppConfig::load(LoadOptions::default()) {
            Err(ConfigError::InvalidEnvOverride { key, .. }) => {
                ensure(key == "PARCELWISE_SERVER_PORT", "error should name the env key")
            }
            Err(other) => Err(format!("unexpected error: {other}")),
            Ok(_) => Err("expected invalid override failure".to_string()),
        };

        clear_vars(ALL_VARS);
        result
    }

    #[test]
    fn session_windows_are_bounded() -> Result<(), String> {
        let mut config = AppConfig::default();
        config.session.max_age_secs = 10_000_000_000_000;
        match config.validate() {
            Err(ConfigError::Validation(message)) => ensure(
                message.starts_with("session.max_age_secs must be between 1 and "),
                "oversized max age should be named in the error",
            )?,
            other => return Err(format!("expected validation failure, got {other:?}")),
        }

        config.session.max_age_secs = MAX_SESSION_WINDOW_SECS;
        config.session.sweep_interval_secs = MAX_SESSION_WINDOW_SECS + 1;
        ensure(config.validate().is_err(), "oversized sweep interval should be rejected")?;

        config.session.sweep_interval_secs = 300;
        config.validate().map_err(|error| error.to_string())
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(ALL_VARS);

        env::set_var("PARCELWISE_BOOKING_AUTH_TOKEN", "booking-secret-value");
        env::set_var("PARCELWISE_LLM_API_KEY", "llm-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("booking-secret-value"),
                "debug output should not contain booking token",
            )?;
            ensure(!debug.contains("llm-secret-value"), "debug output should not contain api key")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )
        })();

        clear_vars(ALL_VARS);
        result
    }
}
