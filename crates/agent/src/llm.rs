use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use parcelwise_core::config::{LlmConfig, LlmProvider};
use parcelwise_core::context::ConversationMessage;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// One text-generation call: a system prompt, prior turns, and the new
/// user message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system: String,
    pub history: Vec<ConversationMessage>,
    pub user_message: String,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    fn model(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ConversationMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Messages API client. `Gateway` providers authenticate with a bearer token
/// instead of `x-api-key` and skip the version header.
pub struct AnthropicClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn new(config: &LlmConfig, api_key: &SecretString) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        match config.provider {
            LlmProvider::Anthropic => {
                headers.insert(
                    "x-api-key",
                    HeaderValue::from_str(api_key.expose_secret())
                        .context("llm api key contains invalid header characters")?,
                );
                headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
            }
            LlmProvider::Gateway => {
                let mut bearer =
                    HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret()))
                        .context("llm api key contains invalid header characters")?;
                bearer.set_sensitive(true);
                headers.insert(AUTHORIZATION, bearer);
            }
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build llm http client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/messages", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let mut messages = request.history.clone();
        messages.push(ConversationMessage::user(request.user_message.clone()));

        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages,
            system: Some(request.system.as_str()).filter(|system| !system.is_empty()),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .context("llm request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("llm request failed with status {status}: {detail}"));
        }

        let parsed: MessagesResponse =
            response.json().await.context("failed to decode llm response")?;
        first_text(&parsed).ok_or_else(|| anyhow!("llm response contained no text content"))
    }
}

fn first_text(response: &MessagesResponse) -> Option<String> {
    response
        .content
        .iter()
        .find(|block| block.kind == "text" && !block.text.trim().is_empty())
        .map(|block| block.text.clone())
}

/// `None` when no key is configured; the conversation engine then stays on
/// its local templates.
pub fn llm_client_from_config(config: &LlmConfig) -> Option<Box<dyn LlmClient>> {
    if !config.is_configured() {
        return None;
    }
    let api_key = config.api_key.as_ref()?;

    match AnthropicClient::new(config, api_key) {
        Ok(client) => Some(Box::new(client)),
        Err(error) => {
            tracing::warn!(
                event_name = "llm.client_unavailable",
                correlation_id = "bootstrap",
                error = %error,
                "llm client could not be built; using local replies"
            );
            None
        }
    }
}
