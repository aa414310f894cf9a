//! Text completion against a hosted or local language model.
//!
//! OpenAI and Ollama share the chat-completions wire format; Anthropic uses its messages API.
//! Request and response shapes are plain functions so they can be checked without a network.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};
use tripdesk_core::config::{LlmConfig, LlmProvider, RetryBackoff};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 512;
const ERROR_BODY_LIMIT: usize = 512;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("provider `{0}` does not call a language model")]
    Unsupported(&'static str),
    #[error("llm.api_key is required for provider `{0}`")]
    MissingApiKey(&'static str),
    #[error("language model request timed out")]
    Timeout,
    #[error("network error talking to language model: {0}")]
    Network(String),
    #[error("language model returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("could not read language model response: {0}")]
    Decode(String),
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::Unsupported(_) | Self::MissingApiKey(_) | Self::Decode(_) => false,
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError>;
}

pub struct HttpLlmClient {
    client: Client,
    provider: LlmProvider,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
    max_retries: u32,
    backoff: RetryBackoff,
}

impl HttpLlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let provider = config.provider;
        let default_base = match provider {
            LlmProvider::Heuristic => return Err(LlmError::Unsupported(provider.as_str())),
            LlmProvider::OpenAi => OPENAI_BASE_URL,
            LlmProvider::Ollama => OLLAMA_BASE_URL,
            LlmProvider::Anthropic => ANTHROPIC_BASE_URL,
        };
        let api_key =
            config.api_key.clone().filter(|key| !key.expose_secret().trim().is_empty());
        if api_key.is_none() && provider != LlmProvider::Ollama {
            return Err(LlmError::MissingApiKey(provider.as_str()));
        }

        let base_url = config
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(default_base);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| LlmError::Network(error.to_string()))?;

        Ok(Self {
            client,
            provider,
            endpoint: endpoint(provider, base_url),
            api_key,
            model: config.model.clone(),
            max_retries: config.max_retries,
            backoff: config.backoff,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request(&self, system: &str, prompt: &str) -> RequestBuilder {
        let builder = self.client.post(&self.endpoint);
        match self.provider {
            LlmProvider::Anthropic => {
                let builder = builder
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .json(&anthropic_body(&self.model, system, prompt));
                match &self.api_key {
                    Some(key) => builder.header("x-api-key", key.expose_secret()),
                    None => builder,
                }
            }
            _ => {
                let builder = builder.json(&chat_completion_body(&self.model, system, prompt));
                match &self.api_key {
                    Some(key) => builder.bearer_auth(key.expose_secret()),
                    None => builder,
                }
            }
        }
    }

    async fn send_once(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let response = self.request(system, prompt).send().await.map_err(|error| {
            if error.is_timeout() {
                LlmError::Timeout
            } else {
                LlmError::Network(error.to_string())
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| LlmError::Network(error.to_string()))?;
        if !status.is_success() {
            return Err(LlmError::Http {
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        let value: Value =
            serde_json::from_str(&body).map_err(|error| LlmError::Decode(error.to_string()))?;
        match self.provider {
            LlmProvider::Anthropic => anthropic_text(&value),
            _ => chat_completion_text(&value),
        }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let mut attempt = 0;
        loop {
            match self.send_once(system, prompt).await {
                Err(error) if error.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.backoff.delay_for(attempt);
                    warn!(
                        event_name = "agent.llm.retry",
                        provider = self.provider.as_str(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying language model call"
                    );
                    sleep(delay).await;
                }
                Ok(text) => {
                    debug!(
                        event_name = "agent.llm.completed",
                        provider = self.provider.as_str(),
                        model = %self.model,
                        chars = text.len()
                    );
                    return Ok(text);
                }
                Err(error) => return Err(error),
            }
        }
    }
}

fn endpoint(provider: LlmProvider, base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    match provider {
        LlmProvider::Anthropic => format!("{base}/messages"),
        _ => format!("{base}/chat/completions"),
    }
}

pub fn chat_completion_body(model: &str, system: &str, prompt: &str) -> Value {
    json!({
        "model": model,
        "temperature": 0,
        "max_tokens": MAX_TOKENS,
        "messages": [
            { "role": "system", "content": system },
            { "role": "user", "content": prompt },
        ],
    })
}

pub fn anthropic_body(model: &str, system: &str, prompt: &str) -> Value {
    json!({
        "model": model,
        "max_tokens": MAX_TOKENS,
        "system": system,
        "messages": [{ "role": "user", "content": prompt }],
    })
}

pub fn chat_completion_text(response: &Value) -> Result<String, LlmError> {
    response
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| LlmError::Decode("missing choices[0].message.content".to_string()))
}

pub fn anthropic_text(response: &Value) -> Result<String, LlmError> {
    let blocks = response
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| LlmError::Decode("missing content blocks".to_string()))?;

    let text = blocks
        .iter()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("");

    if text.is_empty() {
        return Err(LlmError::Decode("response had no text blocks".to_string()));
    }
    Ok(text)
}
