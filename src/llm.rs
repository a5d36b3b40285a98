//! Client for OpenAI-compatible chat-completion APIs (Groq by default).
//!
//! [`LlmClient::complete`] returns a typed [`LlmError`] on failure. The chat
//! edge calls [`LlmClient::complete_or_advisory`] instead, which turns every
//! failure into user-visible text so a conversation is never interrupted.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::models::Role;

/// Shown when a completion is requested before a key is configured.
pub const MISSING_KEY_ADVISORY: &str = "Please enter a valid API key first.";

/// Environment variable consulted for the API key.
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

/// API credential. Held in memory only; redacted from `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Returns `None` for blank input.
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Read the key from [`API_KEY_ENV`].
    pub fn from_env() -> Option<Self> {
        std::env::var(API_KEY_ENV).ok().and_then(Self::new)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Session-owned LLM client.
pub struct LlmClient {
    http: reqwest::Client,
    config: LlmConfig,
    api_key: Option<ApiKey>,
}

impl LlmClient {
    pub fn new(config: &LlmConfig, api_key: Option<ApiKey>) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::transport(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            http,
            config: config.clone(),
            api_key,
        })
    }

    pub fn set_api_key(&mut self, api_key: Option<ApiKey>) {
        self.api_key = api_key;
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Models the operator may choose from.
    pub fn available_models(&self) -> &[String] {
        &self.config.models
    }

    /// Send `prompt` as the user message of a fresh chat and return the reply.
    pub async fn complete(&self, prompt: &str, model: &str) -> Result<String, LlmError> {
        let api_key = self.api_key.as_ref().ok_or(LlmError::MissingCredential)?;

        let body = ChatCompletionRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.config.system_prompt,
                },
                ChatMessage {
                    role: Role::User.as_str(),
                    content: prompt,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let url = format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        );
        debug!(model, prompt_chars = prompt.chars().count(), "sending completion");

        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(LlmError::transport)?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(LlmError::transport(format!(
                "API error {}: {}",
                status, body_text
            )));
        }

        let payload: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::transport(format!("invalid response: {}", e)))?;

        payload
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::transport("response contained no choices"))
    }

    /// Like [`complete`](Self::complete), but failures come back as text.
    pub async fn complete_or_advisory(&self, prompt: &str, model: &str) -> String {
        match self.complete(prompt, model).await {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "completion failed");
                render_failure(&err)
            }
        }
    }
}

/// In-band rendering of an LLM failure.
pub fn render_failure(err: &LlmError) -> String {
    match err {
        LlmError::MissingCredential => MISSING_KEY_ADVISORY.to_string(),
        LlmError::Transport { message } => {
            format!("An error occurred while querying the LLM: {}", message)
        }
    }
}
