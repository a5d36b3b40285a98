use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Falls back to `GROQ_API_KEY` when unset.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            model: default_model(),
            models: default_models(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
            system_prompt: default_system_prompt(),
            api_key: None,
        }
    }
}

fn default_api_base() -> String {
    "https://api.groq.com/openai/v1".to_string()
}
fn default_model() -> String {
    "mixtral-8x7b-32768".to_string()
}
fn default_models() -> Vec<String> {
    vec![
        "mixtral-8x7b-32768".to_string(),
        "gemma-7b-it".to_string(),
        "llama3-8b-8192".to_string(),
    ]
}
fn default_temperature() -> f32 {
    0.5
}
fn default_max_tokens() -> u32 {
    1000
}
fn default_llm_timeout_secs() -> u64 {
    60
}
fn default_system_prompt() -> String {
    "You are a helpful assistant.".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: 16,
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    16
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_context_chars")]
    pub context_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            context_chars: default_context_chars(),
        }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_context_chars() -> usize {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_fetch_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    concat!("ragchat/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Config {
    /// Defaults used when no config file is present.
    pub fn minimal() -> Self {
        Self::default()
    }
}

impl EmbeddingConfig {
    /// Name the model cache is keyed by.
    pub fn model_name(&self) -> String {
        match self.provider.as_str() {
            "hash" => format!("hash-{}", self.dims.unwrap_or(0)),
            _ => self
                .model
                .clone()
                .unwrap_or_else(|| "all-minilm-l6-v2".to_string()),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to [`Config::minimal`].
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::minimal())
    }
}

pub fn validate(config: &Config) -> Result<()> {
    // Retrieval
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.context_chars == 0 {
        anyhow::bail!("retrieval.context_chars must be >= 1");
    }

    // Embedding
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be >= 1");
    }
    match config.embedding.provider.as_str() {
        "local" => {
            if config.embedding.dims.is_some() {
                anyhow::bail!(
                    "embedding.dims is only used by the 'hash' provider; local models have a fixed dimension"
                );
            }
        }
        "hash" => {
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!("embedding.dims must be > 0 when provider is 'hash'");
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be local or hash.",
            other
        ),
    }

    // LLM
    if config.llm.models.is_empty() {
        anyhow::bail!("llm.models must list at least one model");
    }
    if !config.llm.models.contains(&config.llm.model) {
        anyhow::bail!(
            "llm.model '{}' is not one of llm.models ({})",
            config.llm.model,
            config.llm.models.join(", ")
        );
    }
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }

    Ok(())
}
