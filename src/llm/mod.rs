//! LLM integration.
//!
//! Supports:
//! - **Groq** (default, `llama-3.3-70b-versatile`)
//! - **OpenAI**
//! - **OpenRouter**
//!
//! Uses the rig-core crate for HTTP transport and the `RigAdapter` to bridge
//! rig's `CompletionModel` trait to our `LlmProvider` trait. Every provider
//! created here is wrapped in a `TrackedProvider` so each call lands in the
//! `llm_calls` table.

mod costs;
pub mod provider;
mod rig_adapter;
#[cfg(test)]
pub(crate) mod testing;
pub mod tracking;

pub use provider::*;
pub use rig_adapter::RigAdapter;
pub use tracking::TrackedProvider;

use std::sync::Arc;

use rig::client::CompletionClient;
use secrecy::ExposeSecret;

use crate::error::{ConfigError, LlmError};
use crate::store::Database;

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Groq,
    OpenAi,
    OpenRouter,
}

impl LlmBackend {
    /// Parse a backend name (case-insensitive).
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(LlmBackend::Groq),
            "openai" => Ok(LlmBackend::OpenAi),
            "openrouter" => Ok(LlmBackend::OpenRouter),
            other => Err(ConfigError::InvalidValue {
                key: "INBOX_AGENT_LLM_BACKEND".to_string(),
                message: format!("unknown backend '{other}' (expected groq, openai, openrouter)"),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LlmBackend::Groq => "groq",
            LlmBackend::OpenAi => "openai",
            LlmBackend::OpenRouter => "openrouter",
        }
    }

    /// Environment variable holding this backend's API key.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            LlmBackend::Groq => "GROQ_API_KEY",
            LlmBackend::OpenAi => "OPENAI_API_KEY",
            LlmBackend::OpenRouter => "OPENROUTER_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmBackend::Groq => "llama-3.3-70b-versatile",
            LlmBackend::OpenAi => "gpt-4o-mini",
            LlmBackend::OpenRouter => "meta-llama/llama-3.3-70b-instruct",
        }
    }
}

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: secrecy::SecretString,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Create a usage-tracked LLM provider from configuration.
pub fn create_provider(
    config: &LlmConfig,
    db: Arc<dyn Database>,
) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let provider = match config.backend {
        LlmBackend::Groq => create_groq_provider(config)?,
        LlmBackend::OpenAi => create_openai_provider(config)?,
        LlmBackend::OpenRouter => create_openrouter_provider(config)?,
    };
    Ok(Arc::new(TrackedProvider::new(provider, db)))
}

fn client_error(provider: &str, e: impl std::fmt::Display) -> LlmError {
    LlmError::RequestFailed {
        provider: provider.to_string(),
        reason: format!("Failed to create client: {e}"),
    }
}

fn adapt<M>(model: M, config: &LlmConfig) -> Arc<dyn LlmProvider>
where
    M: rig::completion::CompletionModel + 'static,
{
    Arc::new(
        RigAdapter::new(model, config.backend.name(), &config.model)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens),
    )
}

fn create_groq_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    use rig::providers::groq;

    let client: groq::Client = groq::Client::new(config.api_key.expose_secret())
        .map_err(|e| client_error("groq", e))?;

    let model = client.completion_model(&config.model);
    tracing::info!("Using Groq (model: {})", config.model);
    Ok(adapt(model, config))
}

fn create_openai_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    use rig::providers::openai;

    let client: openai::Client = openai::Client::new(config.api_key.expose_secret())
        .map_err(|e| client_error("openai", e))?;

    let model = client.completion_model(&config.model);
    tracing::info!("Using OpenAI (model: {})", config.model);
    Ok(adapt(model, config))
}

fn create_openrouter_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    use rig::providers::openrouter;

    let client: openrouter::Client = openrouter::Client::new(config.api_key.expose_secret())
        .map_err(|e| client_error("openrouter", e))?;

    let model = client.completion_model(&config.model);
    tracing::info!("Using OpenRouter (model: {})", config.model);
    Ok(adapt(model, config))
}
