//! Configuration types, loaded from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::knowledge::EmbeddingBackend;
use crate::llm::{LlmBackend, LlmConfig};

/// Temperature used for every pipeline, chat, and compose call.
const DEFAULT_TEMPERATURE: f32 = 0.6;

const DEFAULT_MAX_TOKENS: u32 = 1024;

const DEFAULT_DB_PATH: &str = "./data/inbox-agent.db";

const DEFAULT_HOST: &str = "127.0.0.1";

const DEFAULT_PORT: u16 = 8000;

const DEFAULT_EMBEDDING_BASE_URL: &str = "https://api.openai.com/v1";

/// Process-wide configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub embedding: EmbeddingBackend,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    /// Seed default prompts and the demo inbox at startup.
    pub seed: bool,
    /// Directory for daily-rolling log files, in addition to stderr.
    pub log_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let backend = match var("INBOX_AGENT_LLM_BACKEND") {
            Some(name) => LlmBackend::parse(&name)?,
            None => LlmBackend::Groq,
        };

        let api_key = var(backend.api_key_var())
            .ok_or_else(|| ConfigError::MissingEnvVar(backend.api_key_var().to_string()))?;

        let model = var("INBOX_AGENT_MODEL").unwrap_or_else(|| backend.default_model().to_string());

        let temperature = parse_or("INBOX_AGENT_TEMPERATURE", var("INBOX_AGENT_TEMPERATURE"), DEFAULT_TEMPERATURE)?;
        let max_tokens = parse_or("INBOX_AGENT_MAX_TOKENS", var("INBOX_AGENT_MAX_TOKENS"), DEFAULT_MAX_TOKENS)?;
        let port = parse_or("INBOX_AGENT_PORT", var("INBOX_AGENT_PORT"), DEFAULT_PORT)?;

        let seed = match var("INBOX_AGENT_SEED") {
            Some(v) => parse_bool("INBOX_AGENT_SEED", &v)?,
            None => true,
        };

        let stub = match var("INBOX_AGENT_EMBEDDING_STUB") {
            Some(v) => parse_bool("INBOX_AGENT_EMBEDDING_STUB", &v)?,
            None => false,
        };
        let embedding = if stub {
            EmbeddingBackend::Stub
        } else if let Some(model) = var("INBOX_AGENT_EMBEDDING_MODEL") {
            let api_key = var("INBOX_AGENT_EMBEDDING_API_KEY")
                .or_else(|| var("OPENAI_API_KEY"))
                .ok_or_else(|| ConfigError::MissingEnvVar("INBOX_AGENT_EMBEDDING_API_KEY".to_string()))?;
            EmbeddingBackend::Remote {
                base_url: var("INBOX_AGENT_EMBEDDING_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_EMBEDDING_BASE_URL.to_string()),
                api_key: SecretString::from(api_key),
                model,
            }
        } else {
            EmbeddingBackend::Local
        };

        Ok(Self {
            llm: LlmConfig {
                backend,
                api_key: SecretString::from(api_key),
                model,
                temperature,
                max_tokens,
            },
            embedding,
            db_path: var("INBOX_AGENT_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            host: var("INBOX_AGENT_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            seed,
            log_dir: var("INBOX_AGENT_LOG_DIR").map(PathBuf::from),
        })
    }

    /// Address the HTTP server binds to.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::InvalidValue {
                key: "INBOX_AGENT_HOST".to_string(),
                message: format!("{e}"),
            })
    }
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(v) => v.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{v}': {e}"),
        }),
        None => Ok(default),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}
