//! Error types for the inbox agent.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Knowledge store (embedding + similarity search) errors.
#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    #[error("Embedding generation failed: {reason}")]
    EmbeddingFailed { reason: String },

    #[error("Indexing failed: {reason}")]
    IndexFailed { reason: String },

    #[error("Search failed: {reason}")]
    SearchFailed { reason: String },
}

/// Errors surfaced by the email pipeline, chat responder, and composer.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Email {0} not found")]
    EmailNotFound(i64),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Knowledge store error: {0}")]
    Knowledge(#[from] KnowledgeError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}
