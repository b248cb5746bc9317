//! Knowledge store — similarity search over past emails.
//!
//! The pipeline only sees the `KnowledgeStore` trait. The shipped
//! implementation keeps documents in libSQL and ranks them by cosine
//! similarity of their embeddings.

pub mod embedding;
pub mod libsql_store;

pub use embedding::{Embedder, HashingEmbedder, HttpEmbedder, LOCAL_MODEL_NAME, LocalEmbedder};
pub use libsql_store::LibSqlKnowledgeStore;

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::KnowledgeError;

/// Where embeddings come from.
#[derive(Debug, Clone)]
pub enum EmbeddingBackend {
    /// fastembed model run in process.
    Local,
    /// OpenAI-compatible `/embeddings` endpoint.
    Remote {
        base_url: String,
        api_key: SecretString,
        model: String,
    },
    /// Hashing stub; no model, no network.
    Stub,
}

/// Build the embedder for `backend`.
///
/// Blocking: `Local` loads (and on first run downloads) the model. If that
/// fails the hashing stub is used instead.
pub fn create_embedder(backend: &EmbeddingBackend) -> Arc<dyn Embedder> {
    match backend {
        EmbeddingBackend::Stub => {
            info!("Using hashing stub embedder");
            Arc::new(HashingEmbedder::default())
        }
        EmbeddingBackend::Remote {
            base_url,
            api_key,
            model,
        } => {
            info!("Using remote embeddings (model: {model}, base url: {base_url})");
            Arc::new(HttpEmbedder::new(base_url.clone(), api_key.clone(), model.clone()))
        }
        EmbeddingBackend::Local => match LocalEmbedder::try_new() {
            Ok(embedder) => {
                info!("Loaded {LOCAL_MODEL_NAME}");
                Arc::new(embedder)
            }
            Err(e) => {
                warn!("Local embedding model unavailable ({e}), falling back to hashing stub");
                Arc::new(HashingEmbedder::default())
            }
        },
    }
}

/// A ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeDocument {
    pub content: String,
    pub metadata: serde_json::Value,
    pub score: f32,
}

#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Add a document.
    async fn index(&self, content: &str, metadata: serde_json::Value) -> Result<(), KnowledgeError>;

    /// Up to `k` documents, best match first. Empty when nothing relates.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<KnowledgeDocument>, KnowledgeError>;

    /// Remove every document.
    async fn reset(&self) -> Result<(), KnowledgeError>;
}

/// Render hits as plain text blocks, one per document.
pub fn render_documents(docs: &[KnowledgeDocument]) -> String {
    docs.iter()
        .map(|d| d.content.trim())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn render_joins_trimmed_contents() {
        let docs = vec![
            KnowledgeDocument {
                content: "  first  ".into(),
                metadata: json!({}),
                score: 0.9,
            },
            KnowledgeDocument {
                content: "second\n".into(),
                metadata: json!({}),
                score: 0.5,
            },
        ];
        assert_eq!(render_documents(&docs), "first\n\nsecond");
        assert_eq!(render_documents(&[]), "");
    }

    #[test]
    fn stub_and_remote_embedders_skip_model_loading() {
        let stub = create_embedder(&EmbeddingBackend::Stub);
        assert_eq!(stub.name(), HashingEmbedder::default().name());

        let remote = create_embedder(&EmbeddingBackend::Remote {
            base_url: "http://localhost:11434/v1".into(),
            api_key: SecretString::from("local"),
            model: "nomic-embed-text".into(),
        });
        assert_eq!(remote.name(), "nomic-embed-text");
    }
}
