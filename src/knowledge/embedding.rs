//! Text embedders.
//!
//! `LocalEmbedder` (fastembed, AllMiniLML6V2) is the default. `HttpEmbedder`
//! calls an OpenAI-compatible `/embeddings` endpoint. `HashingEmbedder` is a
//! deterministic offline stub for tests and `INBOX_AGENT_EMBEDDING_STUB=1`.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use reqwest::Client;
use rig::embeddings::Embedding;
use rig::embeddings::distance::VectorDistance;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::KnowledgeError;

/// Turns text into a fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier stored next to each vector. Vectors from different
    /// embedders are never compared.
    fn name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, KnowledgeError>;
}

/// Name recorded for vectors produced by `LocalEmbedder`.
pub const LOCAL_MODEL_NAME: &str = "fastembed-all-minilm-l6-v2";

/// Sentence embeddings computed in-process with fastembed.
///
/// The model is downloaded into the fastembed cache on first use.
/// `TextEmbedding::embed` needs `&mut self`, so the model sits behind a
/// mutex and runs on the blocking pool.
pub struct LocalEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
}

impl LocalEmbedder {
    /// Load the model. Blocking; may hit the network on first run.
    pub fn try_new() -> Result<Self, KnowledgeError> {
        let model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false),
        )
        .map_err(|e| KnowledgeError::EmbeddingFailed {
            reason: format!("failed to load {LOCAL_MODEL_NAME}: {e}"),
        })?;
        Ok(Self {
            model: Arc::new(Mutex::new(model)),
        })
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    fn name(&self) -> &str {
        LOCAL_MODEL_NAME
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, KnowledgeError> {
        let model = Arc::clone(&self.model);
        let text = text.to_string();

        tokio::task::spawn_blocking(move || {
            let mut model = model.lock().map_err(|_| KnowledgeError::EmbeddingFailed {
                reason: "embedding model lock poisoned".to_string(),
            })?;
            let mut vectors =
                model
                    .embed(vec![text], None)
                    .map_err(|e| KnowledgeError::EmbeddingFailed {
                        reason: e.to_string(),
                    })?;
            vectors.pop().ok_or_else(|| KnowledgeError::EmbeddingFailed {
                reason: "model returned no embedding".to_string(),
            })
        })
        .await
        .map_err(|e| KnowledgeError::EmbeddingFailed {
            reason: format!("embedding task failed: {e}"),
        })?
    }
}

/// Offline stub: lowercase alphanumeric tokens are hashed (FNV-1a) into
/// `dimensions` buckets and the vector is L2-normalized. Only shared words
/// score, and bucket collisions add noise.
pub struct HashingEmbedder {
    dimensions: usize,
    name: String,
}

impl HashingEmbedder {
    pub const DEFAULT_DIMENSIONS: usize = 256;

    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self {
            dimensions,
            name: format!("hashing-{dimensions}"),
        }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSIONS)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, KnowledgeError> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokens(text) {
            let bucket = (fnv1a(token.as_bytes()) % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }
        normalize(&mut vector);
        Ok(vector)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Embeddings from an OpenAI-compatible `/embeddings` endpoint.
pub struct HttpEmbedder {
    client: Client,
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl HttpEmbedder {
    pub fn new(base_url: impl Into<String>, api_key: SecretString, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, KnowledgeError> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: text,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| KnowledgeError::EmbeddingFailed {
                reason: format!("request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(KnowledgeError::EmbeddingFailed {
                reason: format!("HTTP {status}: {text}"),
            });
        }

        let parsed: EmbeddingResponse =
            response
                .json()
                .await
                .map_err(|e| KnowledgeError::EmbeddingFailed {
                    reason: format!("invalid response: {e}"),
                })?;

        let mut vector = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| KnowledgeError::EmbeddingFailed {
                reason: "response contained no embeddings".to_string(),
            })?;

        debug!(model = %self.model, dims = vector.len(), "Embedding received");
        normalize(&mut vector);
        Ok(vector)
    }
}

/// Scale a vector to unit length. Zero vectors are left as is.
fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Cosine similarity via rig's `VectorDistance`. Mismatched lengths, empty
/// vectors, and zero vectors score 0.
pub fn similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let to_embedding = |v: &[f32]| Embedding {
        document: String::new(),
        vec: v.iter().map(|x| f64::from(*x)).collect(),
    };
    let score = to_embedding(a).cosine_similarity(&to_embedding(b), false);
    if score.is_finite() { score as f32 } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashing_embedder_is_deterministic_and_normalized() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("Q3 report deadline Friday").await.unwrap();
        let b = embedder.embed("Q3 report deadline Friday").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), HashingEmbedder::DEFAULT_DIMENSIONS);

        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn hashing_embedder_ignores_case_and_punctuation() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("Contract, REVISION!").await.unwrap();
        let b = embedder.embed("contract revision").await.unwrap();
        assert!((similarity(&a, &b) - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn related_text_scores_higher_than_unrelated() {
        let embedder = HashingEmbedder::default();
        let query = embedder.embed("when is the report deadline").await.unwrap();
        let related = embedder
            .embed("we need to finish the Q3 report by Friday deadline")
            .await
            .unwrap();
        let unrelated = embedder.embed("claim your lottery prize now").await.unwrap();

        assert!(similarity(&query, &related) > similarity(&query, &unrelated));
    }

    #[tokio::test]
    async fn empty_text_embeds_to_zero_vector() {
        let embedder = HashingEmbedder::new(8);
        let v = embedder.embed("  ...  ").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
        assert_eq!(similarity(&v, &v), 0.0);
    }

    #[test]
    fn similarity_handles_mismatched_lengths() {
        assert_eq!(similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(similarity(&[], &[]), 0.0);
        assert!((similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn embedder_names() {
        assert_eq!(HashingEmbedder::new(64).name(), "hashing-64");
        let http = HttpEmbedder::new(
            "https://api.openai.com/v1/",
            SecretString::from("sk-test"),
            "text-embedding-3-small",
        );
        assert_eq!(http.name(), "text-embedding-3-small");
        assert_eq!(http.endpoint(), "https://api.openai.com/v1/embeddings");
    }

    /// Needs the AllMiniLML6V2 download; skipped when the model can't load.
    #[tokio::test]
    async fn local_embedder_matches_meaning_not_words() {
        let embedder = match tokio::task::spawn_blocking(LocalEmbedder::try_new).await.unwrap() {
            Ok(e) => e,
            Err(e) => {
                eprintln!("skipping: {e}");
                return;
            }
        };
        assert_eq!(embedder.name(), LOCAL_MODEL_NAME);

        let query = embedder.embed("Any appraisal scheduled?").await.unwrap();
        let review = embedder
            .embed("Please schedule your annual performance review with your manager.")
            .await
            .unwrap();
        let report = embedder
            .embed("We need to finish the Q3 report by Friday.")
            .await
            .unwrap();

        assert!(similarity(&query, &review) > 0.0);
        assert!(similarity(&query, &review) > similarity(&query, &report));
    }
}
