//! libSQL-backed knowledge store. Vectors are stored as JSON and ranked with
//! rig's cosine distance.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, params};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::embedding::{Embedder, similarity};
use super::{KnowledgeDocument, KnowledgeStore};
use crate::error::KnowledgeError;

/// Documents live in the `knowledge_documents` table alongside their vector
/// (JSON array) and the name of the embedder that produced it.
pub struct LibSqlKnowledgeStore {
    conn: Connection,
    embedder: Arc<dyn Embedder>,
}

impl LibSqlKnowledgeStore {
    /// Expects a connection on which migrations have already run.
    pub fn new(conn: Connection, embedder: Arc<dyn Embedder>) -> Self {
        Self { conn, embedder }
    }
}

#[async_trait]
impl KnowledgeStore for LibSqlKnowledgeStore {
    async fn index(&self, content: &str, metadata: serde_json::Value) -> Result<(), KnowledgeError> {
        let vector = self.embedder.embed(content).await?;
        let embedding = serde_json::to_string(&vector).map_err(|e| KnowledgeError::IndexFailed {
            reason: format!("serialize embedding: {e}"),
        })?;
        let id = Uuid::new_v4().to_string();

        self.conn
            .execute(
                "INSERT INTO knowledge_documents (id, content, metadata, embedder, embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id.as_str(),
                    content,
                    metadata.to_string(),
                    self.embedder.name(),
                    embedding,
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| KnowledgeError::IndexFailed {
                reason: format!("index: {e}"),
            })?;

        debug!(%id, embedder = self.embedder.name(), "Document indexed");
        Ok(())
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<KnowledgeDocument>, KnowledgeError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_vector = self.embedder.embed(query).await?;

        let mut rows = self
            .conn
            .query(
                "SELECT content, json(metadata), embedding FROM knowledge_documents WHERE embedder = ?1",
                params![self.embedder.name()],
            )
            .await
            .map_err(|e| KnowledgeError::SearchFailed {
                reason: format!("search: {e}"),
            })?;

        let mut results = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| KnowledgeError::SearchFailed {
                reason: format!("read row: {e}"),
            })?
        {
            let content: String = match row.get(0) {
                Ok(c) => c,
                Err(e) => {
                    warn!("Skipping knowledge row: {e}");
                    continue;
                }
            };
            let metadata: String = row.get(1).unwrap_or_else(|_| "{}".to_string());
            let embedding: String = row.get(2).unwrap_or_default();

            let vector: Vec<f32> = match serde_json::from_str(&embedding) {
                Ok(v) => v,
                Err(e) => {
                    warn!("Skipping knowledge row with bad embedding: {e}");
                    continue;
                }
            };

            let score = similarity(&query_vector, &vector);
            if score <= 0.0 {
                continue;
            }
            results.push(KnowledgeDocument {
                content,
                metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
                score,
            });
        }

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);
        Ok(results)
    }

    async fn reset(&self) -> Result<(), KnowledgeError> {
        let removed = self
            .conn
            .execute("DELETE FROM knowledge_documents", ())
            .await
            .map_err(|e| KnowledgeError::IndexFailed {
                reason: format!("reset: {e}"),
            })?;
        info!(removed, "Knowledge store cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::HashingEmbedder;
    use crate::store::LibSqlBackend;
    use serde_json::json;

    async fn test_store() -> (LibSqlBackend, LibSqlKnowledgeStore) {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let store = LibSqlKnowledgeStore::new(db.connection(), Arc::new(HashingEmbedder::default()));
        (db, store)
    }

    #[tokio::test]
    async fn search_ranks_by_similarity() {
        let (_db, store) = test_store().await;
        store
            .index(
                "We need to finish the Q3 report by Friday.",
                json!({"email_id": 1}),
            )
            .await
            .unwrap();
        store
            .index("Click here to claim your prize now!", json!({"email_id": 4}))
            .await
            .unwrap();
        store
            .index("The Q3 report template is attached.", json!({"email_id": 7}))
            .await
            .unwrap();

        let hits = store.search("Q3 report", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score >= hits[1].score);
        for hit in &hits {
            assert!(hit.content.contains("Q3 report"));
        }
    }

    #[tokio::test]
    async fn search_empty_store_returns_nothing() {
        let (_db, store) = test_store().await;
        assert!(store.search("anything", 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_skips_unrelated_documents() {
        let (_db, store) = test_store().await;
        store.index("lottery prize", json!({})).await.unwrap();
        assert!(store.search("quarterly budget", 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn metadata_round_trips() {
        let (_db, store) = test_store().await;
        store
            .index("contract changes", json!({"email_id": 5, "sender": "client@bigcorp.com"}))
            .await
            .unwrap();

        let hits = store.search("contract", 1).await.unwrap();
        assert_eq!(hits[0].metadata["sender"], "client@bigcorp.com");
        assert_eq!(hits[0].metadata["email_id"], 5);
    }

    #[tokio::test]
    async fn reset_clears_documents() {
        let (_db, store) = test_store().await;
        store.index("contract changes", json!({})).await.unwrap();
        store.reset().await.unwrap();
        assert!(store.search("contract", 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn other_embedder_vectors_are_ignored() {
        let (db, store) = test_store().await;
        store.index("contract changes", json!({})).await.unwrap();

        let other = LibSqlKnowledgeStore::new(db.connection(), Arc::new(HashingEmbedder::new(32)));
        assert!(other.search("contract", 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreadable_row_fails_the_search() {
        let (db, store) = test_store().await;
        store.index("contract changes", json!({})).await.unwrap();
        db.connection()
            .execute(
                "INSERT INTO knowledge_documents (id, content, metadata, embedder, embedding, created_at)
                 VALUES ('broken', 'contract', 'not json', 'hashing-256', '[]', '2024-01-01T00:00:00Z')",
                (),
            )
            .await
            .unwrap();

        let err = store.search("contract", 2).await.unwrap_err();
        assert!(matches!(err, KnowledgeError::SearchFailed { .. }));
    }
}
