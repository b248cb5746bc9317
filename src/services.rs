//! Service container — every collaborator is built once at startup and
//! shared by the HTTP handlers.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::knowledge::KnowledgeStore;
use crate::llm::LlmProvider;
use crate::pipeline::{ChatResponder, Composer, EmailPipeline};
use crate::store::seed::{mock_inbox, seed_prompts};
use crate::store::{Database, EmailRecord, NewEmail};

pub struct Services {
    pub db: Arc<dyn Database>,
    pub llm: Arc<dyn LlmProvider>,
    pub knowledge: Arc<dyn KnowledgeStore>,
    pub pipeline: EmailPipeline,
    pub chat: ChatResponder,
    pub composer: Composer,
}

impl Services {
    pub fn new(
        db: Arc<dyn Database>,
        llm: Arc<dyn LlmProvider>,
        knowledge: Arc<dyn KnowledgeStore>,
    ) -> Self {
        Self {
            pipeline: EmailPipeline::new(Arc::clone(&db), Arc::clone(&llm)),
            chat: ChatResponder::new(Arc::clone(&llm), Arc::clone(&knowledge)),
            composer: Composer::new(Arc::clone(&db), Arc::clone(&llm), Arc::clone(&knowledge)),
            db,
            llm,
            knowledge,
        }
    }

    /// Store an email and index it for retrieval. If indexing fails the row
    /// is removed again, so every stored email is searchable.
    pub async fn ingest_email(&self, email: &NewEmail) -> Result<EmailRecord, PipelineError> {
        let record = self.db.insert_email(email).await?;
        let document = format!(
            "From: {}\nSubject: {}\n\n{}",
            record.sender, record.subject, record.body
        );
        let indexed = self
            .knowledge
            .index(
                &document,
                json!({
                    "email_id": record.id,
                    "sender": record.sender,
                    "subject": record.subject,
                }),
            )
            .await;

        if let Err(e) = indexed {
            warn!(id = record.id, error = %e, "Indexing failed, removing email");
            self.db.delete_email(record.id).await?;
            return Err(e.into());
        }
        Ok(record)
    }

    async fn ingest_all(&self, emails: &[NewEmail]) -> Result<(), PipelineError> {
        for email in emails {
            self.ingest_email(email).await?;
        }
        Ok(())
    }

    /// Startup seeding: default prompts always, demo inbox only when there
    /// are no emails yet. The demo inbox lands whole or not at all, so a
    /// failed seed is retried on the next start.
    pub async fn seed(&self) -> Result<(), PipelineError> {
        seed_prompts(self.db.as_ref()).await?;

        if self.db.count_emails().await? == 0 {
            let inbox = mock_inbox(Utc::now());
            if let Err(e) = self.ingest_all(&inbox).await {
                warn!(error = %e, "Seeding failed, rolling back demo inbox");
                self.db.delete_all_emails().await?;
                self.knowledge.reset().await?;
                return Err(e);
            }
            info!(count = inbox.len(), "Seeded demo inbox");
        }
        Ok(())
    }

    /// Replace every email with the demo inbox, rebuild the knowledge
    /// store, and process the new emails. Returns how many were processed.
    pub async fn reset_inbox(&self) -> Result<usize, PipelineError> {
        let removed = self.db.delete_all_emails().await?;
        self.knowledge.reset().await?;
        seed_prompts(self.db.as_ref()).await?;

        let inbox = mock_inbox(Utc::now());
        self.ingest_all(&inbox).await?;
        info!(removed, inserted = inbox.len(), "Inbox reset");

        self.pipeline.process_all().await
    }
}
