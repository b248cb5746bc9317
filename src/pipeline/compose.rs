//! Compose flow — writes a new email body from short instructions.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::PipelineError;
use crate::knowledge::{KnowledgeStore, render_documents};
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::types::PromptRole;
use crate::store::Database;

/// Style used when no `auto_reply` prompt is stored.
pub const DEFAULT_STYLE: &str = "Write in a professional, polite, and concise tone.";

const RELATED_DOCUMENTS: usize = 2;

pub struct Composer {
    db: Arc<dyn Database>,
    llm: Arc<dyn LlmProvider>,
    knowledge: Arc<dyn KnowledgeStore>,
}

impl Composer {
    pub fn new(
        db: Arc<dyn Database>,
        llm: Arc<dyn LlmProvider>,
        knowledge: Arc<dyn KnowledgeStore>,
    ) -> Self {
        Self { db, llm, knowledge }
    }

    /// Generate an email body. The model output is returned trimmed, as is.
    pub async fn generate(
        &self,
        recipient: &str,
        subject: &str,
        instructions: &str,
    ) -> Result<String, PipelineError> {
        let style = match self.db.get_prompt(PromptRole::AutoReply).await? {
            Some(prompt) => prompt.content,
            None => DEFAULT_STYLE.to_string(),
        };

        let query = format!("{recipient} {subject} {instructions}");
        let related = self.knowledge.search(&query, RELATED_DOCUMENTS).await?;
        debug!(related = related.len(), "Compose context retrieved");

        let system = build_compose_prompt(&style, &render_documents(&related));
        let user = format!("Recipient: {recipient}\nSubject: {subject}\nInstructions: {instructions}");

        info!(recipient, subject, "Generating email body");
        let request = CompletionRequest::new(vec![ChatMessage::system(system), ChatMessage::user(user)])
            .with_purpose("compose");
        let response = self.llm.complete(request).await?;
        Ok(response.content.trim().to_string())
    }
}

fn build_compose_prompt(style: &str, related: &str) -> String {
    let mut prompt = format!(
        "You write outgoing emails.\nStyle guide: {style}\n\
         Output ONLY the email body. Do not include a subject line, greeting, or signature \
         unless the style guide calls for them."
    );
    if !related.trim().is_empty() {
        prompt.push_str("\n\nRelated past emails, for context:\n");
        prompt.push_str(related.trim());
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{HashingEmbedder, LibSqlKnowledgeStore};
    use crate::llm::testing::ScriptedLlm;
    use crate::store::LibSqlBackend;
    use serde_json::json;

    async fn setup(llm: Arc<ScriptedLlm>) -> (Arc<LibSqlBackend>, Arc<LibSqlKnowledgeStore>, Composer) {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let store = Arc::new(LibSqlKnowledgeStore::new(
            db.connection(),
            Arc::new(HashingEmbedder::default()),
        ));
        let composer = Composer::new(db.clone(), llm, store.clone());
        (db, store, composer)
    }

    #[tokio::test]
    async fn falls_back_to_default_style() {
        let llm = Arc::new(ScriptedLlm::new(["  The revised contract looks good.  \n"]));
        let (_db, _store, composer) = setup(llm.clone()).await;

        let body = composer
            .generate("client@bigcorp.com", "Contract Revision", "accept the changes")
            .await
            .unwrap();
        assert_eq!(body, "The revised contract looks good.");

        let request = &llm.requests()[0];
        assert!(request.messages[0].content.contains(DEFAULT_STYLE));
        assert!(!request.messages[0].content.contains("Related past emails"));
        assert_eq!(request.purpose.as_deref(), Some("compose"));
    }

    #[tokio::test]
    async fn uses_stored_reply_style_and_related_emails() {
        let llm = Arc::new(ScriptedLlm::new(["Body"]));
        let (db, store, composer) = setup(llm.clone()).await;
        db.insert_prompt_if_missing("auto_reply", "Be cheerful and brief.")
            .await
            .unwrap();
        store
            .index(
                "Please review the attached contract changes.",
                json!({"email_id": 5}),
            )
            .await
            .unwrap();

        composer
            .generate("client@bigcorp.com", "Contract", "confirm review")
            .await
            .unwrap();

        let system = &llm.requests()[0].messages[0].content;
        assert!(system.contains("Be cheerful and brief."));
        assert!(!system.contains(DEFAULT_STYLE));
        assert!(system.contains("Please review the attached contract changes."));
    }

    #[tokio::test]
    async fn llm_failure_propagates() {
        let (_db, _store, composer) = setup(Arc::new(ScriptedLlm::failing())).await;
        let err = composer.generate("a@x.com", "s", "i").await.unwrap_err();
        assert!(matches!(err, PipelineError::Llm(_)));
    }
}
