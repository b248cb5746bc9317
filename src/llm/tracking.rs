//! Usage-tracking decorator — records every successful call in `llm_calls`.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::costs;
use super::provider::{CompletionRequest, CompletionResponse, LlmProvider};
use crate::error::LlmError;
use crate::store::Database;
use crate::store::traits::LlmCallRecord;

/// Wraps a provider and writes one `llm_calls` row per completed call.
///
/// A failed write is logged and otherwise ignored; the completion result is
/// returned unchanged.
pub struct TrackedProvider {
    inner: Arc<dyn LlmProvider>,
    db: Arc<dyn Database>,
}

impl TrackedProvider {
    pub fn new(inner: Arc<dyn LlmProvider>, db: Arc<dyn Database>) -> Self {
        Self { inner, db }
    }
}

#[async_trait]
impl LlmProvider for TrackedProvider {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn cost_per_token(&self) -> (Decimal, Decimal) {
        self.inner.cost_per_token()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let purpose = request.purpose.clone();
        let response = self.inner.complete(request).await?;

        let cost = costs::call_cost(
            self.inner.cost_per_token(),
            response.input_tokens,
            response.output_tokens,
        );
        let record = LlmCallRecord {
            provider: self.inner.provider_name(),
            model: self.inner.model_name(),
            input_tokens: response.input_tokens,
            output_tokens: response.output_tokens,
            cost,
            purpose: purpose.as_deref(),
        };

        match self.db.record_llm_call(&record).await {
            Ok(id) => debug!(
                call_id = %id,
                purpose = purpose.as_deref().unwrap_or("-"),
                input_tokens = response.input_tokens,
                output_tokens = response.output_tokens,
                "LLM call recorded"
            ),
            Err(e) => warn!(error = %e, "Failed to record LLM call"),
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::ChatMessage;
    use crate::llm::testing::ScriptedLlm;
    use crate::store::LibSqlBackend;

    #[tokio::test]
    async fn records_each_successful_call() {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let inner: Arc<dyn LlmProvider> = Arc::new(ScriptedLlm::new(["Work", "Personal"]));
        let tracked = TrackedProvider::new(inner, Arc::clone(&db));

        for _ in 0..2 {
            let request =
                CompletionRequest::new(vec![ChatMessage::user("hi")]).with_purpose("categorize");
            tracked.complete(request).await.unwrap();
        }

        let summary = db.get_total_spend().await.unwrap();
        assert_eq!(summary.call_count, 2);
        assert_eq!(summary.total_input_tokens, 20);
        assert_eq!(summary.total_output_tokens, 10);
    }

    #[tokio::test]
    async fn failed_call_is_not_recorded() {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let inner: Arc<dyn LlmProvider> = Arc::new(ScriptedLlm::failing());
        let tracked = TrackedProvider::new(inner, Arc::clone(&db));

        let result = tracked
            .complete(CompletionRequest::new(vec![ChatMessage::user("hi")]))
            .await;
        assert!(result.is_err());

        let summary = db.get_total_spend().await.unwrap();
        assert_eq!(summary.call_count, 0);
    }
}
