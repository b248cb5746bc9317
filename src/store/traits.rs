//! Unified `Database` trait — single async interface for all persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::pipeline::types::{ActionItems, PromptRole};

/// Category assigned to emails that have never been processed.
pub const DEFAULT_CATEGORY: &str = "Uncategorized";

/// A persisted email.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailRecord {
    pub id: i64,
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub is_read: bool,
    pub category: String,
    pub action_items: ActionItems,
    pub suggested_reply: Option<String>,
}

/// Fields needed to insert an email.
#[derive(Debug, Clone)]
pub struct NewEmail {
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

/// An editable prompt template, keyed by role name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptRecord {
    pub id: i64,
    pub prompt_type: String,
    pub content: String,
    pub last_updated: DateTime<Utc>,
}

/// A composed outbound draft, independent of any email.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftRecord {
    pub id: i64,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

/// Fields needed to insert a draft.
#[derive(Debug, Clone)]
pub struct NewDraft {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// One LLM call to be recorded.
#[derive(Debug, Clone)]
pub struct LlmCallRecord<'a> {
    pub provider: &'a str,
    pub model: &'a str,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost: Decimal,
    pub purpose: Option<&'a str>,
}

/// Aggregated LLM usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LlmCostSummary {
    pub total_cost: Decimal,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub call_count: u64,
}

/// Backend-agnostic database trait covering emails, prompts, drafts, and
/// LLM usage.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Emails ──────────────────────────────────────────────────────

    /// Insert an email with default category and empty action items.
    async fn insert_email(&self, email: &NewEmail) -> Result<EmailRecord, DatabaseError>;

    /// Get an email by ID.
    async fn get_email(&self, id: i64) -> Result<Option<EmailRecord>, DatabaseError>;

    /// List emails newest first.
    async fn list_emails(&self, skip: i64, limit: i64) -> Result<Vec<EmailRecord>, DatabaseError>;

    /// All emails in insertion order (batch processing).
    async fn all_emails(&self) -> Result<Vec<EmailRecord>, DatabaseError>;

    /// Count stored emails.
    async fn count_emails(&self) -> Result<i64, DatabaseError>;

    /// Delete one email. Returns false when it didn't exist.
    async fn delete_email(&self, id: i64) -> Result<bool, DatabaseError>;

    /// Delete every email. Returns the number removed.
    async fn delete_all_emails(&self) -> Result<usize, DatabaseError>;

    /// Write a completed pipeline run onto an email in a single update.
    async fn apply_pipeline_result(
        &self,
        id: i64,
        category: &str,
        action_items: &ActionItems,
        suggested_reply: &str,
    ) -> Result<Option<EmailRecord>, DatabaseError>;

    /// Replace an email's suggested reply.
    async fn save_suggested_reply(
        &self,
        id: i64,
        reply: &str,
    ) -> Result<Option<EmailRecord>, DatabaseError>;

    /// Set the read flag.
    async fn set_email_read(&self, id: i64, is_read: bool)
    -> Result<Option<EmailRecord>, DatabaseError>;

    // ── Prompts ─────────────────────────────────────────────────────

    /// Look up the prompt for a pipeline role.
    async fn get_prompt(&self, role: PromptRole) -> Result<Option<PromptRecord>, DatabaseError>;

    /// List all prompts.
    async fn list_prompts(&self) -> Result<Vec<PromptRecord>, DatabaseError>;

    /// Replace a prompt's content.
    async fn update_prompt_content(
        &self,
        id: i64,
        content: &str,
    ) -> Result<Option<PromptRecord>, DatabaseError>;

    /// Insert a prompt unless one with that role already exists.
    /// Returns true when a row was inserted.
    async fn insert_prompt_if_missing(
        &self,
        prompt_type: &str,
        content: &str,
    ) -> Result<bool, DatabaseError>;

    // ── Drafts ──────────────────────────────────────────────────────

    /// Insert a draft.
    async fn insert_draft(&self, draft: &NewDraft) -> Result<DraftRecord, DatabaseError>;

    /// List drafts newest first.
    async fn list_drafts(&self) -> Result<Vec<DraftRecord>, DatabaseError>;

    /// Delete a draft. Returns false when it didn't exist.
    async fn delete_draft(&self, id: i64) -> Result<bool, DatabaseError>;

    // ── LLM call tracking ───────────────────────────────────────────

    /// Record one LLM call.
    async fn record_llm_call(&self, record: &LlmCallRecord<'_>) -> Result<Uuid, DatabaseError>;

    /// Totals across all recorded calls.
    async fn get_total_spend(&self) -> Result<LlmCostSummary, DatabaseError>;
}
