//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::pipeline::types::{ActionItems, PromptRole};
use crate::store::migrations;
use crate::store::traits::{
    DEFAULT_CATEGORY, Database, DraftRecord, EmailRecord, LlmCallRecord, LlmCostSummary, NewDraft,
    NewEmail, PromptRecord,
};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    /// A handle to the shared connection, for collaborators that keep their
    /// own tables in the same database (the knowledge store).
    pub fn connection(&self) -> Connection {
        self.conn.clone()
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn query_emails(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
        context: &str,
    ) -> Result<Vec<EmailRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::Query(format!("{context}: {e}")))?;

        let mut emails = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_email(&row) {
                Ok(email) => emails.push(email),
                Err(e) => warn!("Skipping email row: {e}"),
            }
        }
        Ok(emails)
    }

    async fn get_prompt_by_id(&self, id: i64) -> Result<Option<PromptRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {PROMPT_COLUMNS} FROM prompts WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_prompt_by_id: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(
                row_to_prompt(&row).map_err(|e| DatabaseError::Query(format!("row parse: {e}")))?,
            )),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_prompt_by_id: {e}"))),
        }
    }

    async fn get_draft(&self, id: i64) -> Result<Option<DraftRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {DRAFT_COLUMNS} FROM drafts WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_draft: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(
                row_to_draft(&row).map_err(|e| DatabaseError::Query(format!("row parse: {e}")))?,
            )),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_draft: {e}"))),
        }
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Parse stored action items, falling back to the empty default.
fn parse_action_items(raw: &str) -> ActionItems {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!(error = %e, "Stored action_items is not valid, using empty default");
        ActionItems::default()
    })
}

const EMAIL_COLUMNS: &str =
    "id, sender, subject, body, timestamp, is_read, category, action_items, suggested_reply";

const PROMPT_COLUMNS: &str = "id, prompt_type, content, last_updated";

const DRAFT_COLUMNS: &str = "id, recipient, subject, body, timestamp";

/// Map a libsql Row to an EmailRecord.
fn row_to_email(row: &libsql::Row) -> Result<EmailRecord, libsql::Error> {
    let timestamp: String = row.get(4)?;
    let is_read: i64 = row.get(5)?;
    let category: String = row.get(6).unwrap_or_else(|_| DEFAULT_CATEGORY.to_string());
    let action_items: String = row.get(7).unwrap_or_default();

    Ok(EmailRecord {
        id: row.get(0)?,
        sender: row.get(1)?,
        subject: row.get(2)?,
        body: row.get(3)?,
        timestamp: parse_datetime(&timestamp),
        is_read: is_read != 0,
        category,
        action_items: parse_action_items(&action_items),
        suggested_reply: row.get(8).ok(),
    })
}

fn row_to_prompt(row: &libsql::Row) -> Result<PromptRecord, libsql::Error> {
    let last_updated: String = row.get(3)?;
    Ok(PromptRecord {
        id: row.get(0)?,
        prompt_type: row.get(1)?,
        content: row.get(2)?,
        last_updated: parse_datetime(&last_updated),
    })
}

fn row_to_draft(row: &libsql::Row) -> Result<DraftRecord, libsql::Error> {
    let timestamp: String = row.get(4)?;
    Ok(DraftRecord {
        id: row.get(0)?,
        recipient: row.get(1)?,
        subject: row.get(2)?,
        body: row.get(3)?,
        timestamp: parse_datetime(&timestamp),
    })
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

async fn parse_cost_summary_row(rows: &mut libsql::Rows) -> Result<LlmCostSummary, DatabaseError> {
    use rust_decimal::Decimal;
    use std::str::FromStr;

    match rows.next().await {
        Ok(Some(row)) => {
            // TOTAL() always returns f64 in SQLite/libsql
            let cost_f64: f64 = row.get(0).unwrap_or(0.0);
            let total_cost = Decimal::from_str(&format!("{cost_f64:.10}")).unwrap_or(Decimal::ZERO);
            let input_tokens: f64 = row.get(1).unwrap_or(0.0);
            let output_tokens: f64 = row.get(2).unwrap_or(0.0);
            let call_count = row.get::<i64>(3).unwrap_or(0);

            Ok(LlmCostSummary {
                total_cost,
                total_input_tokens: input_tokens as u64,
                total_output_tokens: output_tokens as u64,
                call_count: call_count as u64,
            })
        }
        _ => Ok(LlmCostSummary::default()),
    }
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Emails ──────────────────────────────────────────────────────

    async fn insert_email(&self, email: &NewEmail) -> Result<EmailRecord, DatabaseError> {
        let items = serde_json::to_string(&ActionItems::default())
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO emails (sender, subject, body, timestamp, is_read, category, action_items)
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6)",
            params![
                email.sender.as_str(),
                email.subject.as_str(),
                email.body.as_str(),
                email.timestamp.to_rfc3339(),
                DEFAULT_CATEGORY,
                items,
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("insert_email: {e}")))?;

        let id = conn.last_insert_rowid();
        debug!(id, sender = %email.sender, "Email inserted into DB");

        self.get_email(id).await?.ok_or_else(|| DatabaseError::NotFound {
            entity: "email".to_string(),
            id: id.to_string(),
        })
    }

    async fn get_email(&self, id: i64) -> Result<Option<EmailRecord>, DatabaseError> {
        let mut emails = self
            .query_emails(
                &format!("SELECT {EMAIL_COLUMNS} FROM emails WHERE id = ?1"),
                params![id],
                "get_email",
            )
            .await?;
        Ok(emails.pop())
    }

    async fn list_emails(&self, skip: i64, limit: i64) -> Result<Vec<EmailRecord>, DatabaseError> {
        self.query_emails(
            &format!(
                "SELECT {EMAIL_COLUMNS} FROM emails ORDER BY timestamp DESC, id DESC LIMIT ?1 OFFSET ?2"
            ),
            params![limit.max(0), skip.max(0)],
            "list_emails",
        )
        .await
    }

    async fn all_emails(&self) -> Result<Vec<EmailRecord>, DatabaseError> {
        self.query_emails(
            &format!("SELECT {EMAIL_COLUMNS} FROM emails ORDER BY id ASC"),
            (),
            "all_emails",
        )
        .await
    }

    async fn count_emails(&self) -> Result<i64, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT COUNT(*) FROM emails", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("count_emails: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).unwrap_or(0)),
            _ => Ok(0),
        }
    }

    async fn delete_email(&self, id: i64) -> Result<bool, DatabaseError> {
        let count = self
            .conn()
            .execute("DELETE FROM emails WHERE id = ?1", params![id])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_email: {e}")))?;
        Ok(count > 0)
    }

    async fn delete_all_emails(&self) -> Result<usize, DatabaseError> {
        let count = self
            .conn()
            .execute("DELETE FROM emails", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_all_emails: {e}")))?;

        info!(count, "Cleared emails table");
        Ok(count as usize)
    }

    async fn apply_pipeline_result(
        &self,
        id: i64,
        category: &str,
        action_items: &ActionItems,
        suggested_reply: &str,
    ) -> Result<Option<EmailRecord>, DatabaseError> {
        let items = serde_json::to_string(action_items)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let count = self
            .conn()
            .execute(
                "UPDATE emails SET category = ?1, action_items = ?2, suggested_reply = ?3 WHERE id = ?4",
                params![category, items, suggested_reply, id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("apply_pipeline_result: {e}")))?;

        if count == 0 {
            return Ok(None);
        }
        debug!(id, category, "Pipeline result stored");
        self.get_email(id).await
    }

    async fn save_suggested_reply(
        &self,
        id: i64,
        reply: &str,
    ) -> Result<Option<EmailRecord>, DatabaseError> {
        let count = self
            .conn()
            .execute(
                "UPDATE emails SET suggested_reply = ?1 WHERE id = ?2",
                params![reply, id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save_suggested_reply: {e}")))?;

        if count == 0 {
            return Ok(None);
        }
        self.get_email(id).await
    }

    async fn set_email_read(
        &self,
        id: i64,
        is_read: bool,
    ) -> Result<Option<EmailRecord>, DatabaseError> {
        let count = self
            .conn()
            .execute(
                "UPDATE emails SET is_read = ?1 WHERE id = ?2",
                params![is_read as i64, id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_email_read: {e}")))?;

        if count == 0 {
            return Ok(None);
        }
        self.get_email(id).await
    }

    // ── Prompts ─────────────────────────────────────────────────────

    async fn get_prompt(&self, role: PromptRole) -> Result<Option<PromptRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {PROMPT_COLUMNS} FROM prompts WHERE prompt_type = ?1"),
                params![role.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_prompt: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(
                row_to_prompt(&row).map_err(|e| DatabaseError::Query(format!("row parse: {e}")))?,
            )),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_prompt: {e}"))),
        }
    }

    async fn list_prompts(&self) -> Result<Vec<PromptRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {PROMPT_COLUMNS} FROM prompts ORDER BY id ASC"),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_prompts: {e}")))?;

        let mut prompts = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_prompt(&row) {
                Ok(p) => prompts.push(p),
                Err(e) => warn!("Skipping prompt row: {e}"),
            }
        }
        Ok(prompts)
    }

    async fn update_prompt_content(
        &self,
        id: i64,
        content: &str,
    ) -> Result<Option<PromptRecord>, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let count = self
            .conn()
            .execute(
                "UPDATE prompts SET content = ?1, last_updated = ?2 WHERE id = ?3",
                params![content, now, id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_prompt_content: {e}")))?;

        if count == 0 {
            return Ok(None);
        }
        info!(id, "Prompt updated");
        self.get_prompt_by_id(id).await
    }

    async fn insert_prompt_if_missing(
        &self,
        prompt_type: &str,
        content: &str,
    ) -> Result<bool, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let count = self
            .conn()
            .execute(
                "INSERT OR IGNORE INTO prompts (prompt_type, content, last_updated) VALUES (?1, ?2, ?3)",
                params![prompt_type, content, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_prompt_if_missing: {e}")))?;
        Ok(count > 0)
    }

    // ── Drafts ──────────────────────────────────────────────────────

    async fn insert_draft(&self, draft: &NewDraft) -> Result<DraftRecord, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO drafts (recipient, subject, body, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![
                draft.recipient.as_str(),
                draft.subject.as_str(),
                draft.body.as_str(),
                now,
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("insert_draft: {e}")))?;

        let id = conn.last_insert_rowid();
        debug!(id, recipient = %draft.recipient, "Draft saved");

        self.get_draft(id).await?.ok_or_else(|| DatabaseError::NotFound {
            entity: "draft".to_string(),
            id: id.to_string(),
        })
    }

    async fn list_drafts(&self) -> Result<Vec<DraftRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {DRAFT_COLUMNS} FROM drafts ORDER BY timestamp DESC, id DESC"),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_drafts: {e}")))?;

        let mut drafts = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_draft(&row) {
                Ok(d) => drafts.push(d),
                Err(e) => warn!("Skipping draft row: {e}"),
            }
        }
        Ok(drafts)
    }

    async fn delete_draft(&self, id: i64) -> Result<bool, DatabaseError> {
        let count = self
            .conn()
            .execute("DELETE FROM drafts WHERE id = ?1", params![id])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_draft: {e}")))?;
        Ok(count > 0)
    }

    // ── LLM Call Tracking ────────────────────────────────────────────

    async fn record_llm_call(&self, record: &LlmCallRecord<'_>) -> Result<Uuid, DatabaseError> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO llm_calls (id, provider, model, input_tokens, output_tokens, cost, purpose, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id.to_string(),
                    record.provider,
                    record.model,
                    record.input_tokens as i64,
                    record.output_tokens as i64,
                    record.cost.to_string(),
                    opt_text(record.purpose),
                    now,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("record_llm_call: {e}")))?;

        Ok(id)
    }

    async fn get_total_spend(&self) -> Result<LlmCostSummary, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT TOTAL(CAST(cost AS REAL)), TOTAL(input_tokens), TOTAL(output_tokens), COUNT(*) FROM llm_calls",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_total_spend: {e}")))?;

        parse_cost_summary_row(&mut rows).await
    }
}
