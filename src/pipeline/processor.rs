//! Email processor — runs the three-stage pipeline over stored emails.
//!
//! Flow, per email:
//! 1. Load the three prompts (any missing → no-op, nothing is called)
//! 2. Categorize → extract action items → draft reply, on one `RunState`
//! 3. Write category, action items, and suggested reply in one update
//!
//! A model failure aborts the run before step 3, so an email is never left
//! half-processed.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::PipelineError;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::contract::{recover_action_items, strict_instructions};
use crate::pipeline::types::{NO_REPLY_NEEDED, PromptRole, PromptSet, RunState};
use crate::store::{Database, EmailRecord};

/// One step of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Categorize,
    ExtractActions,
    DraftReply,
}

impl Stage {
    /// Execution order.
    pub const ORDER: [Stage; 3] = [Stage::Categorize, Stage::ExtractActions, Stage::DraftReply];

    /// Name used in logs and as the purpose of the model call.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Categorize => "categorize",
            Stage::ExtractActions => "extract_actions",
            Stage::DraftReply => "draft_reply",
        }
    }
}

/// Categories that never get a drafted reply (matched as lowercase substrings).
const NO_REPLY_CATEGORIES: [&str; 2] = ["spam", "newsletter"];

/// True when a category means no reply should be drafted.
pub fn skips_reply(category: &str) -> bool {
    let lower = category.to_lowercase();
    NO_REPLY_CATEGORIES.iter().any(|c| lower.contains(c))
}

/// Result of processing one email.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// All stages ran and the result was stored.
    Processed(EmailRecord),
    /// A prompt role is missing; the email is returned unchanged.
    Unconfigured(EmailRecord),
}

impl ProcessOutcome {
    pub fn email(&self) -> &EmailRecord {
        match self {
            ProcessOutcome::Processed(email) | ProcessOutcome::Unconfigured(email) => email,
        }
    }

    pub fn into_email(self) -> EmailRecord {
        match self {
            ProcessOutcome::Processed(email) | ProcessOutcome::Unconfigured(email) => email,
        }
    }
}

/// Runs the categorize → extract → draft chain and persists its result.
pub struct EmailPipeline {
    db: Arc<dyn Database>,
    llm: Arc<dyn LlmProvider>,
}

impl EmailPipeline {
    pub fn new(db: Arc<dyn Database>, llm: Arc<dyn LlmProvider>) -> Self {
        Self { db, llm }
    }

    /// Load the prompt for every role, or `None` if any is missing.
    pub async fn load_prompts(&self) -> Result<Option<PromptSet>, PipelineError> {
        let mut texts = Vec::with_capacity(PromptRole::ALL.len());
        for role in PromptRole::ALL {
            match self.db.get_prompt(role).await? {
                Some(prompt) => texts.push(prompt.content),
                None => {
                    warn!(role = %role, "Prompt missing, run seeding to restore defaults");
                    return Ok(None);
                }
            }
        }

        let mut texts = texts.into_iter();
        Ok(Some(PromptSet {
            categorize: texts.next().unwrap_or_default(),
            extract_actions: texts.next().unwrap_or_default(),
            auto_reply: texts.next().unwrap_or_default(),
        }))
    }

    /// Run every stage, in order, on one run state.
    pub async fn run(&self, state: &mut RunState) -> Result<(), PipelineError> {
        for stage in Stage::ORDER {
            debug!(stage = stage.name(), "Running pipeline stage");
            self.run_stage(stage, state).await?;
        }
        Ok(())
    }

    async fn run_stage(&self, stage: Stage, state: &mut RunState) -> Result<(), PipelineError> {
        match stage {
            Stage::Categorize => {
                let user = format!("Sender: {}\nBody: {}", state.sender, state.email_body);
                let response = self
                    .call(stage, state.prompts.categorize.clone(), user)
                    .await?;
                state.category = response.trim().to_string();
            }
            Stage::ExtractActions => {
                let system = strict_instructions(&state.prompts.extract_actions);
                let user = format!("Email: {}", state.email_body);
                let response = self.call(stage, system, user).await?;
                state.action_items = recover_action_items(&response);
            }
            Stage::DraftReply => {
                if skips_reply(&state.category) {
                    debug!(category = %state.category, "No reply needed for category");
                    state.draft = NO_REPLY_NEEDED.to_string();
                } else {
                    let response = self
                        .call(stage, state.prompts.auto_reply.clone(), state.email_body.clone())
                        .await?;
                    state.draft = response.trim().to_string();
                }
            }
        }
        Ok(())
    }

    async fn call(&self, stage: Stage, system: String, user: String) -> Result<String, PipelineError> {
        let request = CompletionRequest::new(vec![ChatMessage::system(system), ChatMessage::user(user)])
            .with_purpose(stage.name());
        let response = self.llm.complete(request).await?;
        Ok(response.content)
    }

    /// Process one stored email.
    pub async fn process_email(&self, id: i64) -> Result<ProcessOutcome, PipelineError> {
        let email = self
            .db
            .get_email(id)
            .await?
            .ok_or(PipelineError::EmailNotFound(id))?;

        info!(id, sender = %email.sender, "Processing email");

        let Some(prompts) = self.load_prompts().await? else {
            return Ok(ProcessOutcome::Unconfigured(email));
        };

        let mut state = RunState::new(&email.sender, &email.body, prompts);
        self.run(&mut state).await?;

        let updated = self
            .db
            .apply_pipeline_result(id, &state.category, &state.action_items, &state.draft)
            .await?
            .ok_or(PipelineError::EmailNotFound(id))?;

        info!(
            id,
            category = %updated.category,
            tasks = updated.action_items.tasks.len(),
            suggestions = updated.action_items.suggestions.len(),
            "Email processed"
        );
        Ok(ProcessOutcome::Processed(updated))
    }

    /// Process every stored email, one at a time.
    ///
    /// Failures are logged and skipped. Returns how many emails were
    /// processed and stored.
    pub async fn process_all(&self) -> Result<usize, PipelineError> {
        let emails = self.db.all_emails().await?;
        let total = emails.len();
        info!(count = total, "Processing all emails");

        let mut processed = 0;
        for email in emails {
            match self.process_email(email.id).await {
                Ok(ProcessOutcome::Processed(_)) => processed += 1,
                Ok(ProcessOutcome::Unconfigured(_)) => {
                    warn!(id = email.id, "Email skipped, prompts not configured");
                }
                Err(e) => {
                    error!(id = email.id, error = %e, "Failed to process email in batch");
                }
            }
        }

        info!(processed, total, "Batch processing complete");
        Ok(processed)
    }
}
