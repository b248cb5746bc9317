//! Email intelligence: the three-stage processing pipeline, per-email chat,
//! and the compose flow.
//!
//! Every email that gets processed flows through:
//! 1. `Stage::Categorize` — free-text category from the model
//! 2. `Stage::ExtractActions` — JSON action items, recovered by `contract`
//! 3. `Stage::DraftReply` — suggested reply, skipped for spam and newsletters
//!
//! Nothing is written until all three stages have completed.

pub mod chat;
pub mod compose;
pub mod contract;
pub mod processor;
pub mod types;

pub use chat::ChatResponder;
pub use compose::Composer;
pub use processor::{EmailPipeline, ProcessOutcome, Stage};
pub use types::{ActionItems, HistoryMessage, NO_REPLY_NEEDED, PromptRole, PromptSet, RunState};
