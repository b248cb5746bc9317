//! Shared types for the email pipeline, chat responder, and composer.

use serde::{Deserialize, Serialize};

/// Draft value stored when an email doesn't warrant a reply.
pub const NO_REPLY_NEEDED: &str = "NO_REPLY_NEEDED";

/// Structured extraction result.
///
/// Always serializes as an object with exactly `tasks` and `suggestions`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionItems {
    #[serde(default)]
    pub tasks: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl ActionItems {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty() && self.suggestions.is_empty()
    }
}

/// The fixed set of prompt roles the pipeline reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptRole {
    Categorize,
    ExtractActions,
    AutoReply,
}

impl PromptRole {
    pub const ALL: [PromptRole; 3] = [
        PromptRole::Categorize,
        PromptRole::ExtractActions,
        PromptRole::AutoReply,
    ];

    /// Role name as stored in `prompts.prompt_type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptRole::Categorize => "categorize",
            PromptRole::ExtractActions => "extract_actions",
            PromptRole::AutoReply => "auto_reply",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "categorize" => Some(PromptRole::Categorize),
            "extract_actions" => Some(PromptRole::ExtractActions),
            "auto_reply" => Some(PromptRole::AutoReply),
            _ => None,
        }
    }
}

impl std::fmt::Display for PromptRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three instruction texts loaded at the start of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    pub categorize: String,
    pub extract_actions: String,
    pub auto_reply: String,
}

/// Transient state threaded through the three pipeline stages for one email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    pub email_body: String,
    pub sender: String,
    pub category: String,
    pub action_items: ActionItems,
    pub draft: String,
    pub prompts: PromptSet,
}

impl RunState {
    pub fn new(sender: impl Into<String>, email_body: impl Into<String>, prompts: PromptSet) -> Self {
        Self {
            email_body: email_body.into(),
            sender: sender.into(),
            category: String::new(),
            action_items: ActionItems::default(),
            draft: String::new(),
            prompts,
        }
    }
}

/// One prior chat turn supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: String,
    pub content: String,
}

impl HistoryMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_items_serialize_with_both_keys() {
        let json = serde_json::to_value(ActionItems::default()).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(json["tasks"], serde_json::json!([]));
        assert_eq!(json["suggestions"], serde_json::json!([]));
    }

    #[test]
    fn prompt_role_names_round_trip() {
        for role in PromptRole::ALL {
            assert_eq!(PromptRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(PromptRole::parse("summarize"), None);
    }

    #[test]
    fn run_state_starts_empty() {
        let prompts = PromptSet {
            categorize: "c".into(),
            extract_actions: "e".into(),
            auto_reply: "r".into(),
        };
        let state = RunState::new("a@x.com", "hello", prompts);
        assert!(state.category.is_empty());
        assert!(state.action_items.is_empty());
        assert!(state.draft.is_empty());
    }
}
