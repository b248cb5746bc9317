//! Output contract for the action-item extraction stage.
//!
//! The model is told to return one JSON object with `tasks` and
//! `suggestions`. Whatever comes back is recovered into `ActionItems`:
//!
//! 1. the whole trimmed response, if it parses as a JSON object;
//! 2. otherwise, when the response doesn't parse at all, the span from the
//!    first `{` to the last `}`, if that parses as an object;
//! 3. otherwise the empty default.
//!
//! Accepted objects are repaired field by field, so the result always has
//! both lists. Recovery never fails.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use super::types::ActionItems;

/// Appended to the configured extraction instructions.
pub const STRICT_JSON_DIRECTIVE: &str = "IMPORTANT: Return ONLY a single valid JSON object with exactly two keys: \
\"tasks\" (a list of strings, one per task the recipient must do) and \
\"suggestions\" (a list of strings, one per optional follow-up). \
Do not add Markdown formatting. Do not add conversational text. \
Example: {\"tasks\": [\"...\"], \"suggestions\": [\"...\"]}";

static OBJECT_SPAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Extraction instructions with the strict directive appended.
pub fn strict_instructions(instructions: &str) -> String {
    format!("{}\n\n{STRICT_JSON_DIRECTIVE}", instructions.trim_end())
}

/// Recover action items from a raw model response.
pub fn recover_action_items(response: &str) -> ActionItems {
    let trimmed = response.trim();

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => {
            debug!("Action items parsed directly");
            return repair(map);
        }
        Ok(other) => {
            warn!(kind = json_kind(&other), "Action items response is not an object, using default");
            return ActionItems::default();
        }
        Err(_) => {}
    }

    if let Some(span) = OBJECT_SPAN.find(trimmed)
        && let Ok(Value::Object(map)) = serde_json::from_str::<Value>(span.as_str())
    {
        debug!("Action items recovered from embedded object");
        return repair(map);
    }

    warn!("Could not recover action items from response, using default");
    ActionItems::default()
}

/// Coerce an accepted object into `ActionItems`. Missing or non-list keys
/// become empty lists; extra keys are dropped.
fn repair(mut map: serde_json::Map<String, Value>) -> ActionItems {
    ActionItems {
        tasks: string_list(map.remove("tasks")),
        suggestions: string_list(map.remove("suggestions")),
    }
}

fn string_list(value: Option<Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(tasks: &[&str], suggestions: &[&str]) -> ActionItems {
        ActionItems {
            tasks: tasks.iter().map(|s| s.to_string()).collect(),
            suggestions: suggestions.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn direct_object_is_stored_unchanged() {
        let out = recover_action_items(
            r#"{"tasks": ["Send Q3 report draft"], "suggestions": ["Schedule review meeting"]}"#,
        );
        assert_eq!(out, items(&["Send Q3 report draft"], &["Schedule review meeting"]));
    }

    #[test]
    fn object_wrapped_in_prose_is_recovered() {
        let out = recover_action_items(
            "Sure! Here's the JSON:\n{\"tasks\": [\"Call client\"], \"suggestions\": []}\nLet me know if you need more.",
        );
        assert_eq!(out, items(&["Call client"], &[]));
    }

    #[test]
    fn object_in_markdown_fence_is_recovered() {
        let out = recover_action_items(
            "```json\n{\"tasks\": [\"Review contract\"], \"suggestions\": [\"Loop in legal\"]}\n```",
        );
        assert_eq!(out, items(&["Review contract"], &["Loop in legal"]));
    }

    #[test]
    fn plain_refusal_yields_default() {
        let out = recover_action_items("I cannot extract tasks from this email.");
        assert_eq!(out, ActionItems::default());
    }

    #[test]
    fn json_array_is_rejected() {
        assert_eq!(recover_action_items(r#"["Call client"]"#), ActionItems::default());
        assert_eq!(
            recover_action_items(r#"[{"tasks": ["Call client"], "suggestions": []}]"#),
            ActionItems::default()
        );
    }

    #[test]
    fn scalar_json_is_rejected() {
        assert_eq!(recover_action_items("42"), ActionItems::default());
        assert_eq!(recover_action_items("null"), ActionItems::default());
        assert_eq!(recover_action_items(r#""tasks""#), ActionItems::default());
    }

    #[test]
    fn unrelated_object_repairs_to_empty_lists() {
        assert_eq!(recover_action_items(r#"{"foo": 1}"#), ActionItems::default());
    }

    #[test]
    fn missing_key_becomes_empty_list() {
        let out = recover_action_items(r#"{"tasks": ["Reply to HR"]}"#);
        assert_eq!(out, items(&["Reply to HR"], &[]));
    }

    #[test]
    fn mistyped_values_are_repaired() {
        let out = recover_action_items(
            r#"{"tasks": "Reply to HR", "suggestions": ["Ask for agenda", null, 3, {"task": "x"}]}"#,
        );
        assert!(out.tasks.is_empty());
        assert_eq!(out.suggestions, vec!["Ask for agenda", "3", r#"{"task":"x"}"#]);
    }

    #[test]
    fn greedy_span_covering_two_objects_fails_to_default() {
        let out = recover_action_items(r#"First {"tasks": ["a"]} then {"tasks": ["b"]} done"#);
        assert_eq!(out, ActionItems::default());
    }

    #[test]
    fn nested_braces_are_kept_inside_greedy_span() {
        let out = recover_action_items(
            r#"Result: {"tasks": ["Book room"], "suggestions": [], "meta": {"source": "llm"}} end"#,
        );
        assert_eq!(out, items(&["Book room"], &[]));
    }

    #[test]
    fn unbalanced_braces_yield_default() {
        assert_eq!(recover_action_items("} nothing here {"), ActionItems::default());
        assert_eq!(recover_action_items(r#"{"tasks": ["a""#), ActionItems::default());
    }

    #[test]
    fn whitespace_around_object_is_ignored() {
        let out = recover_action_items("\n\n  {\"tasks\": [], \"suggestions\": [\"Unsubscribe\"]}  \n");
        assert_eq!(out, items(&[], &["Unsubscribe"]));
    }

    #[test]
    fn result_always_serializes_with_both_keys() {
        for response in ["", "garbage", "[]", r#"{"foo": 1}"#, r#"{"tasks": null}"#] {
            let value = serde_json::to_value(recover_action_items(response)).unwrap();
            let obj = value.as_object().unwrap();
            assert_eq!(obj.len(), 2, "response {response:?}");
            assert!(obj["tasks"].is_array());
            assert!(obj["suggestions"].is_array());
        }
    }

    #[test]
    fn strict_instructions_append_directive() {
        let text = strict_instructions("Extract action items.\n");
        assert!(text.starts_with("Extract action items.\n\nIMPORTANT:"));
        assert!(text.contains("\"tasks\""));
        assert!(text.contains("\"suggestions\""));
    }
}
