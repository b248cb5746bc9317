//! Bridges rig's `CompletionModel` to our `LlmProvider` trait.

use async_trait::async_trait;
use rig::completion::{AssistantContent, CompletionModel, Message};
use rust_decimal::Decimal;
use tracing::debug;

use super::costs;
use super::provider::{ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, Role};
use crate::error::LlmError;

/// Wraps any rig completion model (Groq, OpenAI, OpenRouter, ...).
pub struct RigAdapter<M: CompletionModel> {
    model: M,
    provider: String,
    model_name: String,
    temperature: Option<f64>,
    max_tokens: Option<u64>,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, provider: &str, model_name: &str) -> Self {
        Self {
            model,
            provider: provider.to_string(),
            model_name: model_name.to_string(),
            temperature: None,
            max_tokens: None,
        }
    }

    /// Sampling temperature sent with every request.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(f64::from(temperature));
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(u64::from(max_tokens));
        self
    }
}

/// Our role-tagged transcript, reshaped the way rig expects it.
struct RigPrompt {
    preamble: Option<String>,
    history: Vec<Message>,
    prompt: Message,
}

/// System messages become the preamble; the last conversational turn is the
/// prompt and everything before it is history. `None` when there is no
/// conversational turn at all.
fn to_rig_prompt(messages: &[ChatMessage]) -> Option<RigPrompt> {
    let preamble = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut history: Vec<Message> = messages
        .iter()
        .filter_map(|m| match m.role {
            Role::System => None,
            Role::User => Some(Message::user(m.content.clone())),
            Role::Assistant => Some(Message::assistant(m.content.clone())),
        })
        .collect();
    let prompt = history.pop()?;

    Some(RigPrompt {
        preamble: (!preamble.is_empty()).then_some(preamble),
        history,
        prompt,
    })
}

fn saturating_u32(n: u64) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + 'static,
{
    fn provider_name(&self) -> &str {
        &self.provider
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn cost_per_token(&self) -> (Decimal, Decimal) {
        costs::model_cost(&self.model_name)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let RigPrompt {
            preamble,
            history,
            prompt,
        } = to_rig_prompt(&request.messages).ok_or_else(|| LlmError::RequestFailed {
            provider: self.provider.clone(),
            reason: "request has no user or assistant message".to_string(),
        })?;

        debug!(
            provider = %self.provider,
            model = %self.model_name,
            history = history.len(),
            "Sending completion"
        );

        let mut builder = self.model.completion_request(prompt).messages(history);
        if let Some(preamble) = preamble {
            builder = builder.preamble(preamble);
        }
        if let Some(temperature) = self.temperature {
            builder = builder.temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }

        let response = builder.send().await.map_err(|e| LlmError::RequestFailed {
            provider: self.provider.clone(),
            reason: e.to_string(),
        })?;

        let content: String = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect();

        if content.is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.provider.clone(),
                reason: "response contained no text".to_string(),
            });
        }

        Ok(CompletionResponse {
            content,
            input_tokens: saturating_u32(response.usage.input_tokens),
            output_tokens: saturating_u32(response.usage.output_tokens),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_messages_become_preamble() {
        let messages = vec![
            ChatMessage::system("rules"),
            ChatMessage::system("email body"),
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
            ChatMessage::user("what now?"),
        ];
        let prompt = to_rig_prompt(&messages).unwrap();
        assert_eq!(prompt.preamble.as_deref(), Some("rules\n\nemail body"));
        assert_eq!(prompt.history.len(), 2);
    }

    #[test]
    fn single_user_turn_has_no_history() {
        let prompt = to_rig_prompt(&[ChatMessage::user("Categorize this")]).unwrap();
        assert!(prompt.preamble.is_none());
        assert!(prompt.history.is_empty());
    }

    #[test]
    fn system_only_request_is_rejected() {
        assert!(to_rig_prompt(&[ChatMessage::system("rules")]).is_none());
        assert!(to_rig_prompt(&[]).is_none());
    }

    #[test]
    fn token_counts_saturate() {
        assert_eq!(saturating_u32(12), 12);
        assert_eq!(saturating_u32(u64::MAX), u32::MAX);
    }
}
