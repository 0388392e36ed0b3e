//! Conversation summarization through the text-generation capability.

use std::sync::Arc;

use ctxkeeper_core::{Error, Message, Provider, ProviderRequest, Result};
use tracing::debug;

const SYSTEM_INSTRUCTION: &str = "You are a helpful assistant that creates concise summaries of conversations. \
Capture the key points, decisions, and context that would be important for continuing the conversation.";

const USER_PREAMBLE: &str = "Please summarize the following conversation concisely:";

pub const DEFAULT_SUMMARY_TEMPERATURE: f32 = 0.3;

/// Produces a prose summary of a run of messages.
#[derive(Clone)]
pub struct Summarizer {
    provider: Arc<dyn Provider>,
    temperature: f32,
}

impl Summarizer {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            temperature: DEFAULT_SUMMARY_TEMPERATURE,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// The two-message prompt sent to the model.
    pub fn build_prompt(messages: &[Message]) -> Vec<Message> {
        let transcript = messages
            .iter()
            .map(|m| format!("{}: {}", m.role.as_str().to_uppercase(), m.content))
            .collect::<Vec<_>>()
            .join("\n");

        vec![
            Message::system(SYSTEM_INSTRUCTION),
            Message::user(format!("{USER_PREAMBLE}\n\n{transcript}")),
        ]
    }

    /// Summarize `messages` with `model`.
    ///
    /// Any provider failure, and an empty reply, is reported as
    /// [`Error::GenerationUnavailable`].
    pub async fn summarize(&self, model: &str, messages: &[Message]) -> Result<String> {
        let request = ProviderRequest::new(model, Self::build_prompt(messages))
            .with_temperature(self.temperature);

        debug!(model, messages = messages.len(), "Requesting summary");

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| Error::GenerationUnavailable(e.to_string()))?;

        let text = response.message.content.trim();
        if text.is_empty() {
            return Err(Error::GenerationUnavailable(format!(
                "{} returned an empty summary",
                self.provider.name()
            )));
        }

        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedProvider;
    use ctxkeeper_core::Role;

    #[test]
    fn prompt_has_instruction_and_transcript() {
        let prompt = Summarizer::build_prompt(&[
            Message::user("What is Rust?"),
            Message::assistant("A systems language."),
        ]);
        assert_eq!(prompt.len(), 2);
        assert_eq!(prompt[0].role, Role::System);
        assert!(prompt[0].content.contains("concise summaries"));
        assert_eq!(
            prompt[1].content,
            "Please summarize the following conversation concisely:\n\n\
             USER: What is Rust?\nASSISTANT: A systems language."
        );
    }

    #[tokio::test]
    async fn uses_configured_temperature() {
        let provider = Arc::new(ScriptedProvider::replying("short summary"));
        let summarizer = Summarizer::new(provider.clone());
        let text = summarizer.summarize("phi3:latest", &[Message::user("hi")]).await.unwrap();

        assert_eq!(text, "short summary");
        let request = provider.last_request().unwrap();
        assert!((request.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(request.model, "phi3:latest");
    }

    #[tokio::test]
    async fn provider_failure_is_generation_unavailable() {
        let summarizer = Summarizer::new(Arc::new(ScriptedProvider::failing()));
        let err = summarizer.summarize("m", &[Message::user("hi")]).await.unwrap_err();
        assert!(matches!(err, Error::GenerationUnavailable(_)));
    }

    #[tokio::test]
    async fn blank_reply_is_generation_unavailable() {
        let summarizer = Summarizer::new(Arc::new(ScriptedProvider::replying("   \n")));
        let err = summarizer.summarize("m", &[Message::user("hi")]).await.unwrap_err();
        assert!(matches!(err, Error::GenerationUnavailable(_)));
    }
}
