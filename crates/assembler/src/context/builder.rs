//! Prompt builder.
//!
//! Chooses between the contextual and fallback instruction sets and packs
//! the system message, prior turns, and the new user message into a
//! [`PromptRequest`]. Pure: no I/O, no failure modes.

use ragbridge_config::{AssemblerConfig, CONTEXT_PLACEHOLDER};
use ragbridge_core::message::ConversationTurn;
use ragbridge_core::prompt::PromptRequest;

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    base_instructions: String,
    fallback_instructions: String,
    contextual_template: String,
}

impl PromptBuilder {
    pub fn new(
        base_instructions: impl Into<String>,
        fallback_instructions: impl Into<String>,
        contextual_template: impl Into<String>,
    ) -> Self {
        Self {
            base_instructions: base_instructions.into(),
            fallback_instructions: fallback_instructions.into(),
            contextual_template: contextual_template.into(),
        }
    }

    pub fn from_config(config: &AssemblerConfig) -> Self {
        Self::new(
            &config.base_instructions,
            &config.fallback_instructions,
            &config.contextual_instructions_template,
        )
    }

    /// The system message for a given (already truncated) context.
    ///
    /// Blank context selects the fallback instructions. Only the first
    /// placeholder in the template receives the context.
    pub fn system_message(&self, context: &str) -> String {
        let tail = if context.trim().is_empty() {
            self.fallback_instructions.clone()
        } else {
            self.contextual_template.replacen(CONTEXT_PLACEHOLDER, context, 1)
        };
        format!("{}\n\n{}", self.base_instructions, tail)
    }

    pub fn build(
        &self,
        context: &str,
        history: &[ConversationTurn],
        user_message: &str,
    ) -> PromptRequest {
        PromptRequest::new(self.system_message(context), history.to_vec(), user_message)
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::from_config(&AssemblerConfig::default())
    }
}
