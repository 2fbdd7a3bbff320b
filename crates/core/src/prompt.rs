//! The assembled prompt and the two shapes providers accept.
//!
//! Chat-style APIs take a structured list of role-tagged messages.
//! Legacy completion APIs take one string, so the history is rendered as a
//! role-labeled transcript appended to the system message.

use serde::{Deserialize, Serialize};

use crate::message::{ConversationTurn, Role};

/// Which request shape a provider accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptShape {
    /// Role-tagged message array (chat completions, messages APIs).
    #[default]
    Messages,
    /// One concatenated string (legacy text completions).
    Transcript,
}

/// A role-tagged entry of a structured prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl From<&ConversationTurn> for ChatMessage {
    fn from(turn: &ConversationTurn) -> Self {
        Self {
            role: turn.role(),
            content: turn.content().to_string(),
        }
    }
}

/// A prompt in the shape a particular provider accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Prompt {
    Messages(Vec<ChatMessage>),
    Text(String),
}

/// Everything the generation collaborator needs for one exchange.
///
/// Built fresh per request by the prompt builder; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptRequest {
    system_message: String,
    history: Vec<ConversationTurn>,
    user_message: String,
}

impl PromptRequest {
    pub fn new(
        system_message: impl Into<String>,
        history: Vec<ConversationTurn>,
        user_message: impl Into<String>,
    ) -> Self {
        Self {
            system_message: system_message.into(),
            history,
            user_message: user_message.into(),
        }
    }

    pub fn system_message(&self) -> &str {
        &self.system_message
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    /// Structured shape: system, history oldest first, then the user turn.
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage {
            role: Role::System,
            content: self.system_message.clone(),
        });
        messages.extend(self.history.iter().map(ChatMessage::from));
        messages.push(ChatMessage {
            role: Role::User,
            content: self.user_message.clone(),
        });
        messages
    }

    /// String shape: the system message followed by a role-labeled
    /// transcript and a trailing assistant cue.
    pub fn to_transcript(&self) -> String {
        let mut out = String::with_capacity(
            self.system_message.len()
                + self.user_message.len()
                + self.history.iter().map(|t| t.content().len() + 12).sum::<usize>()
                + 32,
        );
        out.push_str(&self.system_message);
        out.push_str("\n\n");
        for turn in &self.history {
            out.push_str(turn.role().label());
            out.push_str(": ");
            out.push_str(turn.content());
            out.push('\n');
        }
        out.push_str(Role::User.label());
        out.push_str(": ");
        out.push_str(&self.user_message);
        out.push('\n');
        out.push_str(Role::Assistant.label());
        out.push(':');
        out
    }

    /// Render into the requested shape.
    pub fn shaped(&self, shape: PromptShape) -> Prompt {
        match shape {
            PromptShape::Messages => Prompt::Messages(self.to_messages()),
            PromptShape::Transcript => Prompt::Text(self.to_transcript()),
        }
    }
}
