//! Context-augmented prompt assembly for RagBridge.
//!
//! - [`context`]: truncation of retrieved fragments and prompt building
//! - [`history`]: bounded per-session conversation histories
//! - [`pipeline`]: the end-to-end chat flow tying retrieval, assembly,
//!   generation, and history together

pub mod context;
pub mod history;
pub mod pipeline;

pub use context::{PromptBuilder, truncate_context};
pub use history::{ConversationHistory, SessionHistories};
pub use pipeline::{ChatPipeline, ChatReply, ChatTurnRequest, PipelineSettings};
