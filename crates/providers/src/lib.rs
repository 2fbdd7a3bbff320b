//! LLM Provider implementations for RagBridge.
//!
//! All providers implement the `ragbridge_core::Provider` trait.
//! The router holds the allow-list and dispatches assembled prompts.

pub mod anthropic;
pub mod embedder;
pub mod openai_compat;
pub mod retry;
pub mod router;

pub use anthropic::AnthropicProvider;
pub use embedder::ProviderEmbedder;
pub use openai_compat::{CompletionApi, OpenAiCompatProvider};
pub use retry::RetryingProvider;
pub use router::{NO_REPLY_SENTINEL, ProviderRouter, build_from_config};
