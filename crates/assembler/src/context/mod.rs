//! Context assembly: truncate retrieved fragments, then build the prompt.

pub mod builder;
pub mod truncate;

pub use builder::PromptBuilder;
pub use truncate::{FRAGMENT_SEPARATOR, truncate_context};
