//! LLM provider abstraction layer.
//!
//! Gap-fill talks to completion services through [`LlmProvider`], so any
//! OpenAI-compatible backend (or a scripted fake in tests) can sit behind it.

mod openai;
mod provider;
mod types;

pub use openai::{ApiKeySource, OpenAIProvider};
pub use provider::{CompletionOptions, LlmError, LlmProvider};
pub use types::{Completion, Message, MessageRole};
