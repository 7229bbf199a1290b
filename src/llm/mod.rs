//! Language-generation clients.
//!
//! The agent talks to the generation service through [`TextGenerator`]:
//! - [`OpenAiGenerator`]: OpenAI-compatible chat-completions API over HTTP
//! - [`ScriptedGenerator`]: replays canned responses, for tests and dry runs

pub mod openai;
pub mod scripted;

use crate::error::GenerationError;
use async_trait::async_trait;

pub use openai::OpenAiGenerator;
pub use scripted::ScriptedGenerator;

/// Turns a prompt into generated text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}
