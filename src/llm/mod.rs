//! Text-generation backends.
//!
//! The pipeline depends only on [`CompletionClient`]: one prompt in, one text out. Backends
//! are free to do I/O however they like behind that call.

pub mod cache;
pub mod mock;
pub mod openai;

use crate::error::CompletionError;

pub use cache::CachedCompletion;
pub use mock::MockCompletion;
pub use openai::{OpenAiClient, OpenAiConfig};

/// A stateless, synchronous completion call.
pub trait CompletionClient {
    /// Short identifier used in logs and progress notices.
    fn name(&self) -> &str;

    fn complete(&mut self, prompt: &str) -> Result<String, CompletionError>;
}

impl<C: CompletionClient + ?Sized> CompletionClient for Box<C> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn complete(&mut self, prompt: &str) -> Result<String, CompletionError> {
        (**self).complete(prompt)
    }
}
