use crate::error::Result;
use crate::types::ChatMessage;

/// Computes one embedding per request.
///
/// Implementations must return vectors of the same dimensionality for a given
/// model identifier.
pub trait EmbedProvider: Send + Sync {
    /// Embed a single prompt with `model`.
    fn embed(&self, model: &str, prompt: &str) -> Result<Vec<f32>>;
}

/// Generates text from a non-streamed chat exchange.
pub trait ChatProvider: Send + Sync {
    fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String>;
}

/// Everything a full retrieval + answer pipeline needs from the model server.
pub trait ModelProvider: EmbedProvider + ChatProvider {}

impl<T: EmbedProvider + ChatProvider> ModelProvider for T {}
