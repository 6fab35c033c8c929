use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use docrag_core::error::Result;
use docrag_core::traits::{ChatProvider, EmbedProvider};
use docrag_core::types::ChatMessage;

/// Offline stand-in for the model server.
///
/// Embeddings are hashed bag-of-words vectors, L2-normalized, so texts that
/// share words are close under cosine similarity. The model name is ignored.
/// Chat echoes the tail of the last message.
#[derive(Debug, Clone)]
pub struct FakeEmbedder {
    dim: usize,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in text.split_whitespace() {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
            if token.is_empty() {
                continue;
            }
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            v[idx] += 0.5 + ((h >> 32) as u32) as f32 / u32::MAX as f32;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl EmbedProvider for FakeEmbedder {
    fn embed(&self, _model: &str, prompt: &str) -> Result<Vec<f32>> {
        Ok(self.vectorize(prompt))
    }
}

impl ChatProvider for FakeEmbedder {
    fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String> {
        let last = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
        let question = last.rsplit("answer this question:").next().unwrap_or(last).trim();
        Ok(format!("[{model}] {question}"))
    }
}
