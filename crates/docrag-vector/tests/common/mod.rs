#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use docrag_core::error::{Error, Result};
use docrag_core::traits::EmbedProvider;
use docrag_core::types::{Chunk, ChunkMetadata, DocumentMeta};

/// Counts requests and fails on demand.
#[derive(Default)]
pub struct MockProvider {
    pub calls: AtomicUsize,
    /// Prompts that always fail with a 500.
    pub fail_on: Mutex<Option<String>>,
    /// The next `n` requests fail with a 503 before any real work.
    pub transient: AtomicUsize,
    /// Status used for `fail_on` failures.
    pub fail_status: Mutex<Option<u16>>,
    /// Every request gets an unusable response.
    pub malformed: AtomicBool,
}

impl MockProvider {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn failing_on(prompt: &str) -> Self {
        let p = Self::default();
        *p.fail_on.lock() = Some(prompt.to_string());
        p
    }
}

impl EmbedProvider for MockProvider {
    fn embed(&self, _model: &str, prompt: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.malformed.load(Ordering::SeqCst) {
            return Err(Error::Decode("expected an embedding array".into()));
        }
        if self.transient.load(Ordering::SeqCst) > 0 {
            self.transient.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::ProviderStatus { status: 503, body: "busy".into() });
        }
        if self.fail_on.lock().as_deref() == Some(prompt) {
            let status = self.fail_status.lock().unwrap_or(500);
            return Err(Error::ProviderStatus { status, body: "boom".into() });
        }
        Ok(vec![prompt.len() as f32, 1.0, 0.5])
    }
}

pub fn chunks(texts: &[&str]) -> Vec<Chunk> {
    let meta = DocumentMeta::new("doc.txt");
    texts
        .iter()
        .enumerate()
        .map(|(i, t)| Chunk { text: t.to_string(), metadata: ChunkMetadata::from_document(&meta, i, texts.len()) })
        .collect()
}
