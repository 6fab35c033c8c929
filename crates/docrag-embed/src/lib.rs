//! docrag-embed
//!
//! Model providers: the HTTP client for the local model server and a
//! deterministic offline embedder for tests and demos.
use std::sync::Arc;
use tracing::info;

use docrag_core::config::ProviderSettings;
use docrag_core::error::Result;
use docrag_core::traits::ModelProvider;

pub mod fake;
pub mod ollama;

pub use fake::FakeEmbedder;
pub use ollama::OllamaClient;

/// Whether `APP_USE_FAKE_EMBEDDINGS` asks for the offline provider.
pub fn fake_requested_by_env() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// The provider selected by `settings`, or the fake one when requested.
pub fn default_provider(settings: &ProviderSettings) -> Result<Arc<dyn ModelProvider>> {
    if settings.use_fake || fake_requested_by_env() {
        info!(dim = settings.fake_dim, "using fake embedder");
        return Ok(Arc::new(FakeEmbedder::new(settings.fake_dim)));
    }
    info!(base_url = %settings.base_url, model = %settings.model, "using model server");
    Ok(Arc::new(OllamaClient::from_settings(settings)?))
}
