//! docrag-search
//!
//! Entry point for queries: loads the corpus from the chunk store, picks the
//! keyword or semantic engine, and shapes the outcome. Nothing here returns
//! an error to the caller; failures become [`SearchOutcome::Failed`] or an
//! error string from [`Retriever::answer`].

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use docrag_core::config::{resolve_with_base, Settings};
use docrag_core::error::Result;
use docrag_core::store::ChunkStore;
use docrag_core::traits::ModelProvider;
use docrag_core::types::{ChatMessage, Chunk, SearchMode, SearchResult};
use docrag_embed::default_provider;
use docrag_text::{query_terms, KeywordSearchEngine};
use docrag_vector::{semantic_search, CacheStatus, EmbeddingCache, RegenPolicy};

pub const NO_RESULTS: &str = "No results found.";
pub const NO_CORPUS: &str = "No chunk files found. Please process documents first.";
pub const EMPTY_QUERY: &str = "Please enter a search query.";
pub const NO_RELEVANT_INFO: &str = "No relevant information found.";

/// Shape of a search call, keeping "nothing matched" apart from "nothing to search".
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Results(Vec<SearchResult>),
    NoResults,
    NoCorpus,
    EmptyQuery,
    Failed(String),
}

impl SearchOutcome {
    pub fn results(&self) -> &[SearchResult] {
        match self {
            Self::Results(r) => r,
            _ => &[],
        }
    }

    /// Human-readable sentinel for every non-result outcome.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Results(_) => None,
            Self::NoResults => Some(NO_RESULTS),
            Self::NoCorpus => Some(NO_CORPUS),
            Self::EmptyQuery => Some(EMPTY_QUERY),
            Self::Failed(m) => Some(m.as_str()),
        }
    }
}

impl fmt::Display for SearchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(m) => f.write_str(m),
            None => write!(f, "{} results", self.results().len()),
        }
    }
}

pub struct Retriever {
    store: ChunkStore,
    cache: EmbeddingCache,
    provider: Arc<dyn ModelProvider>,
    keyword: KeywordSearchEngine,
    embed_model: String,
    chat_model: String,
    system_prompt: String,
}

impl Retriever {
    pub fn new(store: ChunkStore, cache: EmbeddingCache, provider: Arc<dyn ModelProvider>, settings: &Settings) -> Self {
        Self {
            store,
            cache,
            provider,
            keyword: KeywordSearchEngine::new(settings.search.context_window, settings.search.snippet_len),
            embed_model: settings.provider.model.clone(),
            chat_model: settings.provider.chat_model().to_string(),
            system_prompt: settings.answer.system_prompt.clone(),
        }
    }

    /// Build from settings, resolving relative data paths against `base`.
    pub fn from_settings(settings: &Settings, base: &Path) -> Result<Self> {
        let store = ChunkStore::open(resolve_with_base(base, &settings.data.chunks_dir))?;
        let cache = EmbeddingCache::open(resolve_with_base(base, &settings.data.cache_dir))?
            .with_policy(RegenPolicy::from(&settings.provider))
            .verify_fingerprint(settings.cache.verify_fingerprint);
        let provider = default_provider(&settings.provider)?;
        Ok(Self::new(store, cache, provider, settings))
    }

    pub fn with_keyword_engine(mut self, engine: KeywordSearchEngine) -> Self {
        self.keyword = engine;
        self
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    pub fn provider(&self) -> &dyn ModelProvider {
        self.provider.as_ref()
    }

    pub fn embed_model(&self) -> &str {
        &self.embed_model
    }

    /// Every readable chunk in the store; unreadable files are logged and skipped.
    pub fn load_corpus(&self) -> Result<Vec<Chunk>> {
        let report = self.store.load_all()?;
        for failure in &report.failures {
            warn!(path = %failure.path.display(), reason = %failure.reason, "chunk file skipped");
        }
        Ok(report.chunks)
    }

    pub fn search(&self, query: &str, mode: SearchMode, top_k: usize) -> SearchOutcome {
        let query = query.trim();
        if query.is_empty() || (mode == SearchMode::Keyword && query_terms(query).is_empty()) {
            return SearchOutcome::EmptyQuery;
        }
        let chunks = match self.load_corpus() {
            Ok(c) if c.is_empty() => return SearchOutcome::NoCorpus,
            Ok(c) => c,
            Err(e) => {
                error!(error = %e, "could not load the corpus");
                return SearchOutcome::Failed(format!("Error loading chunks: {e}"));
            }
        };

        let results = match mode {
            SearchMode::Keyword => self.keyword.search(query, &chunks, top_k),
            SearchMode::Semantic => match self.semantic(query, &chunks, top_k) {
                Ok(r) => r,
                Err(e) => {
                    error!(error = %e, "semantic search failed");
                    return SearchOutcome::Failed(format!("Error in semantic search: {e}"));
                }
            },
        };
        info!(%mode, hits = results.len(), "search finished");
        if results.is_empty() {
            SearchOutcome::NoResults
        } else {
            SearchOutcome::Results(results)
        }
    }

    fn semantic(&self, query: &str, chunks: &[Chunk], top_k: usize) -> Result<Vec<SearchResult>> {
        let vectors = self.cache.get_embeddings(chunks, &self.embed_model, self.provider.as_ref())?;
        semantic_search(query, chunks, &vectors, &self.embed_model, top_k, self.provider.as_ref())
    }

    /// Retrieve semantically and ask the chat model to answer from the hits.
    ///
    /// Always returns text: the answer, [`NO_RELEVANT_INFO`], or an
    /// `"Error generating response: ..."` message.
    pub fn answer(&self, query: &str, top_k: usize) -> String {
        let results = match self.search(query, SearchMode::Semantic, top_k) {
            SearchOutcome::Results(r) => r,
            SearchOutcome::Failed(m) => return format!("Error generating response: {m}"),
            _ => return NO_RELEVANT_INFO.to_string(),
        };
        let messages = answer_messages(&self.system_prompt, query, &results);
        match self.provider.chat(&self.chat_model, &messages) {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "chat request failed");
                format!("Error generating response: {e}")
            }
        }
    }

    /// Make sure the embedding cache covers the whole corpus. Returns the vector count.
    pub fn embed_corpus(&self) -> Result<usize> {
        let chunks = self.load_corpus()?;
        let vectors = self.cache.get_embeddings(&chunks, &self.embed_model, self.provider.as_ref())?;
        Ok(vectors.len())
    }

    pub fn cache_status(&self) -> Result<CacheStatus> {
        let chunks = self.load_corpus()?;
        Ok(self.cache.status(&chunks, &self.embed_model))
    }
}

/// System prompt plus one user message holding the retrieved context and the question.
pub fn answer_messages(system_prompt: &str, query: &str, results: &[SearchResult]) -> Vec<ChatMessage> {
    let context: String = results
        .iter()
        .map(|r| format!("Document: {}\nText: {}\n\n", r.metadata.source, r.text))
        .collect();
    vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user(format!(
            "Context information:\n\n{context}\n\nBased on the above documentation, answer this question: {query}"
        )),
    ]
}
