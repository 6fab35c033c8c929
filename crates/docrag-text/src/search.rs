//! Keyword search over an in-memory chunk list.
//!
//! A chunk's score is the number of whole-word, case-insensitive occurrences
//! of every query term (duplicate terms count again). Chunks that score zero
//! are dropped; the rest are ranked by score with ties kept in corpus order.

use docrag_core::types::{Chunk, SearchResult};
use tracing::debug;

use crate::highlight::{HighlightStyle, Highlighter};
use crate::tokenize::{count_matches, query_terms, term_matchers};

#[derive(Debug, Clone, Default)]
pub struct KeywordSearchEngine {
    highlighter: Highlighter,
}

impl KeywordSearchEngine {
    pub fn new(context_window: usize, snippet_len: usize) -> Self {
        Self { highlighter: Highlighter { style: HighlightStyle::default(), context_window, snippet_len } }
    }

    pub fn with_style(mut self, style: HighlightStyle) -> Self {
        self.highlighter.style = style;
        self
    }

    /// Rank `chunks` for `query` and return at most `top_k` highlighted results.
    pub fn search(&self, query: &str, chunks: &[Chunk], top_k: usize) -> Vec<SearchResult> {
        let terms = query_terms(query);
        if terms.is_empty() || top_k == 0 {
            return Vec::new();
        }
        let matchers = term_matchers(&terms);

        let mut scored: Vec<(usize, &Chunk)> = chunks
            .iter()
            .map(|c| (count_matches(&matchers, &c.text), c))
            .filter(|(score, _)| *score > 0)
            .collect();
        // sort_by is stable: equal scores keep corpus order
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        debug!(terms = ?terms, hits = scored.len(), "keyword search");
        scored.truncate(top_k);

        scored
            .into_iter()
            .map(|(score, chunk)| SearchResult {
                text: self.highlighter.highlight(&chunk.text, &matchers),
                score: score as f32,
                metadata: chunk.metadata.clone(),
            })
            .collect()
    }
}

/// Keyword search with the default highlight settings.
pub fn keyword_search(query: &str, chunks: &[Chunk], top_k: usize) -> Vec<SearchResult> {
    KeywordSearchEngine::default().search(query, chunks, top_k)
}

/// Whole-word score of a single text for `query`.
pub fn score_text(query: &str, text: &str) -> usize {
    count_matches(&term_matchers(&query_terms(query)), text)
}
