//! docrag-text
//!
//! Keyword retrieval: query tokenizing, whole-word scoring and highlighted
//! excerpts. Everything runs over chunks already loaded in memory.
pub mod highlight;
pub mod search;
pub mod tokenize;

pub use highlight::{highlight, HighlightStyle, Highlighter};
pub use search::{keyword_search, score_text, KeywordSearchEngine};
pub use tokenize::query_terms;
