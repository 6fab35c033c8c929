//! docrag-core
//!
//! Data model, configuration and errors shared by the workspace, plus the
//! chunker, the file-backed chunk store and ingestion of extracted text.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod chunker;
pub mod config;
pub mod data_processor;
pub mod error;
pub mod export;
pub mod store;
pub mod traits;
pub mod types;

pub use chunker::{BoundaryPolicy, Chunker};
pub use error::{Error, Result};
pub use store::{ChunkStore, LoadReport};
pub use types::{Chunk, ChunkMetadata, DocumentMeta, SearchMode, SearchResult};
