//! Project indexing and semantic retrieval.
//!
//! This crate provides:
//! - Eligibility filtering (ignore-rule union, extension and directory
//!   allowlists)
//! - Fixed-window chunking for code, header-delimited chunking for
//!   docs and skills
//! - Vector storage in Qdrant, one collection per content domain,
//!   wholly rebuilt on each index run
//! - Multi-collection similarity search with distance-ordered merging
//!
//! The engine exposes exactly three operations to its collaborators:
//! [`RetrievalEngine::index`], [`RetrievalEngine::search`] and
//! [`RetrievalEngine::stats`].

pub mod chunker;
pub mod config;
pub mod domain;
pub mod embeddings;
pub mod engine;
pub mod filter;
pub mod indexer;
pub mod search;
pub mod store;

// Re-exports
pub use chunker::{Chunk, ChunkMetadata, MAX_FILE_CHARS, OVERLAP_LINES, WINDOW_LINES};
pub use config::EngineConfig;
pub use domain::Domain;
pub use embeddings::{EmbeddingProvider, HttpEmbeddings};
pub use engine::{EngineError, RetrievalEngine};
pub use filter::FileFilter;
pub use indexer::{DomainBatch, IndexStats};
pub use search::{merge_hits, SearchOptions, DEFAULT_SEARCH_LIMIT};
pub use store::{CollectionStore, SearchResult, UPSERT_BATCH_SIZE};

/// Default Qdrant server URL
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

/// Default embedding dimensions (text-embedding-3-small)
pub const DEFAULT_DIMENSIONS: usize = 1536;
