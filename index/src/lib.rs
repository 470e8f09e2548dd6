//! Document chunking, storage, and hybrid retrieval.
//!
//! This crate owns everything between raw text and scored context chunks:
//!
//! - [`chunker`] - semantic chunking by embedding-distance breakpoints
//! - [`embed`] - the [`Embedder`] trait the chunker and searchers depend on
//! - [`store`] - SQLite persistence for documents, chunks, and the audit log
//! - [`search`] - vector + BM25 hybrid retrieval over stored chunks
//! - [`reports`] - usage analytics computed from the audit log
//! - [`token_counter`] - approximate token counting for prompt budgets

pub mod chunker;
pub mod embed;
pub mod reports;
pub mod search;
mod stats;
pub mod store;
pub mod token_counter;

pub use chunker::{BreakpointThresholdType, SemanticChunker};
pub use embed::Embedder;
pub use search::{SearchConfig, hybrid_search};
pub use store::{AuditEntry, AuditRecord, ChunkRecord, Store};
pub use token_counter::TokenCounter;
