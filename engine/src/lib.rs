//! Query orchestration for Sage.
//!
//! This crate ties the other library crates together: it owns the config
//! file, wires the Ollama client into the [`sage_index::Embedder`] trait,
//! and runs the full question-to-answer pipeline (safety, language
//! handling, retrieval, reranking, generation, audit).

pub mod config;
pub mod embedder;
pub mod language;
pub mod prompt;
pub mod query;
pub mod rerank;
pub mod safety;

pub use config::Config;
pub use embedder::OllamaEmbedder;
pub use query::QueryEngine;
