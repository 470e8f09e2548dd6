//! Core domain types for Sage.
//!
//! This crate is deliberately free of IO and async: everything here is a
//! plain value type shared by the provider, index, and engine crates.
//!
//! - [`document`] - documents, chunks, and retrieval scores
//! - [`chat`] - conversation turns
//! - [`language`] - ISO 639-1 language codes
//! - [`safety`] - llama-guard verdicts
//! - [`generation`] - sampling options sent to Ollama
//! - [`outcome`] - the result of a full pipeline run

pub mod chat;
pub mod document;
pub mod generation;
pub mod language;
pub mod outcome;
pub mod safety;

pub use chat::{ChatRole, ChatTurn};
pub use document::{Chunk, DocumentId, DocumentMeta, ScoredChunk, SearchSource};
pub use generation::GenerationOptions;
pub use language::Language;
pub use outcome::{CitedDocument, QueryOutcome};
pub use safety::SafetyVerdict;
