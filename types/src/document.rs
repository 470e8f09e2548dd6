//! Documents, chunks, and retrieval scores.

use serde::{Deserialize, Serialize};

/// Row id of a document in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub i64);

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Descriptive metadata for an ingested document.
///
/// `content_hash` is the hex SHA-256 of the raw file contents and is used
/// to skip re-ingesting unchanged files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub title: String,
    pub authors: String,
    /// Course/term label, e.g. "Fall 2025".
    pub term: String,
    pub source_path: String,
    pub content_hash: String,
}

impl DocumentMeta {
    #[must_use]
    pub fn new(title: impl Into<String>, source_path: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            authors: String::new(),
            term: String::new(),
            source_path: source_path.into(),
            content_hash: String::new(),
        }
    }

    #[must_use]
    pub fn with_authors(mut self, authors: impl Into<String>) -> Self {
        self.authors = authors.into();
        self
    }

    #[must_use]
    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.term = term.into();
        self
    }

    #[must_use]
    pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = hash.into();
        self
    }
}

/// A contiguous span of document text produced by the semantic chunker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub document_id: DocumentId,
    /// Zero-based position of this chunk within its document.
    pub ordinal: u32,
    /// Best-effort page or section hint carried from ingestion.
    pub page_hint: Option<u32>,
    pub text: String,
}

/// Which searcher produced a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchSource {
    Vector,
    Bm25,
    /// Present in both result lists; score is the fused sum.
    Hybrid,
}

/// A chunk paired with its retrieval score.
///
/// Scores from different searchers are not comparable until fused; see
/// the hybrid search in `sage-index` for the normalization rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f64,
    pub source: SearchSource,
}

#[cfg(test)]
mod tests {
    use super::{DocumentId, DocumentMeta};

    #[test]
    fn document_id_display() {
        assert_eq!(DocumentId(42).to_string(), "42");
    }

    #[test]
    fn meta_builder_sets_fields() {
        let meta = DocumentMeta::new("Lecture 3", "/notes/l3.md")
            .with_authors("R. Mitra")
            .with_term("Spring 2026")
            .with_content_hash("abc123");

        assert_eq!(meta.title, "Lecture 3");
        assert_eq!(meta.authors, "R. Mitra");
        assert_eq!(meta.term, "Spring 2026");
        assert_eq!(meta.content_hash, "abc123");
    }
}
