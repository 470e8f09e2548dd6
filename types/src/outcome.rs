//! The result of a full pipeline run.

use serde::{Deserialize, Serialize};

use crate::document::DocumentId;
use crate::language::Language;

/// A document cited in the answer's SOURCES section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitedDocument {
    pub document_id: DocumentId,
    pub title: String,
    pub authors: String,
    pub term: String,
    pub page_hint: Option<u32>,
}

/// Everything the pipeline knows about one answered (or refused) query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub original_question: String,
    pub detected_language: Language,
    /// Present only when the question needed translation.
    pub english_question: Option<String>,
    /// Number of context chunks supplied to the model.
    pub context_count: usize,
    /// Final response, already translated back to the user's language.
    pub response: String,
    pub cited_documents: Vec<CitedDocument>,
    /// True when the query was refused by the safety check.
    pub refused: bool,
}

impl QueryOutcome {
    /// A refusal outcome carrying the (localized) rejection message.
    #[must_use]
    pub fn refusal(question: impl Into<String>, language: Language, message: String) -> Self {
        Self {
            original_question: question.into(),
            detected_language: language,
            english_question: None,
            context_count: 0,
            response: message,
            cited_documents: Vec::new(),
            refused: true,
        }
    }
}
