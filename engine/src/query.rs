//! The question-to-answer pipeline.

use anyhow::{Context, Result};

use sage_index::store::AuditRecord;
use sage_index::{Store, TokenCounter, hybrid_search};
use sage_providers::{GenerateRequest, OllamaClient};
use sage_types::{
    ChatTurn, CitedDocument, DocumentId, GenerationOptions, Language, QueryOutcome, ScoredChunk,
};

use crate::config::Config;
use crate::embedder::OllamaEmbedder;
use crate::{language, prompt, rerank, safety};

/// How many fused results go to the reranker.
const RERANK_CANDIDATES: usize = 15;
/// How many reranked chunks become prompt context.
const CONTEXT_CHUNKS: usize = 5;
/// How many distinct documents are cited.
const CITED_DOCUMENTS: usize = 3;

/// Owns the Ollama client and runs queries end to end.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    client: OllamaClient,
    config: Config,
    counter: TokenCounter,
}

impl QueryEngine {
    #[must_use]
    pub fn new(config: Config) -> Self {
        let client = OllamaClient::new(&config.ollama.host);
        Self::with_client(config, client)
    }

    /// Build against an explicit client (tests point this at a mock server).
    #[must_use]
    pub fn with_client(config: Config, client: OllamaClient) -> Self {
        Self {
            client,
            config,
            counter: TokenCounter::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Embedder wired to the configured embedding model (shared with ingest).
    #[must_use]
    pub fn embedder(&self) -> OllamaEmbedder {
        OllamaEmbedder::new(
            self.client.clone(),
            self.config.ollama.embedding_model.clone(),
            self.config.ollama.embedding_timeout(),
        )
    }

    /// Answer `question` against the store, with conversational memory.
    ///
    /// Safety check, language handling, retrieval, reranking, generation,
    /// source attribution, and audit logging; any stage failure surfaces
    /// as an error.
    pub async fn answer(
        &self,
        store: &mut Store,
        question: &str,
        history: &[ChatTurn],
    ) -> Result<QueryOutcome> {
        let ollama = &self.config.ollama;

        // Safety check on the original text, whatever its language.
        let verdict = safety::check_query_safety(
            &self.client,
            &ollama.safety_model,
            question,
            ollama.safety_timeout(),
        )
        .await
        .context("Safety check failed")?;
        if let Some(reason) = verdict.refusal_reason() {
            return Ok(QueryOutcome::refusal(
                question,
                Language::english(),
                format!("I cannot process this request: {reason}"),
            ));
        }

        let detected = language::detect_language(
            &self.client,
            &ollama.chat_model,
            question,
            ollama.query_timeout(),
        )
        .await
        .context("Language detection failed")?;

        // Non-English questions run the pipeline in English; the translated
        // text gets its own safety pass since translation can shift meaning.
        let english_question = if detected.is_english() {
            None
        } else {
            let translated = language::translate(
                &self.client,
                &ollama.chat_model,
                question,
                &detected,
                &Language::english(),
                ollama.query_timeout(),
            )
            .await
            .context("Question translation failed")?;

            let verdict = safety::check_query_safety(
                &self.client,
                &ollama.safety_model,
                &translated,
                ollama.safety_timeout(),
            )
            .await
            .context("Safety check of translation failed")?;
            if let Some(reason) = verdict.refusal_reason() {
                let rejection = format!("I cannot process this request: {reason}");
                let localized = language::translate(
                    &self.client,
                    &ollama.chat_model,
                    &rejection,
                    &Language::english(),
                    &detected,
                    ollama.query_timeout(),
                )
                .await
                .unwrap_or(rejection);

                let mut outcome = QueryOutcome::refusal(question, detected, localized);
                outcome.english_question = Some(translated);
                return Ok(outcome);
            }

            Some(translated)
        };
        let working_question = english_question.as_deref().unwrap_or(question);

        let query_embedding = self
            .embedder()
            .embed_one(working_question)
            .await
            .context("Failed to embed question")?;

        let records = store.chunk_records().context("Failed to load index")?;
        let mut fused = hybrid_search(
            &records,
            working_question,
            &query_embedding,
            &self.config.search.search_config(),
        );
        fused.truncate(RERANK_CANDIDATES);

        let reranked = rerank::rerank_chunks(
            &self.client,
            &ollama.reranker_model,
            working_question,
            fused,
            ollama.reranker_timeout(),
        )
        .await
        .context("Reranking failed")?;

        let cited = self.cited_documents(store, &reranked)?;

        let context: Vec<String> = reranked
            .iter()
            .take(CONTEXT_CHUNKS)
            .map(|scored| scored.chunk.text.clone())
            .collect();
        let context_count = context.len();

        let mut system = prompt::SYSTEM_PROMPT.to_string();
        if !detected.is_english() {
            system.push_str(prompt::RESPOND_IN_ENGLISH_NOTE);
        }
        let user_prompt = prompt::build_prompt(
            &context,
            history,
            working_question,
            &self.counter,
            self.config.search.max_input_tokens,
        );

        let mut english_response = self
            .client
            .generate(GenerateRequest {
                model: &ollama.chat_model,
                prompt: &user_prompt,
                system: Some(&system),
                options: GenerationOptions::default(),
                timeout: ollama.query_timeout(),
            })
            .await
            .context("Generation failed")?;

        english_response.push_str(&sources_section(&cited));

        let response = if detected.is_english() {
            english_response.clone()
        } else {
            language::translate(
                &self.client,
                &ollama.chat_model,
                &english_response,
                &Language::english(),
                &detected,
                ollama.query_timeout(),
            )
            .await
            .context("Response translation failed")?
        };

        let cited_ids: Vec<DocumentId> = cited.iter().map(|d| d.document_id).collect();
        store
            .log_audit(&AuditRecord {
                user_label: &self.config.app.user_label,
                query: question,
                // English response goes to the log for consistency across
                // languages.
                response: &english_response,
                document_ids: &cited_ids,
                detected_language: &detected,
                context_count,
            })
            .context("Failed to write audit log")?;

        tracing::info!(
            language = %detected,
            context_count,
            cited = cited_ids.len(),
            "answered query"
        );

        Ok(QueryOutcome {
            original_question: question.to_string(),
            detected_language: detected,
            english_question,
            context_count,
            response,
            cited_documents: cited,
            refused: false,
        })
    }

    /// First `CITED_DOCUMENTS` distinct documents in reranked order, with
    /// metadata and the page hint of the best chunk from each.
    fn cited_documents(
        &self,
        store: &Store,
        reranked: &[ScoredChunk],
    ) -> Result<Vec<CitedDocument>> {
        let mut ids = Vec::new();
        let mut hints = Vec::new();
        for scored in reranked {
            if !ids.contains(&scored.chunk.document_id) {
                ids.push(scored.chunk.document_id);
                hints.push(scored.chunk.page_hint);
                if ids.len() == CITED_DOCUMENTS {
                    break;
                }
            }
        }

        let meta = store
            .document_meta(&ids)
            .context("Failed to load cited document metadata")?;

        Ok(ids
            .into_iter()
            .zip(hints)
            .filter_map(|(id, page_hint)| {
                meta.get(&id).map(|m| CitedDocument {
                    document_id: id,
                    title: m.title.clone(),
                    authors: m.authors.clone(),
                    term: m.term.clone(),
                    page_hint,
                })
            })
            .collect())
    }
}

fn sources_section(cited: &[CitedDocument]) -> String {
    let mut section = String::from("\n\nSOURCES:\n");
    for (i, doc) in cited.iter().enumerate() {
        let authors = if doc.authors.is_empty() {
            "N/A"
        } else {
            doc.authors.as_str()
        };
        let term = if doc.term.is_empty() {
            "N/A"
        } else {
            doc.term.as_str()
        };
        section.push_str(&format!(
            "{}. [Document ID: {}] {} by {} ({})\n",
            i + 1,
            doc.document_id,
            doc.title,
            authors,
            term,
        ));
    }
    section
}
