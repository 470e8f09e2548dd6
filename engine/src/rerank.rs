//! LLM reranking of retrieved chunks.
//!
//! The fused retrieval order is good but coarse; a second model pass over
//! the top candidates fixes cases where lexical overlap beat actual
//! relevance. The reranker sees numbered passages and replies with an
//! ordering; anything unparseable degrades to the retrieval order instead
//! of failing the query.

use std::time::Duration;

use sage_providers::{GenerateRequest, OllamaClient, ProviderError};
use sage_types::{GenerationOptions, ScoredChunk};

/// Reorder `chunks` by relevance to `question` using the reranker model.
pub async fn rerank_chunks(
    client: &OllamaClient,
    model: &str,
    question: &str,
    chunks: Vec<ScoredChunk>,
    timeout: Duration,
) -> Result<Vec<ScoredChunk>, ProviderError> {
    if chunks.len() <= 1 {
        return Ok(chunks);
    }

    let mut prompt = format!(
        "Rank the passages below by how well they answer the question. \
         Reply with only the passage numbers, most relevant first, \
         separated by commas (for example: 3, 1, 2).\n\nQUESTION:\n{question}\n"
    );
    for (i, scored) in chunks.iter().enumerate() {
        prompt.push_str(&format!("\nPASSAGE {}:\n{}\n", i + 1, scored.chunk.text));
    }

    let reply = client
        .generate(GenerateRequest {
            model,
            prompt: &prompt,
            system: None,
            options: GenerationOptions {
                temperature: 0.0,
                num_predict: 64,
                ..GenerationOptions::default()
            },
            timeout,
        })
        .await?;

    let order = parse_ranking(&reply, chunks.len());
    tracing::debug!(candidates = chunks.len(), ?order, "reranked chunks");

    let mut slots: Vec<Option<ScoredChunk>> = chunks.into_iter().map(Some).collect();
    let mut reordered = Vec::with_capacity(slots.len());
    for i in order {
        if let Some(chunk) = slots[i].take() {
            reordered.push(chunk);
        }
    }
    // Anything the reranker skipped keeps its retrieval order at the tail.
    for slot in &mut slots {
        if let Some(chunk) = slot.take() {
            reordered.push(chunk);
        }
    }

    Ok(reordered)
}

/// Extract a zero-based ordering from the model reply.
///
/// Accepts any separators; out-of-range and repeated numbers are dropped.
fn parse_ranking(reply: &str, len: usize) -> Vec<usize> {
    let mut seen = vec![false; len];
    let mut order = Vec::new();

    let mut current = String::new();
    for c in reply.chars().chain(std::iter::once(' ')) {
        if c.is_ascii_digit() {
            current.push(c);
            continue;
        }
        if !current.is_empty() {
            if let Ok(n) = current.parse::<usize>()
                && (1..=len).contains(&n)
                && !seen[n - 1]
            {
                seen[n - 1] = true;
                order.push(n - 1);
            }
            current.clear();
        }
    }

    order
}
