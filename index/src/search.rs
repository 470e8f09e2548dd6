//! Hybrid retrieval: dense vector similarity fused with BM25.
//!
//! Both searchers run over the full chunk list in memory (corpora here are
//! course-sized, thousands of chunks at most). Each produces a top-k list;
//! scores are max-normalized per list and combined as a weighted sum so the
//! two scales become comparable before fusion.

use std::collections::HashMap;

use sage_types::{ScoredChunk, SearchSource};

use crate::store::ChunkRecord;

/// Retrieval tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct SearchConfig {
    /// How many chunks the vector searcher keeps.
    pub vector_k: usize,
    /// How many chunks the BM25 searcher keeps.
    pub bm25_k: usize,
    /// Cosine similarity below this is treated as noise and dropped.
    pub similarity_threshold: f64,
    /// Weight of the vector score in fusion; BM25 gets the remainder.
    pub vector_weight: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            vector_k: 10,
            bm25_k: 10,
            similarity_threshold: 0.3,
            vector_weight: 0.7,
        }
    }
}

/// Cosine similarity between two vectors, 0.0 if either has zero norm or
/// the lengths differ.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Lowercased alphanumeric terms, everything else treated as a separator.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Okapi BM25 over a fixed corpus of tokenized chunks.
struct Bm25Index {
    /// Term frequencies per document.
    term_freqs: Vec<HashMap<String, usize>>,
    doc_lens: Vec<f64>,
    avg_doc_len: f64,
    /// Number of documents containing each term.
    doc_freqs: HashMap<String, usize>,
}

impl Bm25Index {
    const K1: f64 = 1.5;
    const B: f64 = 0.75;

    fn build(texts: &[&str]) -> Self {
        let mut term_freqs = Vec::with_capacity(texts.len());
        let mut doc_lens = Vec::with_capacity(texts.len());
        let mut doc_freqs: HashMap<String, usize> = HashMap::new();

        for text in texts {
            let tokens = tokenize(text);
            doc_lens.push(tokens.len() as f64);

            let mut freqs: HashMap<String, usize> = HashMap::new();
            for token in tokens {
                *freqs.entry(token).or_insert(0) += 1;
            }
            for term in freqs.keys() {
                *doc_freqs.entry(term.clone()).or_insert(0) += 1;
            }
            term_freqs.push(freqs);
        }

        let avg_doc_len = if doc_lens.is_empty() {
            0.0
        } else {
            doc_lens.iter().sum::<f64>() / doc_lens.len() as f64
        };

        Self {
            term_freqs,
            doc_lens,
            avg_doc_len,
            doc_freqs,
        }
    }

    fn idf(&self, term: &str) -> f64 {
        let n = self.term_freqs.len() as f64;
        let df = self.doc_freqs.get(term).copied().unwrap_or(0) as f64;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    fn score(&self, query_terms: &[String], doc: usize) -> f64 {
        if self.avg_doc_len == 0.0 {
            return 0.0;
        }

        let freqs = &self.term_freqs[doc];
        let len_norm = 1.0 - Self::B + Self::B * self.doc_lens[doc] / self.avg_doc_len;

        query_terms
            .iter()
            .map(|term| {
                let tf = freqs.get(term).copied().unwrap_or(0) as f64;
                if tf == 0.0 {
                    return 0.0;
                }
                self.idf(term) * tf * (Self::K1 + 1.0) / (tf + Self::K1 * len_norm)
            })
            .sum()
    }
}

/// Top-k `(index, score)` pairs with positive scores, descending.
fn top_k(mut scored: Vec<(usize, f64)>, k: usize) -> Vec<(usize, f64)> {
    scored.retain(|(_, s)| *s > 0.0);
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    scored.truncate(k);
    scored
}

/// Divide every score by the list's maximum so both lists land in [0, 1].
fn max_normalize(scored: &mut [(usize, f64)]) {
    let max = scored
        .iter()
        .map(|(_, s)| *s)
        .fold(0.0_f64, f64::max);
    if max > 0.0 {
        for (_, s) in scored.iter_mut() {
            *s /= max;
        }
    }
}

/// Search `records` with both retrievers and fuse the results.
///
/// Returns fused chunks sorted by score descending. Each result is tagged
/// with the searcher(s) that found it; fused score is
/// `vector_weight * vector + (1 - vector_weight) * bm25` over the
/// normalized per-list scores.
#[must_use]
pub fn hybrid_search(
    records: &[ChunkRecord],
    query_text: &str,
    query_embedding: &[f32],
    config: &SearchConfig,
) -> Vec<ScoredChunk> {
    if records.is_empty() {
        return Vec::new();
    }

    let vector_scored: Vec<(usize, f64)> = records
        .iter()
        .enumerate()
        .map(|(i, r)| (i, cosine_similarity(query_embedding, &r.embedding)))
        .filter(|(_, s)| *s >= config.similarity_threshold)
        .collect();
    let mut vector_hits = top_k(vector_scored, config.vector_k);
    max_normalize(&mut vector_hits);

    let texts: Vec<&str> = records.iter().map(|r| r.chunk.text.as_str()).collect();
    let bm25 = Bm25Index::build(&texts);
    let query_terms = tokenize(query_text);
    let bm25_scored: Vec<(usize, f64)> = (0..records.len())
        .map(|i| (i, bm25.score(&query_terms, i)))
        .collect();
    let mut bm25_hits = top_k(bm25_scored, config.bm25_k);
    max_normalize(&mut bm25_hits);

    let bm25_weight = 1.0 - config.vector_weight;
    let mut fused: HashMap<usize, (f64, SearchSource)> = HashMap::new();
    for (i, s) in &vector_hits {
        fused.insert(*i, (config.vector_weight * s, SearchSource::Vector));
    }
    for (i, s) in &bm25_hits {
        fused
            .entry(*i)
            .and_modify(|(score, source)| {
                *score += bm25_weight * s;
                *source = SearchSource::Hybrid;
            })
            .or_insert((bm25_weight * s, SearchSource::Bm25));
    }

    let mut results: Vec<(usize, f64, SearchSource)> = fused
        .into_iter()
        .map(|(i, (score, source))| (i, score, source))
        .collect();
    results.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    tracing::debug!(
        vector = vector_hits.len(),
        bm25 = bm25_hits.len(),
        fused = results.len(),
        "hybrid search"
    );

    results
        .into_iter()
        .map(|(i, score, source)| ScoredChunk {
            chunk: records[i].chunk.clone(),
            score,
            source,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{Bm25Index, SearchConfig, cosine_similarity, hybrid_search, tokenize};
    use crate::store::ChunkRecord;
    use sage_types::{Chunk, DocumentId, SearchSource};

    fn record(id: i64, ordinal: u32, text: &str, embedding: Vec<f32>) -> ChunkRecord {
        ChunkRecord {
            chunk_id: id * 100 + i64::from(ordinal),
            chunk: Chunk {
                document_id: DocumentId(id),
                ordinal,
                page_hint: None,
                text: text.to_string(),
            },
            embedding,
        }
    }

    #[test]
    fn cosine_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn tokenize_lowercases_and_splits() {
        assert_eq!(
            tokenize("Hello, World! x2"),
            vec!["hello", "world", "x2"]
        );
        assert!(tokenize("  ... ").is_empty());
    }

    #[test]
    fn bm25_prefers_matching_terms() {
        let index = Bm25Index::build(&[
            "the cat sat on the mat",
            "dogs chase cats in the yard",
            "quantum field theory lecture notes",
        ]);
        let query = tokenize("cat mat");

        let s0 = index.score(&query, 0);
        let s1 = index.score(&query, 1);
        let s2 = index.score(&query, 2);
        assert!(s0 > s1, "exact match should beat partial: {s0} vs {s1}");
        assert!(s1 >= s2, "no match should score lowest: {s1} vs {s2}");
        assert_eq!(s2, 0.0);
    }

    #[test]
    fn bm25_rare_terms_weigh_more() {
        let index = Bm25Index::build(&[
            "common word soliton",
            "common word here",
            "common word there",
        ]);
        let rare = index.score(&tokenize("soliton"), 0);
        let frequent = index.score(&tokenize("common"), 0);
        assert!(rare > frequent);
    }

    #[test]
    fn hybrid_fuses_both_searchers() {
        let records = vec![
            // Strong vector match, weak text match.
            record(1, 0, "unrelated wording entirely", vec![1.0, 0.0]),
            // Strong text match, weak vector match.
            record(2, 0, "gradient descent minimizes loss", vec![0.0, 1.0]),
            // Matches both.
            record(3, 0, "gradient descent converges", vec![0.9, 0.1]),
        ];

        let results = hybrid_search(
            &records,
            "gradient descent",
            &[1.0, 0.0],
            &SearchConfig::default(),
        );

        assert_eq!(results.len(), 3);
        let hybrid = results
            .iter()
            .find(|r| r.chunk.document_id == DocumentId(3))
            .unwrap();
        assert_eq!(hybrid.source, SearchSource::Hybrid);

        let vector_only = results
            .iter()
            .find(|r| r.chunk.document_id == DocumentId(1))
            .unwrap();
        assert_eq!(vector_only.source, SearchSource::Vector);

        // Hybrid hit tops the list: near-max on both normalized scales.
        assert_eq!(results[0].chunk.document_id, DocumentId(3));
    }

    #[test]
    fn similarity_threshold_drops_weak_vector_hits() {
        let records = vec![
            record(1, 0, "alpha", vec![1.0, 0.0]),
            record(2, 0, "beta", vec![0.1, 0.99]),
        ];
        let config = SearchConfig {
            similarity_threshold: 0.5,
            ..SearchConfig::default()
        };

        let results = hybrid_search(&records, "nomatch", &[1.0, 0.0], &config);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.document_id, DocumentId(1));
        assert_eq!(results[0].source, SearchSource::Vector);
    }

    #[test]
    fn top_k_limits_apply() {
        let records: Vec<ChunkRecord> = (0..20)
            .map(|i| {
                record(
                    i,
                    0,
                    "shared topic words",
                    vec![1.0, 0.01 * i as f32],
                )
            })
            .collect();
        let config = SearchConfig {
            vector_k: 3,
            bm25_k: 3,
            ..SearchConfig::default()
        };

        let results = hybrid_search(&records, "shared topic", &[1.0, 0.0], &config);
        // At most vector_k + bm25_k distinct chunks can appear.
        assert!(results.len() <= 6);
    }

    #[test]
    fn empty_corpus_yields_nothing() {
        assert!(hybrid_search(&[], "query", &[1.0], &SearchConfig::default()).is_empty());
    }

    #[test]
    fn results_sorted_descending() {
        let records = vec![
            record(1, 0, "gradient descent", vec![0.8, 0.6]),
            record(2, 0, "gradient descent gradient descent", vec![1.0, 0.0]),
        ];
        let results = hybrid_search(
            &records,
            "gradient descent",
            &[1.0, 0.0],
            &SearchConfig::default(),
        );
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }
}
