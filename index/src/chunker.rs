//! Semantic chunking by embedding-distance breakpoints.
//!
//! Rather than cutting documents at a fixed character count, the chunker
//! splits wherever the semantic distance between neighboring sentences
//! spikes: sentences are embedded (each combined with a small buffer of
//! neighbors for context), cosine distances between consecutive embeddings
//! are computed, and a breakpoint threshold derived from the distance
//! distribution decides where one chunk ends and the next begins.

use anyhow::{Context, Result, ensure};

use crate::embed::Embedder;
use crate::search::cosine_similarity;
use crate::stats;

/// How the breakpoint threshold is derived from the distance distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BreakpointThresholdType {
    /// Split above the Nth percentile of distances.
    #[default]
    Percentile,
    /// Split above mean + N standard deviations.
    StandardDeviation,
    /// Split above mean + N interquartile ranges.
    Interquartile,
    /// Split where the distance *gradient* exceeds its Nth percentile;
    /// favors sustained topic shifts over single outliers.
    Gradient,
}

impl BreakpointThresholdType {
    /// Default threshold amount for each type.
    #[must_use]
    pub const fn default_amount(self) -> f64 {
        match self {
            Self::Percentile | Self::Gradient => 95.0,
            Self::StandardDeviation => 3.0,
            Self::Interquartile => 1.5,
        }
    }
}

/// Configurable semantic chunker.
#[derive(Debug, Clone)]
pub struct SemanticChunker {
    buffer_size: usize,
    threshold_type: BreakpointThresholdType,
    threshold_amount: f64,
    number_of_chunks: Option<usize>,
}

impl Default for SemanticChunker {
    fn default() -> Self {
        Self::new()
    }
}

impl SemanticChunker {
    #[must_use]
    pub fn new() -> Self {
        let threshold_type = BreakpointThresholdType::default();
        Self {
            buffer_size: 1,
            threshold_type,
            threshold_amount: threshold_type.default_amount(),
            number_of_chunks: None,
        }
    }

    /// Number of neighbor sentences combined on each side before embedding.
    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Select a threshold type, resetting the amount to its default.
    #[must_use]
    pub fn with_threshold_type(mut self, threshold_type: BreakpointThresholdType) -> Self {
        self.threshold_type = threshold_type;
        self.threshold_amount = threshold_type.default_amount();
        self
    }

    #[must_use]
    pub fn with_threshold_amount(mut self, amount: f64) -> Self {
        self.threshold_amount = amount;
        self
    }

    /// Target an approximate chunk count instead of a fixed threshold.
    #[must_use]
    pub fn with_number_of_chunks(mut self, count: usize) -> Self {
        self.number_of_chunks = Some(count);
        self
    }

    /// Split `text` into semantically coherent chunks.
    pub async fn split_text<E: Embedder>(&self, text: &str, embedder: &E) -> Result<Vec<String>> {
        let sentences = split_sentences(text);

        // Nothing to measure with a single sentence; a gradient needs at
        // least two distances (three sentences).
        if sentences.len() <= 1 {
            return Ok(sentences);
        }
        if self.threshold_type == BreakpointThresholdType::Gradient && sentences.len() == 2 {
            return Ok(sentences);
        }

        let combined = combine_with_buffer(&sentences, self.buffer_size);
        let embeddings = embedder
            .embed_batch(&combined)
            .await
            .context("Failed to embed sentences for chunking")?;
        ensure!(
            embeddings.len() == combined.len(),
            "embedder returned {} vectors for {} sentences",
            embeddings.len(),
            combined.len()
        );

        let distances = cosine_distances(&embeddings);

        let (threshold, breakpoint_array) = if let Some(count) = self.number_of_chunks {
            (threshold_from_chunk_count(&distances, count), distances)
        } else {
            self.breakpoint_threshold(&distances)
        };

        let mut chunks = Vec::new();
        let mut start = 0;
        for (i, value) in breakpoint_array.iter().enumerate() {
            if *value > threshold {
                chunks.push(sentences[start..=i].join(" "));
                start = i + 1;
            }
        }
        if start < sentences.len() {
            chunks.push(sentences[start..].join(" "));
        }

        tracing::debug!(
            sentences = sentences.len(),
            chunks = chunks.len(),
            threshold,
            "semantic split"
        );

        Ok(chunks)
    }

    fn breakpoint_threshold(&self, distances: &[f64]) -> (f64, Vec<f64>) {
        match self.threshold_type {
            BreakpointThresholdType::Percentile => (
                stats::percentile(distances, self.threshold_amount),
                distances.to_vec(),
            ),
            BreakpointThresholdType::StandardDeviation => (
                stats::mean(distances) + self.threshold_amount * stats::std_dev(distances),
                distances.to_vec(),
            ),
            BreakpointThresholdType::Interquartile => {
                let q1 = stats::percentile(distances, 25.0);
                let q3 = stats::percentile(distances, 75.0);
                let iqr = q3 - q1;
                (
                    stats::mean(distances) + self.threshold_amount * iqr,
                    distances.to_vec(),
                )
            }
            BreakpointThresholdType::Gradient => {
                let g = stats::gradient(distances);
                (stats::percentile(&g, self.threshold_amount), g)
            }
        }
    }
}

/// Derive a percentile from a target chunk count by linear interpolation
/// between (len, 0) and (1, 100), then take that percentile of distances.
fn threshold_from_chunk_count(distances: &[f64], number_of_chunks: usize) -> f64 {
    let x1 = distances.len() as f64;
    let y1 = 0.0;
    let x2: f64 = 1.0;
    let y2 = 100.0;

    let x = (number_of_chunks as f64).clamp(x2.min(x1), x1.max(x2));
    let y = if (x2 - x1).abs() < f64::EPSILON {
        y2
    } else {
        y1 + ((y2 - y1) / (x2 - x1)) * (x - x1)
    };

    stats::percentile(distances, y.clamp(0.0, 100.0))
}

/// Split at `.`, `!`, or `?` followed by whitespace; drop empty pieces.
pub(crate) fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().is_none_or(char::is_ascii_whitespace) {
            let sentence = current.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            current.clear();
            // Consume the separating whitespace run.
            while chars.peek().is_some_and(char::is_ascii_whitespace) {
                chars.next();
            }
        }
    }

    let tail = current.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }

    sentences
}

/// Concatenate each sentence with `buffer_size` neighbors on each side.
fn combine_with_buffer(sentences: &[String], buffer_size: usize) -> Vec<String> {
    sentences
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let start = i.saturating_sub(buffer_size);
            let end = (i + buffer_size + 1).min(sentences.len());
            sentences[start..end].join(" ")
        })
        .collect()
}

fn cosine_distances(embeddings: &[Vec<f32>]) -> Vec<f64> {
    embeddings
        .windows(2)
        .map(|pair| 1.0 - cosine_similarity(&pair[0], &pair[1]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        BreakpointThresholdType, SemanticChunker, combine_with_buffer, split_sentences,
        threshold_from_chunk_count,
    };
    use crate::embed::Embedder;
    use anyhow::Result;

    /// Deterministic embedder: maps each text onto a 2D unit vector whose
    /// angle is picked by topic keyword, so "topic jumps" produce large
    /// cosine distances.
    struct TopicEmbedder;

    impl Embedder for TopicEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let angle: f32 = if t.contains("volcano") {
                        1.4
                    } else if t.contains("gradient") {
                        0.1
                    } else {
                        0.2
                    };
                    vec![angle.cos(), angle.sin()]
                })
                .collect())
        }
    }

    #[test]
    fn split_sentences_basic() {
        let sentences = split_sentences("First one. Second one! Third? Yes.");
        assert_eq!(
            sentences,
            vec!["First one.", "Second one!", "Third?", "Yes."]
        );
    }

    #[test]
    fn split_sentences_ignores_inline_periods() {
        let sentences = split_sentences("Version 2.5 is out. It is stable.");
        assert_eq!(sentences, vec!["Version 2.5 is out.", "It is stable."]);
    }

    #[test]
    fn split_sentences_keeps_unterminated_tail() {
        let sentences = split_sentences("Complete sentence. trailing fragment");
        assert_eq!(sentences, vec!["Complete sentence.", "trailing fragment"]);
    }

    #[test]
    fn split_sentences_empty() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("   \n  ").is_empty());
    }

    #[test]
    fn combine_respects_buffer() {
        let sentences: Vec<String> = ["a.", "b.", "c.", "d."]
            .iter()
            .map(ToString::to_string)
            .collect();

        let combined = combine_with_buffer(&sentences, 1);
        assert_eq!(combined[0], "a. b.");
        assert_eq!(combined[1], "a. b. c.");
        assert_eq!(combined[2], "b. c. d.");
        assert_eq!(combined[3], "c. d.");

        let combined = combine_with_buffer(&sentences, 0);
        assert_eq!(combined, sentences);
    }

    #[test]
    fn chunk_count_threshold_interpolates() {
        let distances = vec![0.1, 0.2, 0.3, 0.4, 0.5];
        // Asking for as many chunks as distances -> percentile 0 -> min
        let t = threshold_from_chunk_count(&distances, 5);
        assert!((t - 0.1).abs() < 1e-9);
        // Asking for one chunk -> percentile 100 -> max
        let t = threshold_from_chunk_count(&distances, 1);
        assert!((t - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn single_sentence_passes_through() {
        let chunker = SemanticChunker::new();
        let chunks = chunker
            .split_text("Just one sentence.", &TopicEmbedder)
            .await
            .unwrap();
        assert_eq!(chunks, vec!["Just one sentence."]);
    }

    #[tokio::test]
    async fn gradient_passes_two_sentences_through() {
        let chunker =
            SemanticChunker::new().with_threshold_type(BreakpointThresholdType::Gradient);
        let chunks = chunker
            .split_text("One here. Two here.", &TopicEmbedder)
            .await
            .unwrap();
        assert_eq!(chunks.len(), 2);
    }

    #[tokio::test]
    async fn splits_at_topic_jump() {
        // Low percentile so the single large distance is always above it.
        let chunker = SemanticChunker::new()
            .with_buffer_size(0)
            .with_threshold_amount(50.0);

        let text = "The gradient points uphill. The gradient step is small. \
                    A volcano erupted today. The volcano spewed ash.";
        let chunks = chunker.split_text(text, &TopicEmbedder).await.unwrap();

        assert!(chunks.len() >= 2, "expected a split, got {chunks:?}");
        assert!(chunks[0].contains("gradient"));
        assert!(chunks.last().unwrap().contains("volcano"));
        // No sentence lost or duplicated.
        let rejoined = chunks.join(" ");
        assert!(rejoined.contains("The gradient points uphill."));
        assert!(rejoined.contains("The volcano spewed ash."));
    }

    #[tokio::test]
    async fn uniform_text_stays_one_chunk() {
        let chunker = SemanticChunker::new().with_buffer_size(0);
        let text = "The gradient points uphill. The gradient step is small. \
                    The gradient vanishes at a minimum. The gradient is a vector.";
        let chunks = chunker.split_text(text, &TopicEmbedder).await.unwrap();

        // All sentences share a topic; the 95th percentile threshold
        // shouldn't split identical distances.
        assert_eq!(chunks.len(), 1);
    }
}
