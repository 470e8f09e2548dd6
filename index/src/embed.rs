//! Embedding abstraction.

use anyhow::Result;

/// Produces one embedding vector per input text.
///
/// The chunker and the ingest path are generic over this trait so they can
/// be exercised in tests with a deterministic embedder; production wires in
/// the Ollama embeddings endpoint from `sage-engine`.
pub trait Embedder {
    /// Embed each text. The output length must equal the input length.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl std::future::Future<Output = Result<Vec<Vec<f32>>>> + Send;
}
