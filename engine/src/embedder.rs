//! Ollama-backed implementation of the [`Embedder`] trait.

use std::time::Duration;

use anyhow::{Context, Result};

use sage_index::Embedder;
use sage_providers::OllamaClient;

/// Embeds texts through the Ollama embeddings endpoint, one call per text
/// (the endpoint takes a single prompt).
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
    timeout: Duration,
}

impl OllamaEmbedder {
    #[must_use]
    pub fn new(client: OllamaClient, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            model: model.into(),
            timeout,
        }
    }

    /// Embed one text (used for queries, where there is only ever one).
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.client
            .embed(&self.model, text, self.timeout)
            .await
            .context("Failed to embed text")
    }
}

impl Embedder for OllamaEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed_one(text).await?);
        }
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::OllamaEmbedder;
    use sage_index::Embedder;
    use sage_providers::OllamaClient;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn embed_batch_issues_one_call_per_text() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embedding": [0.5, 0.5],
            })))
            .expect(3)
            .mount(&server)
            .await;

        let embedder = OllamaEmbedder::new(
            OllamaClient::with_base_url(server.uri()),
            "nomic-embed-text",
            Duration::from_secs(5),
        );

        let texts: Vec<String> = ["a", "b", "c"].iter().map(ToString::to_string).collect();
        let vectors = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[0], vec![0.5, 0.5]);
    }
}
