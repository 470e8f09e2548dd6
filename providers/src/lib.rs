//! Ollama HTTP client for Sage.
//!
//! # Architecture
//!
//! Everything in the query pipeline that talks to a model goes through
//! [`OllamaClient`]:
//!
//! - [`OllamaClient::generate`] - full (non-streamed) completion via `POST /api/generate`
//! - [`OllamaClient::embed`] - embedding vector via `POST /api/embeddings`
//! - [`retry`] - exponential backoff shared by both calls
//!
//! The crate is transport only. Prompt construction, safety parsing, and
//! reranking live in `sage-engine`; this layer moves bytes and maps HTTP
//! failures into [`ProviderError`].
//!
//! # Timeouts
//!
//! Local models can legitimately take minutes on long prompts, so each call
//! takes an explicit deadline enforced with [`tokio::time::timeout`] around
//! the whole retried request. The connect timeout is short; the overall
//! deadline is the caller's business.

pub mod retry;

use std::sync::OnceLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use sage_types::GenerationOptions;

/// Default Ollama daemon port.
pub const OLLAMA_DEFAULT_PORT: u16 = 11434;

const CONNECT_TIMEOUT_SECS: u64 = 30;
const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_MAX_IDLE_PER_HOST: usize = 4;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request to Ollama failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("request to Ollama failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        source: reqwest::Error,
    },

    #[error("Ollama returned {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Ollama call exceeded {}s deadline", timeout.as_secs())]
    DeadlineExceeded { timeout: Duration },

    #[error("malformed Ollama response: {0}")]
    MalformedResponse(String),
}

/// Shared HTTP client.
///
/// The Ollama daemon is plain HTTP on localhost, so unlike a cloud client
/// there is no TLS-only enforcement here; redirects stay disabled.
fn http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::none())
            .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
            .build()
            .unwrap_or_default()
    })
}

/// Read at most [`MAX_ERROR_BODY_BYTES`] of an error body for diagnostics.
async fn read_capped_error_body(response: reqwest::Response) -> String {
    match response.text().await {
        Ok(mut text) => {
            if text.len() > MAX_ERROR_BODY_BYTES {
                text.truncate(MAX_ERROR_BODY_BYTES);
                text.push_str("...(truncated)");
            }
            text
        }
        Err(_) => String::from("<unreadable body>"),
    }
}

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: GenerationOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingsBody<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

/// A generate request; built by the engine, executed here.
#[derive(Debug, Clone)]
pub struct GenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    /// Optional system prompt, forwarded as Ollama's `system` field.
    pub system: Option<&'a str>,
    pub options: GenerationOptions,
    /// Overall deadline for the call, retries included.
    pub timeout: Duration,
}

/// Client for one Ollama daemon.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    retry: retry::RetryConfig,
}

impl OllamaClient {
    /// Client for `http://{host}:11434`.
    #[must_use]
    pub fn new(host: &str) -> Self {
        Self::with_base_url(format!("http://{host}:{OLLAMA_DEFAULT_PORT}"))
    }

    /// Client for an explicit base URL (used by tests against a mock server).
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            retry: retry::RetryConfig::default(),
        }
    }

    #[must_use]
    pub fn with_retry_config(mut self, retry: retry::RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run a prompt to completion and return the generated text.
    pub async fn generate(&self, request: GenerateRequest<'_>) -> Result<String, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateBody {
            model: request.model,
            prompt: request.prompt,
            system: request.system,
            stream: false,
            options: request.options,
        };

        tracing::debug!(model = request.model, prompt_bytes = request.prompt.len(), "generate");

        let response: GenerateResponse = self
            .post_json(&url, &body, request.timeout)
            .await?;

        Ok(response.response)
    }

    /// Embed a single text and return its vector.
    pub async fn embed(
        &self,
        model: &str,
        text: &str,
        timeout: Duration,
    ) -> Result<Vec<f32>, ProviderError> {
        let url = format!("{}/api/embeddings", self.base_url);
        let body = EmbeddingsBody {
            model,
            prompt: text,
        };

        let response: EmbeddingsResponse = self.post_json(&url, &body, timeout).await?;

        if response.embedding.is_empty() {
            return Err(ProviderError::MalformedResponse(
                "embeddings endpoint returned an empty vector".to_string(),
            ));
        }

        Ok(response.embedding)
    }

    /// POST a JSON body with retry, enforce the deadline, decode the reply.
    async fn post_json<B, T>(
        &self,
        url: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<T, ProviderError>
    where
        B: Serialize,
        T: serde::de::DeserializeOwned,
    {
        let client = http_client();
        let send = retry::send_with_retry(|| client.post(url).json(body), &self.retry);

        let outcome = tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| ProviderError::DeadlineExceeded { timeout })?;

        let response = match outcome {
            retry::RetryOutcome::Success(response) => response,
            retry::RetryOutcome::HttpError(response) => {
                let status = response.status();
                let body = read_capped_error_body(response).await;
                return Err(ProviderError::Api { status, body });
            }
            retry::RetryOutcome::ConnectionError { attempts, source } => {
                return Err(ProviderError::Exhausted { attempts, source });
            }
            retry::RetryOutcome::NonRetryable(source) => {
                return Err(ProviderError::Transport(source));
            }
        };

        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{GenerateRequest, OllamaClient, ProviderError, retry::RetryConfig};
    use sage_types::GenerationOptions;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_client(server: &MockServer) -> OllamaClient {
        OllamaClient::with_base_url(server.uri()).with_retry_config(RetryConfig {
            max_retries: 1,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter_factor: 0.0,
        })
    }

    fn generate_request(model: &'static str) -> GenerateRequest<'static> {
        GenerateRequest {
            model,
            prompt: "What is gradient descent?",
            system: None,
            options: GenerationOptions::default(),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn base_url_strips_trailing_slash() {
        let client = OllamaClient::with_base_url("http://localhost:11434/");
        assert_eq!(client.base_url(), "http://localhost:11434");
    }

    #[tokio::test]
    async fn generate_returns_response_text() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama3:8b",
                "stream": false,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "llama3:8b",
                "response": "An iterative optimization algorithm.",
                "done": true,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = fast_client(&server);
        let text = client.generate(generate_request("llama3:8b")).await.unwrap();

        assert_eq!(text, "An iterative optimization algorithm.");
    }

    #[tokio::test]
    async fn generate_surfaces_api_errors_with_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_string(r#"{"error":"model 'nope' not found"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = fast_client(&server);
        let err = client.generate(generate_request("nope")).await.unwrap_err();

        match err {
            ProviderError::Api { status, body } => {
                assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
                assert!(body.contains("not found"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn generate_retries_on_503() {
        let server = MockServer::start().await;
        let attempt = std::sync::atomic::AtomicU32::new(0);

        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(move |_: &wiremock::Request| {
                if attempt.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                    ResponseTemplate::new(503)
                } else {
                    ResponseTemplate::new(200).set_body_json(serde_json::json!({
                        "response": "ok",
                        "done": true,
                    }))
                }
            })
            .expect(2)
            .mount(&server)
            .await;

        let client = fast_client(&server);
        let text = client.generate(generate_request("llama3:8b")).await.unwrap();
        assert_eq!(text, "ok");
    }

    #[tokio::test]
    async fn generate_enforces_deadline() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(5))
                    .set_body_json(serde_json::json!({"response": "late", "done": true})),
            )
            .mount(&server)
            .await;

        let client = fast_client(&server);
        let mut request = generate_request("llama3:8b");
        request.timeout = Duration::from_millis(50);

        let err = client.generate(request).await.unwrap_err();
        assert!(matches!(err, ProviderError::DeadlineExceeded { .. }));
    }

    #[tokio::test]
    async fn embed_returns_vector() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .and(body_partial_json(serde_json::json!({
                "model": "nomic-embed-text",
                "prompt": "hello",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embedding": [0.1, -0.2, 0.3],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = fast_client(&server);
        let vector = client
            .embed("nomic-embed-text", "hello", Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(vector.len(), 3);
        assert!((vector[0] - 0.1).abs() < 1e-6);
    }

    #[tokio::test]
    async fn embed_rejects_empty_vector() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"embedding": []})),
            )
            .mount(&server)
            .await;

        let client = fast_client(&server);
        let err = client
            .embed("nomic-embed-text", "hello", Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::MalformedResponse(_)));
    }
}
