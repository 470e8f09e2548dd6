//! Query moderation through a llama-guard model.

use std::time::Duration;

use sage_providers::{GenerateRequest, OllamaClient, ProviderError};
use sage_types::{GenerationOptions, SafetyVerdict};

/// Sampling for the guard model: deterministic, and a verdict is at most a
/// couple of tokens.
fn guard_options() -> GenerationOptions {
    GenerationOptions {
        temperature: 0.0,
        num_predict: 32,
        ..GenerationOptions::default()
    }
}

/// Ask the guard model whether `question` is safe to process.
///
/// The guard model's chat template does the actual classification framing;
/// the question is passed through as the prompt. Provider failures
/// propagate rather than defaulting to safe.
pub async fn check_query_safety(
    client: &OllamaClient,
    model: &str,
    question: &str,
    timeout: Duration,
) -> Result<SafetyVerdict, ProviderError> {
    let reply = client
        .generate(GenerateRequest {
            model,
            prompt: question,
            system: None,
            options: guard_options(),
            timeout,
        })
        .await?;

    let verdict = SafetyVerdict::parse(&reply);
    if let Some(reason) = verdict.refusal_reason() {
        tracing::warn!(category = reason, "query failed safety check");
    }
    Ok(verdict)
}

#[cfg(test)]
mod tests {
    use super::check_query_safety;
    use sage_providers::OllamaClient;
    use sage_types::SafetyVerdict;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn guard_server(reply: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama-guard3:8b",
                "stream": false,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": reply,
                "done": true,
            })))
            .expect(1)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn safe_reply_passes() {
        let server = guard_server("safe").await;
        let client = OllamaClient::with_base_url(server.uri());

        let verdict = check_query_safety(
            &client,
            "llama-guard3:8b",
            "What is a neural network?",
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert!(verdict.is_safe());
    }

    #[tokio::test]
    async fn unsafe_reply_carries_category() {
        let server = guard_server("unsafe\nS9").await;
        let client = OllamaClient::with_base_url(server.uri());

        let verdict = check_query_safety(
            &client,
            "llama-guard3:8b",
            "something disallowed",
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(
            verdict,
            SafetyVerdict::Unsafe {
                category: "S9".to_string()
            }
        );
    }
}
