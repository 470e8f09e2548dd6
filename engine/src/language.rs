//! Language detection and translation via constrained LLM prompts.
//!
//! The chat model doubles as detector and translator. Detection is forced
//! into a two-letter reply and parsed leniently ([`Language::parse`] falls
//! back to English on garbage, which degrades to the monolingual path
//! rather than failing the query).

use std::time::Duration;

use sage_providers::{GenerateRequest, OllamaClient, ProviderError};
use sage_types::{GenerationOptions, Language};

fn deterministic_options(num_predict: u32) -> GenerationOptions {
    GenerationOptions {
        temperature: 0.0,
        num_predict,
        ..GenerationOptions::default()
    }
}

/// Detect the language of `text`.
pub async fn detect_language(
    client: &OllamaClient,
    model: &str,
    text: &str,
    timeout: Duration,
) -> Result<Language, ProviderError> {
    let prompt = format!(
        "Identify the language of the text below. Reply with only its \
         two-letter ISO 639-1 code and nothing else.\n\nText:\n{text}"
    );

    let reply = client
        .generate(GenerateRequest {
            model,
            prompt: &prompt,
            system: None,
            options: deterministic_options(8),
            timeout,
        })
        .await?;

    let language = Language::parse(&reply);
    tracing::info!(language = %language, "detected query language");
    Ok(language)
}

/// Translate `text` between two languages, returning only the translation.
pub async fn translate(
    client: &OllamaClient,
    model: &str,
    text: &str,
    source: &Language,
    target: &Language,
    timeout: Duration,
) -> Result<String, ProviderError> {
    let prompt = format!(
        "Translate the text below from {source} to {target}. Reply with \
         only the translated text, no commentary.\n\nText:\n{text}",
        source = source.code(),
        target = target.code(),
    );

    let reply = client
        .generate(GenerateRequest {
            model,
            prompt: &prompt,
            system: None,
            // Translations can be as long as the input; give headroom.
            options: deterministic_options(1024),
            timeout,
        })
        .await?;

    Ok(reply.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::{detect_language, translate};
    use sage_providers::OllamaClient;
    use sage_types::Language;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn detect_parses_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_string_contains("ISO 639-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": " ES\n",
                "done": true,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OllamaClient::with_base_url(server.uri());
        let language = detect_language(
            &client,
            "llama3:8b",
            "¿Qué es una red neuronal?",
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(language.code(), "es");
    }

    #[tokio::test]
    async fn translate_trims_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_string_contains("Translate the text below from es to en"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": "  What is a neural network?\n",
                "done": true,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OllamaClient::with_base_url(server.uri());
        let text = translate(
            &client,
            "llama3:8b",
            "¿Qué es una red neuronal?",
            &Language::parse("es"),
            &Language::english(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(text, "What is a neural network?");
    }
}
