//! Gemini-backed content generation over the REST `generateContent`
//! endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{ContentError, ContentGenerator};
use crate::config::ContentConfig;

/// Upstream requests are capped so a hung model call fails the request
/// instead of wedging the handler.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
}

#[derive(Deserialize, Default)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

impl GeminiClient {
    /// Build a client from configuration. Fails when no API key can be
    /// resolved — better to refuse at startup than on the first request.
    pub fn new(config: &ContentConfig) -> Result<Self, ContentError> {
        let api_key = config.resolve_api_key().ok_or(ContentError::MissingApiKey)?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl ContentGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, ContentError> {
        let payload = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }]
        });

        let response = self
            .http
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), %message, "Gemini request failed");
            return Err(ContentError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateContentResponse = response.json().await?;
        body.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .filter(|t| !t.trim().is_empty())
            .ok_or(ContentError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> ContentConfig {
        ContentConfig {
            api_key: Some("test-key".into()),
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    #[test]
    fn missing_api_key_is_rejected_at_construction() {
        let content = ContentConfig {
            api_key: None,
            ..Default::default()
        };
        assert!(matches!(
            GeminiClient::new(&content),
            Err(ContentError::MissingApiKey)
        ));
    }

    #[tokio::test]
    async fn generate_returns_first_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": { "parts": [{ "text": "## Una noche perfecta" }] }
                }]
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&config(&server.uri())).unwrap();
        let text = client.generate("plan my night").await.unwrap();
        assert_eq!(text, "## Una noche perfecta");
    }

    #[tokio::test]
    async fn upstream_error_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&config(&server.uri())).unwrap();
        let err = client.generate("plan").await.unwrap_err();
        assert!(matches!(err, ContentError::Status { status: 429, .. }));
    }

    #[tokio::test]
    async fn empty_candidates_are_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "candidates": [] })),
            )
            .mount(&server)
            .await;

        let client = GeminiClient::new(&config(&server.uri())).unwrap();
        assert!(matches!(
            client.generate("plan").await,
            Err(ContentError::EmptyResponse)
        ));
    }
}
