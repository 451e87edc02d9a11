use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::TranslateConfig;
use crate::error::{Result, SubtradError};
use super::TranslationProvider;

/// Client for the Google Generative Language `generateContent` endpoint
pub struct GeminiProvider {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl GeminiProvider {
    pub fn new(config: &TranslateConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn request_url(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.endpoint, model)
    }
}

fn request_body(system_instruction: &str, text: &str) -> serde_json::Value {
    serde_json::json!({
        "system_instruction": { "parts": [{ "text": system_instruction }] },
        "contents": [{ "role": "user", "parts": [{ "text": text }] }]
    })
}

/// Concatenated text of the first candidate; empty when the model returned nothing
fn extract_text(body: &str) -> Result<String> {
    let response: GenerateResponse = serde_json::from_str(body)?;
    Ok(response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default())
}

/// Map a failed HTTP exchange to a provider error
fn classify_failure(status: StatusCode, body: &str) -> SubtradError {
    let detail = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => format!("{} {}", envelope.error.status, envelope.error.message),
        Err(_) => body.chars().take(200).collect(),
    };

    if status == StatusCode::TOO_MANY_REQUESTS {
        let error = SubtradError::from_provider_message(format!("429 {}", detail));
        return match error {
            SubtradError::Provider(message) => SubtradError::ProviderRateLimited(message),
            other => other,
        };
    }

    SubtradError::from_provider_message(format!("HTTP {}: {}", status.as_u16(), detail.trim()))
}

#[async_trait]
impl TranslationProvider for GeminiProvider {
    async fn generate(&self, model: &str, api_key: &str, system_instruction: &str, text: &str) -> Result<String> {
        let response = self
            .client
            .post(self.request_url(model))
            .header("x-goog-api-key", api_key)
            .json(&request_body(system_instruction, text))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(classify_failure(status, &body));
        }

        debug!("Gemini {} returned {} bytes", model, body.len());
        extract_text(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_url_and_body() {
        let config = TranslateConfig {
            endpoint: "https://example.test/".to_string(),
            ..TranslateConfig::default()
        };
        let provider = GeminiProvider::new(&config).unwrap();
        assert_eq!(
            provider.request_url("gemini-2.5-flash"),
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );

        let body = request_body("be brief", "Hello");
        assert_eq!(body["system_instruction"]["parts"][0]["text"], "be brief");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Hello");
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"Bonjour\n"},{"text":"Salut"}]}}]}"#;
        assert_eq!(extract_text(body).unwrap(), "Bonjour\nSalut");
    }

    #[test]
    fn test_extract_text_without_candidates_is_empty() {
        assert_eq!(extract_text(r#"{"candidates":[]}"#).unwrap(), "");
        assert_eq!(extract_text(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap(), "");
        assert_eq!(extract_text(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap(), "");
    }

    #[test]
    fn test_classify_failures() {
        let quota = r#"{"error":{"code":429,"message":"You exceeded your current quota","status":"RESOURCE_EXHAUSTED"}}"#;
        assert!(matches!(
            classify_failure(StatusCode::TOO_MANY_REQUESTS, quota),
            SubtradError::ProviderQuotaExceeded(_)
        ));

        assert!(matches!(
            classify_failure(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            SubtradError::ProviderRateLimited(_)
        ));

        let invalid = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        assert!(matches!(
            classify_failure(StatusCode::BAD_REQUEST, invalid),
            SubtradError::Provider(_)
        ));
    }
}
