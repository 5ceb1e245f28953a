use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use smsdesk_agent::llm::LlmClient;
use smsdesk_core::config::LlmConfig;

/// Text generation through the Generative Language `generateContent` API.
pub struct GeminiClient {
    client: Client,
    endpoint: String,
    api_key: SecretString,
}

impl GeminiClient {
    pub fn new(config: &LlmConfig, api_key: SecretString) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build text-generation http client")?;
        let endpoint = format!(
            "{}/models/{}:generateContent",
            config.base_url.trim_end_matches('/'),
            config.model
        );
        Ok(Self { client, endpoint, api_key })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

fn first_candidate_text(response: GenerateResponse) -> Result<String> {
    let text = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().map(|part| part.text).collect::<String>())
        .ok_or_else(|| anyhow!("model returned no candidates"))?;

    let text = text.trim();
    if text.is_empty() {
        bail!("model returned an empty candidate");
    }
    Ok(text.to_string())
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest { contents: [Content { parts: [Part { text: prompt }] }] };
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .context("text-generation request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("text-generation endpoint returned {status}");
        }

        let payload: GenerateResponse =
            response.json().await.context("failed to decode text-generation response")?;
        first_candidate_text(payload)
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use smsdesk_core::config::AppConfig;

    use super::{first_candidate_text, GeminiClient, GenerateResponse};

    fn parse(raw: &str) -> GenerateResponse {
        serde_json::from_str(raw).expect("valid response json")
    }

    #[test]
    fn joins_parts_of_first_candidate() {
        let response = parse(
            r#"{"candidates":[{"content":{"parts":[{"text":" We open at 9."},{"text":" See you! "}],"role":"model"}},
                {"content":{"parts":[{"text":"ignored"}]}}]}"#,
        );

        assert_eq!(first_candidate_text(response).expect("text"), "We open at 9. See you!");
    }

    #[test]
    fn blocked_or_empty_responses_are_errors() {
        assert!(first_candidate_text(parse(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#))
            .is_err());
        assert!(first_candidate_text(parse(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#))
            .is_err());
        assert!(first_candidate_text(parse(r#"{"candidates":[{"content":{"parts":[{"text":"  "}]}}]}"#))
            .is_err());
    }

    #[test]
    fn endpoint_is_built_from_model_and_base_url() {
        let mut config = AppConfig::default().llm;
        config.base_url = "https://llm.example.com/v1beta/".to_string();

        let client = GeminiClient::new(&config, SecretString::from("key".to_string()))
            .expect("client builds");

        assert_eq!(
            client.endpoint(),
            "https://llm.example.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }
}
