//! Answer generation.
//!
//! [`Generator`] is the seam the query session talks to; [`GeminiClient`]
//! implements it against the Gemini `generateContent` REST endpoint
//! authenticated with an API key.
//!
//! No retries happen here. A failed or timed-out call is a
//! [`RagError::Generation`] and the session reports it to the user.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::error::{RagError, Result};

#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce an answer for a fully assembled prompt.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Model identifier, for logs.
    fn model(&self) -> &str;
}

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_output_tokens: u32,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(config: &GenerationConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| RagError::generation(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn request_body(&self, prompt: &str) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: RequestGenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        }
    }

    async fn send(&self, prompt: &str) -> Result<GenerateResponse> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| {
                RagError::generation(format!("Gemini request failed: {}", e.without_url()))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::generation(format!(
                "Gemini returned {}: {}",
                status, body
            )));
        }

        response.json().await.map_err(|e| {
            RagError::generation(format!(
                "Failed to parse Gemini response: {}",
                e.without_url()
            ))
        })
    }
}

#[async_trait]
impl Generator for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let response = tokio::time::timeout(self.timeout, self.send(prompt))
            .await
            .map_err(|_| {
                RagError::generation(format!(
                    "Gemini did not respond within {}s",
                    self.timeout.as_secs()
                ))
            })??;

        answer_text(response)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Pull the answer out of a response, concatenating the first candidate's
/// text parts. A `MAX_TOKENS` finish still yields the partial text.
fn answer_text(response: GenerateResponse) -> Result<String> {
    let GenerateResponse {
        candidates,
        prompt_feedback,
    } = response;
    let candidate = candidates.into_iter().next().ok_or_else(|| {
        let reason = prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates".to_string());
        RagError::generation(format!("Gemini returned no answer ({})", reason))
    })?;

    if candidate.finish_reason.as_deref() == Some("MAX_TOKENS") {
        tracing::warn!("answer truncated at the output token limit");
    }

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(RagError::generation(format!(
            "Gemini returned an empty answer (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }
    Ok(text.trim().to_string())
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: RequestGenerationConfig,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct RequestGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}
