//! Vertex AI Gemini provider.
//!
//! Calls the regional `generateContent` endpoint with a bearer token from a
//! [`TokenProvider`]. Transient failures are retried per the configured policy.

use super::{FinishReason, GenerationParams, ProviderError, ProviderResponse, TextProvider};
use crate::services::token::TokenProvider;
use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use service_core::retry::{retry_call, RetryConfig};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Vertex provider configuration.
#[derive(Debug, Clone)]
pub struct VertexConfig {
    /// Fully qualified `...:generateContent` URL.
    pub url: String,
    pub model: String,
}

/// Vertex AI text provider.
pub struct VertexTextProvider {
    config: VertexConfig,
    client: Client,
    tokens: Arc<dyn TokenProvider>,
    retry: RetryConfig,
}

impl VertexTextProvider {
    pub fn new(
        config: VertexConfig,
        client: Client,
        tokens: Arc<dyn TokenProvider>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            config,
            client,
            tokens,
            retry,
        }
    }

    fn build_request(prompt: &str, params: &GenerationParams) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: params.json_output.then(|| GenerationConfig {
                response_mime_type: "application/json".to_string(),
            }),
        }
    }

    async fn send(
        &self,
        token: &str,
        request: &GenerateContentRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        let response = self
            .client
            .post(&self.config.url)
            .bearer_auth(token)
            .json(request)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited);
            }

            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let api_response: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        parse_response(api_response)
    }
}

fn parse_response(api_response: GenerateContentResponse) -> Result<ProviderResponse, ProviderError> {
    let candidate = api_response.candidates.first();

    let finish_reason = candidate
        .map(|c| FinishReason::from_api(c.finish_reason.as_deref()))
        .unwrap_or(FinishReason::Complete);

    if finish_reason == FinishReason::ContentFilter {
        return Err(ProviderError::ContentFiltered);
    }

    let text = candidate
        .and_then(|c| c.content.as_ref())
        .and_then(|content| content.parts.first())
        .and_then(|part| part.text.clone());

    let usage = api_response.usage_metadata.unwrap_or_default();

    Ok(ProviderResponse {
        text,
        input_tokens: usage.prompt_token_count.unwrap_or(0),
        output_tokens: usage.candidates_token_count.unwrap_or(0),
        finish_reason,
    })
}

#[async_trait]
impl TextProvider for VertexTextProvider {
    #[instrument(skip(self, prompt, params), fields(model = %self.config.model, prompt_len = prompt.len()))]
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        let token = self.tokens.access_token().await?;
        let request = Self::build_request(prompt, params);

        tracing::debug!("Sending request to Vertex AI");

        let start = Instant::now();
        let result = retry_call(&self.retry, "vertex_generate_content", || {
            self.send(&token, &request)
        })
        .await;

        histogram!(
            "genai_provider_latency_seconds",
            "provider" => "vertex",
            "model" => self.config.model.clone()
        )
        .record(start.elapsed().as_secs_f64());

        match &result {
            Ok(response) => {
                counter!("genai_tokens_total", "model" => self.config.model.clone(), "type" => "input")
                    .increment(response.input_tokens.max(0) as u64);
                counter!("genai_tokens_total", "model" => self.config.model.clone(), "type" => "output")
                    .increment(response.output_tokens.max(0) as u64);
                tracing::debug!(
                    input_tokens = response.input_tokens,
                    output_tokens = response.output_tokens,
                    finish_reason = response.finish_reason.as_str(),
                    "Vertex AI response received"
                );
            }
            Err(e) => {
                counter!("genai_provider_errors_total", "provider" => "vertex", "error_type" => error_type(e))
                    .increment(1);
            }
        }

        result
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

fn error_type(err: &ProviderError) -> &'static str {
    match err {
        ProviderError::NotConfigured(_) => "not_configured",
        ProviderError::Auth(_) => "auth",
        ProviderError::ApiError { .. } => "api",
        ProviderError::RateLimited => "rate_limited",
        ProviderError::ContentFiltered => "content_filtered",
        ProviderError::NetworkError(_) => "network",
        ProviderError::InvalidResponse(_) => "invalid_response",
    }
}

// ============================================================================
// Vertex AI Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<i32>,
    candidates_token_count: Option<i32>,
}
