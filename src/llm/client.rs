/// OpenAI-compatible chat completion client
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{header, Client};
use tracing::debug;

use super::models::*;
use crate::config::LlmConfig;
use crate::error::{AgentError, AgentResult};

/// Single-shot completion: system + user prompt in, reply text out
#[async_trait]
pub trait LlmCompletion: Send + Sync {
    async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> AgentResult<String>;
}

/// Chat completion client for OpenAI-compatible APIs
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    endpoint: url::Url,
    model: String,
}

impl OpenAiClient {
    /// Create a new client from configuration and an API key
    pub fn new(config: &LlmConfig, api_key: &str) -> anyhow::Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", api_key))
                .context("Invalid API key format")?,
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: completions_endpoint(&config.base_url)?,
            model: config.model.clone(),
        })
    }

    /// Model used for completions
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Handle API response, checking for errors
    async fn handle_response(
        &self,
        response: reqwest::Response,
    ) -> AgentResult<ChatCompletionResponse> {
        let status = response.status();

        if status.is_success() {
            response
                .json::<ChatCompletionResponse>()
                .await
                .map_err(|e| AgentError::Llm(format!("failed to parse API response: {}", e)))
        } else {
            let error_text = response.text().await.unwrap_or_default();

            if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(&error_text) {
                return Err(AgentError::Llm(format!(
                    "API error: {} - {}",
                    error_response.error.error_type.unwrap_or_else(|| status.to_string()),
                    error_response.error.message
                )));
            }

            Err(AgentError::Llm(format!(
                "API request failed with status {}: {}",
                status, error_text
            )))
        }
    }
}

#[async_trait]
impl LlmCompletion for OpenAiClient {
    async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> AgentResult<String> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            temperature: 0.0,
            max_tokens,
        };

        debug!("POST {} (model {})", self.endpoint, self.model);

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::Llm(format!("failed to send request: {}", e)))?;

        let completion = self.handle_response(response).await?;
        let content = completion
            .first_content()
            .ok_or_else(|| AgentError::Llm("response contained no choices".to_string()))?;

        debug!("Assistant reply: {}", content);
        Ok(content)
    }
}

/// Resolve `{base_url}/chat/completions`, tolerating a trailing slash
fn completions_endpoint(base_url: &str) -> anyhow::Result<url::Url> {
    let base = if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{}/", base_url)
    };
    url::Url::parse(&base)
        .and_then(|u| u.join("chat/completions"))
        .with_context(|| format!("Invalid LLM base URL: {}", base_url))
}
