use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AssistantError, Result};
use crate::models::{ChatMessage, CompletionRequest, CompletionResponse};

/// Raw chat-completion call against the hosted model.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn chat(&self, req: &CompletionRequest) -> Result<CompletionResponse>;
}

/// OpenAI-compatible chat-completions endpoint. One attempt per call; a
/// provider error or timeout is returned to the caller as is.
pub struct OpenAiTransport {
    client: Client,
    api_url: String,
    api_key: String,
}

impl OpenAiTransport {
    pub fn new(api_url: String, api_key: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url,
            api_key,
        })
    }
}

#[async_trait]
impl Transport for OpenAiTransport {
    async fn chat(&self, req: &CompletionRequest) -> Result<CompletionResponse> {
        tracing::debug!(
            model = %req.model,
            messages = req.messages.len(),
            "Sending chat completion"
        );

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(req)
            .send()
            .await
            .map_err(|e| {
                AssistantError::Llm(format!("Failed to send request to language model: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AssistantError::Llm(format!(
                "Language model request failed with status {status}: {}",
                truncate_body(&body)
            )));
        }

        response.json().await.map_err(|e| {
            AssistantError::Llm(format!("Failed to parse language model response: {e}"))
        })
    }
}

/// The gateway used by the intent extractor and the synthesizer: fixed
/// model, role-tagged messages in, reply text out.
#[derive(Clone)]
pub struct Gateway {
    tx: Arc<dyn Transport>,
    model: String,
    temperature: Option<f32>,
}

impl Gateway {
    pub fn new(tx: Arc<dyn Transport>, model: String) -> Self {
        Self {
            tx,
            model,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send `messages` and return the first choice's text verbatim. With
    /// `json_mode` the provider is asked for a syntactically valid JSON
    /// object.
    pub async fn complete(&self, messages: Vec<ChatMessage>, json_mode: bool) -> Result<String> {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            response_format: json_mode.then(|| serde_json::json!({"type": "json_object"})),
        };

        let response = self.tx.chat(&request).await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| AssistantError::Llm("Language model returned empty choices".to_string()))
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
