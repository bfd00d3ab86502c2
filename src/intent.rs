use async_trait::async_trait;

use crate::error::{AssistantError, Result};
use crate::models::{ChatMessage, Intent, RawIntent};
use crate::transport::{Gateway, truncate_body};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IntentParser: Send + Sync {
    async fn parse(&self, message: &str) -> Result<Intent>;
}

/// Classifies a message and resolves its city with a single JSON-mode
/// completion. Coordinates come from the model alone.
pub struct LlmIntent {
    gateway: Gateway,
    system_prompt: String,
}

impl LlmIntent {
    pub fn new(gateway: Gateway, system_prompt: String) -> Self {
        Self {
            gateway,
            system_prompt,
        }
    }
}

#[async_trait]
impl IntentParser for LlmIntent {
    async fn parse(&self, message: &str) -> Result<Intent> {
        tracing::info!(model = %self.gateway.model(), "Detecting weather intent");

        let messages = vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(message),
        ];
        let reply = self.gateway.complete(messages, true).await?;

        parse_intent_reply(&reply)
    }
}

/// Turn the model's JSON reply into an `Intent`. No repair is attempted.
pub fn parse_intent_reply(reply: &str) -> Result<Intent> {
    let raw: RawIntent = serde_json::from_str(reply.trim()).map_err(|e| {
        AssistantError::MalformedIntent(format!("{e}. Raw: {}", truncate_body(reply)))
    })?;

    let intent = Intent::try_from(raw).map_err(AssistantError::MalformedIntent)?;
    match &intent {
        Intent::NotWeather => tracing::info!("Message is not weather related"),
        Intent::NeedsLocation => tracing::info!("Weather message without a location"),
        Intent::Weather(w) => tracing::info!(
            city = %w.city,
            country = %w.country,
            query_type = %w.query_type,
            ambiguous = w.ambiguous,
            "Weather intent detected"
        ),
    }
    Ok(intent)
}
