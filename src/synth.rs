use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ChatMessage, WeatherReport};
use crate::transport::Gateway;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(
        &self,
        message: &str,
        city: &str,
        country: &str,
        report: &WeatherReport,
    ) -> Result<String>;
}

pub struct LlmSynth {
    gateway: Gateway,
    system_prompt: String,
}

impl LlmSynth {
    pub fn new(gateway: Gateway, system_prompt: String) -> Self {
        Self {
            gateway,
            system_prompt,
        }
    }
}

#[async_trait]
impl Synthesizer for LlmSynth {
    async fn synthesize(
        &self,
        message: &str,
        city: &str,
        country: &str,
        report: &WeatherReport,
    ) -> Result<String> {
        tracing::info!(%city, %country, "Synthesizing weather reply");

        let data = serde_json::to_string(report)?;
        let messages = vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(message),
            ChatMessage::user(format!("Live weather data for {city}, {country}: {data}")),
        ];

        self.gateway.complete(messages, false).await
    }
}
