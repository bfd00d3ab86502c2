use std::sync::Arc;
use tracing::Instrument;

use crate::error::{AssistantError, Result};
use crate::intent::IntentParser;
use crate::models::{ChatResponse, Intent, QueryType, WeatherIntent, WeatherReport};
use crate::prompts::Prompts;
use crate::synth::Synthesizer;
use crate::weather::WeatherSource;

pub const NEEDS_LOCATION_QUERY_TYPE: &str = "needs_location";

/// Sequences one chat turn:
/// intent → (refusal | location prompt | fetch → synthesize) → response.
/// Every step runs after the previous one finishes; nothing is kept between
/// calls.
#[derive(Clone)]
pub struct WeatherAssistant {
    intent: Arc<dyn IntentParser>,
    weather: Arc<dyn WeatherSource>,
    synth: Arc<dyn Synthesizer>,
    prompts: Arc<Prompts>,
}

impl WeatherAssistant {
    pub fn new(
        intent: Arc<dyn IntentParser>,
        weather: Arc<dyn WeatherSource>,
        synth: Arc<dyn Synthesizer>,
        prompts: Arc<Prompts>,
    ) -> Self {
        Self {
            intent,
            weather,
            synth,
            prompts,
        }
    }

    pub async fn handle(&self, message: &str) -> Result<ChatResponse> {
        if message.trim().is_empty() {
            return Err(AssistantError::InvalidRequest(
                "message must not be empty".to_string(),
            ));
        }

        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("chat", %request_id);
        self.run(message).instrument(span).await
    }

    async fn run(&self, message: &str) -> Result<ChatResponse> {
        tracing::info!(state = "received", "Handling chat message");

        let intent = self.intent.parse(message).await?;
        tracing::info!(state = "intent-detected");

        match intent {
            Intent::NotWeather => {
                tracing::info!(state = "non-weather-reply");
                Ok(self.non_weather_reply())
            }
            Intent::NeedsLocation => {
                tracing::info!(state = "needs-location");
                Ok(self.needs_location_reply())
            }
            Intent::Weather(intent) => self.weather_reply(message, intent).await,
        }
    }

    fn non_weather_reply(&self) -> ChatResponse {
        ChatResponse {
            response: self.prompts.non_weather_reply.clone(),
            weather_data: None,
            query_type: None,
            city: None,
            country: None,
            ambiguous: None,
        }
    }

    fn needs_location_reply(&self) -> ChatResponse {
        ChatResponse {
            response: self.prompts.needs_location_reply.clone(),
            weather_data: None,
            query_type: Some(NEEDS_LOCATION_QUERY_TYPE.to_string()),
            city: None,
            country: None,
            ambiguous: None,
        }
    }

    async fn weather_reply(&self, message: &str, intent: WeatherIntent) -> Result<ChatResponse> {
        tracing::info!(state = "weather-fetch", query_type = %intent.query_type);
        let report = self.fetch_report(&intent).await?;

        let text = self
            .synth
            .synthesize(message, &intent.city, &intent.country, &report)
            .await?;
        tracing::info!(state = "synthesized");

        let response = match intent.note() {
            Some(note) => with_ambiguity_note(note, &text),
            None => text,
        };

        tracing::info!(state = "responded", city = %intent.city);
        Ok(ChatResponse {
            response,
            weather_data: Some(report),
            query_type: Some(intent.query_type.to_string()),
            city: Some(intent.city),
            country: Some(intent.country),
            ambiguous: Some(intent.ambiguous),
        })
    }

    /// Forecast queries get the daily series and the current conditions,
    /// fetched one after the other; everything else only current conditions.
    async fn fetch_report(&self, intent: &WeatherIntent) -> Result<WeatherReport> {
        let (lat, lon) = (intent.latitude, intent.longitude);
        match intent.query_type {
            QueryType::Forecast => {
                let days = self
                    .weather
                    .forecast(lat, lon, intent.effective_forecast_days())
                    .await?;
                let current = self.weather.current(lat, lon).await?;
                Ok(WeatherReport {
                    current,
                    days: Some(days),
                })
            }
            QueryType::Current | QueryType::General => Ok(WeatherReport {
                current: self.weather.current(lat, lon).await?,
                days: None,
            }),
        }
    }
}

/// `_Note: …_`, a blank line, then the reply body verbatim.
pub fn with_ambiguity_note(note: &str, body: &str) -> String {
    format!("_Note: {note}_\n\n{body}")
}
