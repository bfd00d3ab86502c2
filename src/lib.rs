pub mod assistant;
pub mod cache;
pub mod config;
pub mod error;
pub mod intent;
pub mod models;
pub mod prompts;
pub mod retry;
pub mod server;
pub mod synth;
pub mod transport;
pub mod weather;
pub mod wmo;

use std::sync::Arc;

use crate::assistant::WeatherAssistant;
use crate::config::Config;
use crate::error::Result;
use crate::intent::LlmIntent;
use crate::prompts::Prompts;
use crate::synth::LlmSynth;
use crate::transport::{Gateway, OpenAiTransport, Transport};
use crate::weather::OpenMeteoClient;

/// Wire the production pipeline from configuration.
pub async fn build_assistant(cfg: &Config) -> Result<WeatherAssistant> {
    let api_key = cfg.require_api_key()?.to_string();
    let prompts = Arc::new(Prompts::load(cfg.prompts.dir.as_deref())?);
    tracing::info!(
        version = %prompts.version,
        model = %cfg.llm.model,
        "Building weather assistant"
    );

    let transport: Arc<dyn Transport> = Arc::new(OpenAiTransport::new(
        cfg.llm.api_url.clone(),
        api_key,
        cfg.llm_timeout(),
    )?);
    let gateway =
        Gateway::new(transport, cfg.llm.model.clone()).with_temperature(cfg.llm.temperature);

    let cache = cache::from_config(&cfg.weather.cache).await;
    let weather = OpenMeteoClient::from_config(&cfg.weather, cache)?;

    Ok(WeatherAssistant::new(
        Arc::new(LlmIntent::new(gateway.clone(), prompts.intent_system.clone())),
        Arc::new(weather),
        Arc::new(LlmSynth::new(gateway, prompts.synth_system.clone())),
        prompts,
    ))
}

/// Log to stderr; `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();
}
