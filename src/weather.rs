//! Open-Meteo client: current conditions and daily forecasts.
//!
//! Variables are requested from ordered constant lists and read back through
//! the same lists by index, so the request and the response can never
//! disagree on which value is which.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::RetryIf;

use crate::cache::{ResponseCache, request_key};
use crate::config::WeatherConfig;
use crate::error::{AssistantError, Result};
use crate::models::{CurrentConditions, DailyForecast, MAX_FORECAST_DAYS};
use crate::retry::{RetryPolicy, is_transient_error, is_transient_status};
use crate::transport::truncate_body;
use crate::wmo;

pub const CURRENT_VARIABLES: [&str; 8] = [
    "temperature_2m",
    "apparent_temperature",
    "relative_humidity_2m",
    "precipitation",
    "weather_code",
    "wind_speed_10m",
    "wind_direction_10m",
    "uv_index",
];

mod current {
    pub const TEMPERATURE: usize = 0;
    pub const APPARENT_TEMPERATURE: usize = 1;
    pub const HUMIDITY: usize = 2;
    pub const PRECIPITATION: usize = 3;
    pub const WEATHER_CODE: usize = 4;
    pub const WIND_SPEED: usize = 5;
    pub const WIND_DIRECTION: usize = 6;
    pub const UV_INDEX: usize = 7;
}

pub const DAILY_VARIABLES: [&str; 6] = [
    "weather_code",
    "temperature_2m_max",
    "temperature_2m_min",
    "precipitation_sum",
    "precipitation_probability_max",
    "wind_speed_10m_max",
];

mod daily {
    pub const WEATHER_CODE: usize = 0;
    pub const TEMPERATURE_MAX: usize = 1;
    pub const TEMPERATURE_MIN: usize = 2;
    pub const PRECIPITATION_SUM: usize = 3;
    pub const RAIN_PROBABILITY: usize = 4;
    pub const WIND_SPEED_MAX: usize = 5;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn current(&self, latitude: f64, longitude: f64) -> Result<CurrentConditions>;

    /// `days` daily entries, index 0 being today in the location's timezone.
    async fn forecast(&self, latitude: f64, longitude: f64, days: u8)
    -> Result<Vec<DailyForecast>>;
}

#[derive(Debug, Deserialize)]
struct OmResponse {
    latitude: f64,
    longitude: f64,
    timezone: Option<String>,
    current: Option<HashMap<String, Value>>,
    daily: Option<HashMap<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct OmError {
    reason: String,
}

/// Values of one response block, addressed by position in a variable list.
struct VariableBlock<'a> {
    names: &'a [&'a str],
    values: &'a HashMap<String, Value>,
}

impl VariableBlock<'_> {
    fn name(&self, idx: usize) -> &str {
        self.names[idx]
    }

    fn scalar(&self, idx: usize) -> Result<f64> {
        let name = self.name(idx);
        self.values
            .get(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| {
                AssistantError::WeatherProvider(format!("response is missing current \"{name}\""))
            })
    }

    fn series(&self, idx: usize, len: usize) -> Result<Vec<f64>> {
        let name = self.name(idx);
        let values = self
            .values
            .get(name)
            .and_then(Value::as_array)
            .ok_or_else(|| {
                AssistantError::WeatherProvider(format!("response is missing daily \"{name}\""))
            })?;

        if values.len() < len {
            return Err(AssistantError::WeatherProvider(format!(
                "daily \"{name}\" has {} values, expected {len}",
                values.len()
            )));
        }

        values[..len]
            .iter()
            .enumerate()
            .map(|(day, v)| {
                v.as_f64().ok_or_else(|| {
                    AssistantError::WeatherProvider(format!(
                        "daily \"{name}\" has no value for day {day}"
                    ))
                })
            })
            .collect()
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Why a single attempt failed, and whether another one may help.
#[derive(Debug)]
struct AttemptError {
    transient: bool,
    message: String,
}

pub struct OpenMeteoClient {
    http: Client,
    base_url: String,
    retry: RetryPolicy,
    cache: Option<Arc<dyn ResponseCache>>,
}

impl OpenMeteoClient {
    pub fn new(
        base_url: String,
        timeout: Duration,
        retry: RetryPolicy,
        cache: Option<Arc<dyn ResponseCache>>,
    ) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url,
            retry,
            cache,
        })
    }

    pub fn from_config(
        cfg: &WeatherConfig,
        cache: Option<Arc<dyn ResponseCache>>,
    ) -> Result<Self> {
        Self::new(
            cfg.base_url.clone(),
            cfg.timeout(),
            RetryPolicy::ExponentialBackoff(cfg.retry.clone()),
            cache,
        )
    }

    fn base_query(latitude: f64, longitude: f64) -> Vec<(&'static str, String)> {
        vec![
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
            ("wind_speed_unit", "kmh".to_string()),
            ("timezone", "auto".to_string()),
        ]
    }

    /// Fetch and decode one request. `build` turns the raw response into a
    /// record; a body is cached only once `build` has accepted it.
    async fn fetch<T, F>(&self, query: &[(&'static str, String)], build: F) -> Result<T>
    where
        F: Fn(&OmResponse) -> Result<T> + Send + Sync,
    {
        let key = request_key(&self.base_url, query);

        if let Some(cache) = &self.cache {
            match cache.get(&key).await {
                Ok(Some(body)) => match Self::decode(&body).and_then(|r| build(&r)) {
                    Ok(record) => {
                        tracing::debug!(%key, "Weather cache hit");
                        return Ok(record);
                    }
                    Err(e) => tracing::warn!(%key, "Ignoring unusable cached response: {}", e),
                },
                Ok(None) => tracing::debug!(%key, "Weather cache miss"),
                Err(e) => tracing::warn!("Weather cache read failed: {}", e),
            }
        }

        let body = RetryIf::spawn(
            self.retry.delays(),
            || self.attempt(query),
            |e: &AttemptError| {
                if e.transient {
                    tracing::warn!("Transient Open-Meteo failure, retrying: {}", e.message);
                }
                e.transient
            },
        )
        .await
        .map_err(|e| AssistantError::WeatherProvider(e.message))?;

        let record = build(&Self::decode(&body)?)?;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(&key, &body).await {
                tracing::warn!("Weather cache write failed: {}", e);
            }
        }

        Ok(record)
    }

    fn decode(body: &str) -> Result<OmResponse> {
        serde_json::from_str(body).map_err(|e| {
            AssistantError::WeatherProvider(format!(
                "Failed to parse Open-Meteo response: {e}. Raw: {}",
                truncate_body(body)
            ))
        })
    }

    async fn attempt(
        &self,
        query: &[(&'static str, String)],
    ) -> std::result::Result<String, AttemptError> {
        let res = self
            .http
            .get(&self.base_url)
            .query(query)
            .send()
            .await
            .map_err(|e| AttemptError {
                transient: is_transient_error(&e),
                message: format!("Failed to send request to Open-Meteo: {e}"),
            })?;

        let status = res.status();
        let body = res.text().await.map_err(|e| AttemptError {
            transient: true,
            message: format!("Failed to read Open-Meteo response body: {e}"),
        })?;

        if !status.is_success() {
            let detail = serde_json::from_str::<OmError>(&body)
                .map(|e| e.reason)
                .unwrap_or_else(|_| truncate_body(&body));
            return Err(AttemptError {
                transient: is_transient_status(status),
                message: format!("Open-Meteo request failed with status {status}: {detail}"),
            });
        }

        Ok(body)
    }
}

fn build_current(response: &OmResponse) -> Result<CurrentConditions> {
    let values = response.current.as_ref().ok_or_else(|| {
        AssistantError::WeatherProvider("response has no \"current\" block".to_string())
    })?;
    let block = VariableBlock {
        names: &CURRENT_VARIABLES,
        values,
    };

    let code = block.scalar(current::WEATHER_CODE)? as i32;
    Ok(CurrentConditions {
        latitude: round_to(response.latitude, 4),
        longitude: round_to(response.longitude, 4),
        timezone: response
            .timezone
            .clone()
            .filter(|tz| !tz.is_empty())
            .unwrap_or_else(|| "UTC".to_string()),
        temperature: round_to(block.scalar(current::TEMPERATURE)?, 1),
        feels_like: round_to(block.scalar(current::APPARENT_TEMPERATURE)?, 1),
        humidity: block.scalar(current::HUMIDITY)?.round() as i64,
        precipitation_mm: round_to(block.scalar(current::PRECIPITATION)?, 1),
        weather_code: code,
        condition: wmo::label(code).to_string(),
        emoji: wmo::emoji(code).to_string(),
        wind_speed_kmh: round_to(block.scalar(current::WIND_SPEED)?, 1),
        wind_direction: wmo::compass_direction(block.scalar(current::WIND_DIRECTION)?)
            .to_string(),
        uv_index: round_to(block.scalar(current::UV_INDEX)?, 1),
    })
}

fn build_forecast(response: &OmResponse, days: u8) -> Result<Vec<DailyForecast>> {
    let values = response.daily.as_ref().ok_or_else(|| {
        AssistantError::WeatherProvider("response has no \"daily\" block".to_string())
    })?;
    let block = VariableBlock {
        names: &DAILY_VARIABLES,
        values,
    };

    let n = days as usize;
    let codes = block.series(daily::WEATHER_CODE, n)?;
    let t_max = block.series(daily::TEMPERATURE_MAX, n)?;
    let t_min = block.series(daily::TEMPERATURE_MIN, n)?;
    let precip = block.series(daily::PRECIPITATION_SUM, n)?;
    let rain_p = block.series(daily::RAIN_PROBABILITY, n)?;
    let wind = block.series(daily::WIND_SPEED_MAX, n)?;

    Ok((0..n)
        .map(|i| {
            let code = codes[i] as i32;
            DailyForecast {
                day_index: i,
                weather_code: code,
                condition: wmo::label(code).to_string(),
                emoji: wmo::emoji(code).to_string(),
                temp_max: round_to(t_max[i], 1),
                temp_min: round_to(t_min[i], 1),
                precipitation_mm: round_to(precip[i], 1),
                rain_probability: rain_p[i].round() as i64,
                wind_speed_kmh: round_to(wind[i], 1),
            }
        })
        .collect())
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    async fn current(&self, latitude: f64, longitude: f64) -> Result<CurrentConditions> {
        tracing::info!(latitude, longitude, "Fetching current conditions");

        let mut query = Self::base_query(latitude, longitude);
        query.push(("current", CURRENT_VARIABLES.join(",")));

        self.fetch(&query, build_current).await
    }

    async fn forecast(
        &self,
        latitude: f64,
        longitude: f64,
        days: u8,
    ) -> Result<Vec<DailyForecast>> {
        let days = days.clamp(1, MAX_FORECAST_DAYS);
        tracing::info!(latitude, longitude, days, "Fetching daily forecast");

        let mut query = Self::base_query(latitude, longitude);
        query.push(("daily", DAILY_VARIABLES.join(",")));
        query.push(("forecast_days", days.to_string()));

        self.fetch(&query, |response| build_forecast(response, days)).await
    }
}
