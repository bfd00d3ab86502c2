use serde::{Deserialize, Deserializer, Serialize};

/// Flexible integer deserializer: models sometimes answer `3`, `3.0` or `"3"`.
fn deserialize_flexible_days<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FlexibleInt {
        Int(i64),
        Float(f64),
        String(String),
    }

    let value = Option::<FlexibleInt>::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(FlexibleInt::Int(i)) => Ok(Some(i)),
        Some(FlexibleInt::Float(f)) => Ok(Some(f.round() as i64)),
        Some(FlexibleInt::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<i64>()
                .map(Some)
                .map_err(serde::de::Error::custom)
        }
    }
}

// ── inbound / outbound HTTP bodies ───────────────────────────────────────────

/// Body of `POST /chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// Body returned from `POST /chat`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub response: String,
    pub weather_data: Option<WeatherReport>,
    pub query_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ambiguous: Option<bool>,
}

// ── intent ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    #[default]
    Current,
    Forecast,
    General,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Current => "current",
            QueryType::Forecast => "forecast",
            QueryType::General => "general",
        }
    }
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The JSON object exactly as the intent prompt asks the model to produce it.
/// Every weather field is optional here; `Intent::try_from` enforces which
/// ones must be present.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawIntent {
    pub is_weather: bool,
    #[serde(default)]
    pub needs_location: Option<bool>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub query_type: Option<QueryType>,
    #[serde(default, deserialize_with = "deserialize_flexible_days")]
    pub forecast_days: Option<i64>,
    #[serde(default)]
    pub ambiguous: Option<bool>,
    pub ambiguity_note: Option<String>,
}

/// Classification of a user message.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    NotWeather,
    /// Weather related, but no place could be inferred.
    NeedsLocation,
    Weather(WeatherIntent),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherIntent {
    pub city: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    pub query_type: QueryType,
    pub forecast_days: Option<i64>,
    pub ambiguous: bool,
    pub ambiguity_note: Option<String>,
}

pub const DEFAULT_FORECAST_DAYS: u8 = 7;
pub const MAX_FORECAST_DAYS: u8 = 7;

impl WeatherIntent {
    /// Day count actually requested from the provider: absent or zero means
    /// the full week, anything else is clamped into 1..=7.
    pub fn effective_forecast_days(&self) -> u8 {
        match self.forecast_days {
            None | Some(0) => DEFAULT_FORECAST_DAYS,
            Some(days) => days.clamp(1, MAX_FORECAST_DAYS as i64) as u8,
        }
    }

    /// Ambiguity note worth showing to the user, if any.
    pub fn note(&self) -> Option<&str> {
        self.ambiguity_note
            .as_deref()
            .filter(|n| !n.trim().is_empty())
    }
}

impl TryFrom<RawIntent> for Intent {
    type Error = String;

    fn try_from(raw: RawIntent) -> Result<Self, Self::Error> {
        if !raw.is_weather {
            return Ok(Intent::NotWeather);
        }
        if raw.needs_location.unwrap_or(false) {
            return Ok(Intent::NeedsLocation);
        }

        let city = raw
            .city
            .filter(|c| !c.trim().is_empty())
            .ok_or("weather intent is missing \"city\"")?;
        let country = raw.country.ok_or("weather intent is missing \"country\"")?;
        let latitude = raw.latitude.ok_or("weather intent is missing \"latitude\"")?;
        let longitude = raw
            .longitude
            .ok_or("weather intent is missing \"longitude\"")?;

        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(format!(
                "coordinates out of range: latitude={latitude}, longitude={longitude}"
            ));
        }

        Ok(Intent::Weather(WeatherIntent {
            city,
            country,
            latitude,
            longitude,
            query_type: raw.query_type.unwrap_or_default(),
            forecast_days: raw.forecast_days,
            ambiguous: raw.ambiguous.unwrap_or(false),
            ambiguity_note: raw.ambiguity_note,
        }))
    }
}

// ── weather records ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CurrentConditions {
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: i64,
    pub precipitation_mm: f64,
    pub weather_code: i32,
    pub condition: String,
    pub emoji: String,
    pub wind_speed_kmh: f64,
    pub wind_direction: String,
    pub uv_index: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyForecast {
    pub day_index: usize,
    pub weather_code: i32,
    pub condition: String,
    pub emoji: String,
    pub temp_max: f64,
    pub temp_min: f64,
    pub precipitation_mm: f64,
    pub rain_probability: i64,
    pub wind_speed_kmh: f64,
}

/// Weather data attached to a reply (`weather_data`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherReport {
    pub current: CurrentConditions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<Vec<DailyForecast>>,
}

// ── chat-completion wire format ──────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

// Chat-completion request
#[derive(Debug, Serialize, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<serde_json::Value>,
}

// Chat-completion response
#[derive(Debug, Deserialize, Clone)]
pub struct CompletionResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Choice {
    pub message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<Intent, String> {
        let raw: RawIntent = serde_json::from_str(json).expect("raw intent should deserialize");
        Intent::try_from(raw)
    }

    #[test]
    fn non_weather_carries_no_fields() {
        assert_eq!(parse(r#"{"is_weather":false}"#), Ok(Intent::NotWeather));
    }

    #[test]
    fn needs_location_wins_over_missing_city() {
        assert_eq!(
            parse(r#"{"is_weather":true,"needs_location":true}"#),
            Ok(Intent::NeedsLocation)
        );
    }

    #[test]
    fn weather_intent_requires_coordinates() {
        let err = parse(r#"{"is_weather":true,"city":"Delhi","country":"India"}"#).unwrap_err();
        assert!(err.contains("latitude"));
    }

    #[test]
    fn query_type_defaults_to_current() {
        let intent = parse(
            r#"{"is_weather":true,"city":"Delhi","country":"India","latitude":28.6,"longitude":77.2}"#,
        )
        .unwrap();
        match intent {
            Intent::Weather(w) => {
                assert_eq!(w.query_type, QueryType::Current);
                assert!(!w.ambiguous);
            }
            other => panic!("expected weather intent, got {other:?}"),
        }
    }

    #[test]
    fn forecast_days_accepts_strings_and_floats() {
        for (days, expected) in [("\"3\"", 3), ("4.0", 4), ("5", 5)] {
            let json = format!(
                r#"{{"is_weather":true,"city":"Oslo","country":"Norway","latitude":59.9,"longitude":10.7,"query_type":"forecast","forecast_days":{days}}}"#
            );
            let Intent::Weather(w) = parse(&json).unwrap() else {
                panic!("expected weather intent");
            };
            assert_eq!(w.forecast_days, Some(expected));
        }
    }

    #[test]
    fn effective_forecast_days_are_clamped() {
        let mut w = WeatherIntent {
            city: "Oslo".into(),
            country: "Norway".into(),
            latitude: 59.9,
            longitude: 10.7,
            query_type: QueryType::Forecast,
            forecast_days: None,
            ambiguous: false,
            ambiguity_note: None,
        };
        assert_eq!(w.effective_forecast_days(), 7);
        w.forecast_days = Some(0);
        assert_eq!(w.effective_forecast_days(), 7);
        w.forecast_days = Some(-2);
        assert_eq!(w.effective_forecast_days(), 1);
        w.forecast_days = Some(3);
        assert_eq!(w.effective_forecast_days(), 3);
        w.forecast_days = Some(14);
        assert_eq!(w.effective_forecast_days(), 7);
    }

    #[test]
    fn unknown_query_type_is_rejected() {
        let raw = serde_json::from_str::<RawIntent>(
            r#"{"is_weather":true,"city":"Oslo","country":"Norway","latitude":59.9,"longitude":10.7,"query_type":"historical"}"#,
        );
        assert!(raw.is_err());
    }

    #[test]
    fn blank_ambiguity_note_is_ignored() {
        let w = WeatherIntent {
            city: "Paris".into(),
            country: "France".into(),
            latitude: 48.85,
            longitude: 2.35,
            query_type: QueryType::Current,
            forecast_days: None,
            ambiguous: true,
            ambiguity_note: Some("   ".into()),
        };
        assert_eq!(w.note(), None);
    }

    #[test]
    fn note_is_passed_through_verbatim() {
        let w = WeatherIntent {
            city: "Paris".into(),
            country: "France".into(),
            latitude: 48.85,
            longitude: 2.35,
            query_type: QueryType::Current,
            forecast_days: None,
            ambiguous: true,
            ambiguity_note: Some(" Defaulted to Paris, France. ".into()),
        };
        assert_eq!(w.note(), Some(" Defaulted to Paris, France. "));
    }

    #[test]
    fn completion_request_omits_unset_fields() {
        let req = CompletionRequest {
            model: "m".into(),
            messages: vec![ChatMessage::user("hi")],
            temperature: None,
            response_format: None,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert!(value.get("temperature").is_none());
        assert!(value.get("response_format").is_none());
    }
}
