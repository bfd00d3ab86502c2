use async_trait::async_trait;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use weather_intel::assistant::WeatherAssistant;
use weather_intel::error::{AssistantError, Result};
use weather_intel::intent::LlmIntent;
use weather_intel::models::{ChatMessage, Choice, CompletionRequest, CompletionResponse};
use weather_intel::prompts::Prompts;
use weather_intel::retry::RetryPolicy;
use weather_intel::server;
use weather_intel::synth::LlmSynth;
use weather_intel::transport::{Gateway, Transport};
use weather_intel::weather::{CURRENT_VARIABLES, OpenMeteoClient};

/// Hands out fixture replies in order and remembers what was asked.
struct ScriptedModel {
    replies: Mutex<Vec<String>>,
    seen: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<CompletionRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedModel {
    async fn chat(&self, req: &CompletionRequest) -> Result<CompletionResponse> {
        self.seen.lock().unwrap().push(req.clone());
        let content = self
            .replies
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| AssistantError::Llm("script exhausted".to_string()))?;
        Ok(CompletionResponse {
            choices: vec![Choice {
                message: ChatMessage {
                    role: "assistant".to_string(),
                    content,
                },
            }],
        })
    }
}

async fn app(model: Arc<ScriptedModel>, meteo: &MockServer) -> axum::Router {
    let prompts = Arc::new(Prompts::default());
    let gateway = Gateway::new(model, "gpt-4o-mini".to_string());
    let weather = OpenMeteoClient::new(
        format!("{}/v1/forecast", meteo.uri()),
        Duration::from_secs(5),
        RetryPolicy::Never,
        None,
    )
    .unwrap();

    let assistant = WeatherAssistant::new(
        Arc::new(LlmIntent::new(gateway.clone(), prompts.intent_system.clone())),
        Arc::new(weather),
        Arc::new(LlmSynth::new(gateway, prompts.synth_system.clone())),
        prompts,
    );
    server::router(assistant)
}

async fn post_chat(app: axum::Router, body: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/chat")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn fixture(json: &str) -> Value {
    serde_json::from_str(json).unwrap()
}

async fn mount_current(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("current", CURRENT_VARIABLES.join(",")))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixture(body)))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn tokyo_current_conditions_end_to_end() {
    let meteo = MockServer::start().await;
    mount_current(&meteo, include_str!("fixtures/openmeteo_current_tokyo.json")).await;

    let model = ScriptedModel::new(&[
        include_str!("fixtures/intent_tokyo.json"),
        "It's a lovely 21.4°C in Tokyo right now, with 64% humidity and a light 11 km/h breeze from the south-southeast.",
    ]);
    let (status, body) = post_chat(
        app(model.clone(), &meteo).await,
        r#"{"message":"What's the weather in Tokyo?"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["city"], "Tokyo");
    assert_eq!(body["country"], "Japan");
    assert_eq!(body["query_type"], "current");
    assert_eq!(body["ambiguous"], false);

    let text = body["response"].as_str().unwrap();
    assert!(!text.is_empty());
    assert!(!text.contains("JSON"));
    assert!(!text.contains("API"));

    let current = &body["weather_data"]["current"];
    assert_eq!(current["temperature"], 21.4);
    assert_eq!(current["humidity"], 64);
    assert_eq!(current["wind_speed_kmh"], 11.2);
    assert_eq!(current["wind_direction"], "SSE");
    assert_eq!(current["condition"], "Partly cloudy");
    assert_eq!(current["timezone"], "Asia/Tokyo");
    assert!(body["weather_data"].get("days").is_none());

    let seen = model.seen();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].response_format.is_some());
    assert!(seen[1].response_format.is_none());
    assert!(seen[1].messages[2]
        .content
        .starts_with("Live weather data for Tokyo, Japan: "));
}

#[tokio::test]
async fn mumbai_week_forecast_end_to_end() {
    let meteo = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("forecast_days", "7"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(fixture(include_str!("fixtures/openmeteo_daily_mumbai.json"))),
        )
        .expect(1)
        .mount(&meteo)
        .await;
    mount_current(&meteo, include_str!("fixtures/openmeteo_current_mumbai.json")).await;

    let model = ScriptedModel::new(&[
        include_str!("fixtures/intent_mumbai_week.json"),
        "Yes, pack an umbrella: showers are likely on most days this week in Mumbai.",
    ]);
    let (status, body) = post_chat(
        app(model, &meteo).await,
        r#"{"message":"Will it rain in Mumbai this week?"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query_type"], "forecast");

    let days = body["weather_data"]["days"].as_array().unwrap();
    assert_eq!(days.len(), 7);
    for (i, day) in days.iter().enumerate() {
        assert_eq!(day["day_index"], i);
    }
    assert_eq!(days[2]["condition"], "Moderate rain");
    assert_eq!(days[2]["rain_probability"], 95);
    assert_eq!(days[5]["emoji"], "⛈️");
    assert_eq!(body["weather_data"]["current"]["wind_direction"], "WSW");
}

#[tokio::test]
async fn non_weather_message_gets_refusal_without_fetching() {
    let meteo = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&meteo)
        .await;

    let model = ScriptedModel::new(&[include_str!("fixtures/intent_not_weather.json")]);
    let (status, body) = post_chat(
        app(model.clone(), &meteo).await,
        r#"{"message":"Write me a haiku about databases"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], Prompts::default().non_weather_reply);
    assert!(body["weather_data"].is_null());
    assert!(body["query_type"].is_null());
    assert!(body.get("city").is_none());
    assert_eq!(model.seen().len(), 1);
}

#[tokio::test]
async fn weather_message_without_place_asks_for_city() {
    let meteo = MockServer::start().await;
    let model = ScriptedModel::new(&[include_str!("fixtures/intent_needs_location.json")]);

    let (status, body) = post_chat(
        app(model, &meteo).await,
        r#"{"message":"Do I need an umbrella today?"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query_type"], "needs_location");
    assert_eq!(body["response"], Prompts::default().needs_location_reply);
    assert!(body["weather_data"].is_null());
}

#[tokio::test]
async fn ambiguous_city_note_is_prefixed() {
    let meteo = MockServer::start().await;
    mount_current(&meteo, include_str!("fixtures/openmeteo_current_tokyo.json")).await;

    let model = ScriptedModel::new(&[
        include_str!("fixtures/intent_paris_ambiguous.json"),
        "Paris is mild today.",
    ]);
    let (_, body) = post_chat(app(model, &meteo).await, r#"{"message":"Weather in Paris?"}"#).await;

    assert_eq!(
        body["response"],
        "_Note: Defaulted to Paris, France — there is also Paris, Texas, USA_\n\nParis is mild today."
    );
    assert_eq!(body["ambiguous"], true);
}

#[tokio::test]
async fn malformed_intent_reply_is_a_gateway_error() {
    let meteo = MockServer::start().await;
    let model = ScriptedModel::new(&["I think you mean Tokyo!"]);

    let (status, body) = post_chat(
        app(model, &meteo).await,
        r#"{"message":"What's the weather in Tokyo?"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("Malformed intent"));
}

#[tokio::test]
async fn provider_failure_fails_the_whole_request() {
    let meteo = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&meteo)
        .await;
    let model = ScriptedModel::new(&[include_str!("fixtures/intent_tokyo.json")]);

    let (status, body) = post_chat(
        app(model.clone(), &meteo).await,
        r#"{"message":"What's the weather in Tokyo?"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("503"));
    // No synthesis call after a failed fetch.
    assert_eq!(model.seen().len(), 1);
}

#[tokio::test]
async fn invalid_bodies_are_rejected() {
    let meteo = MockServer::start().await;

    let (status, _) = post_chat(app(ScriptedModel::new(&[]), &meteo).await, r#"{"text":"hi"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) =
        post_chat(app(ScriptedModel::new(&[]), &meteo).await, r#"{"message":"  "}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn index_and_health_are_served() {
    let meteo = MockServer::start().await;
    let app = app(ScriptedModel::new(&[]), &meteo).await;

    let index = app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(index.status(), StatusCode::OK);
    let html = to_bytes(index.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&html).contains("Weather Intel"));

    let health = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}
