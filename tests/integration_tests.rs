//! Integration tests for the weather gateway
//!
//! Drives the dispatcher end to end through the public API, with a stub
//! backend standing in for Open-Meteo. Each test owns its own dispatcher,
//! cache and counters, so they can run in parallel.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use weather_mcp::cache::TtlCache;
use weather_mcp::config::WeatherConfig;
use weather_mcp::gateway::{protocol::methods, Dispatcher, JsonRpcRequest};
use weather_mcp::weather::{
    build_registry, prompt_catalog, Coordinates, CurrentConditions, ForecastDay, GeoCandidate,
    ProviderError, WeatherBackend,
};

/// Stub backend with per-method invocation counters
///
/// An optional artificial delay keeps requests in flight long enough for
/// concurrent callers to pile up on the same cache key.
struct CountingBackend {
    candidates: Vec<GeoCandidate>,
    delay: Duration,
    resolve_calls: AtomicUsize,
    current_calls: AtomicUsize,
    forecast_calls: AtomicUsize,
}

impl CountingBackend {
    fn new(candidates: Vec<GeoCandidate>) -> Arc<Self> {
        Arc::new(Self {
            candidates,
            delay: Duration::ZERO,
            resolve_calls: AtomicUsize::new(0),
            current_calls: AtomicUsize::new(0),
            forecast_calls: AtomicUsize::new(0),
        })
    }

    fn slow(candidates: Vec<GeoCandidate>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            candidates,
            delay,
            resolve_calls: AtomicUsize::new(0),
            current_calls: AtomicUsize::new(0),
            forecast_calls: AtomicUsize::new(0),
        })
    }

    async fn simulate_latency(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl WeatherBackend for CountingBackend {
    async fn resolve_location(
        &self,
        _query: &str,
        _language: &str,
    ) -> Result<Vec<GeoCandidate>, ProviderError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        Ok(self.candidates.clone())
    }

    async fn current_conditions(
        &self,
        point: Coordinates,
        _language: &str,
    ) -> Result<CurrentConditions, ProviderError> {
        self.current_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        Ok(CurrentConditions {
            point,
            temperature_c: -3.4,
            humidity_percent: 81.0,
            weather_code: 71,
            wind_speed_kmh: 12.0,
            wind_direction_deg: 225.0,
            pressure_hpa: 1003.0,
            observed_at: None,
        })
    }

    async fn forecast(
        &self,
        _point: Coordinates,
        days: u8,
        _language: &str,
    ) -> Result<Vec<ForecastDay>, ProviderError> {
        self.forecast_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        let first = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        Ok((0..days)
            .map(|i| ForecastDay {
                date: first + chrono::Duration::days(i as i64),
                weather_code: 3,
                temperature_max_c: -1.0,
                temperature_min_c: -6.0,
                precipitation_mm: 0.4,
                humidity_max_percent: Some(85.0),
            })
            .collect())
    }
}

fn moscow_candidate() -> GeoCandidate {
    GeoCandidate {
        name: "Москва".to_string(),
        latitude: 55.75222,
        longitude: 37.61556,
        country: Some("Россия".to_string()),
        admin1: None,
        population: Some(10_381_222),
        timezone: Some("Europe/Moscow".to_string()),
    }
}

fn dispatcher_over(backend: Arc<CountingBackend>) -> Arc<Dispatcher> {
    let registry = build_registry(backend, &WeatherConfig::default()).unwrap();
    let cache = Arc::new(TtlCache::new(Duration::from_secs(60)));
    Arc::new(Dispatcher::new(
        Arc::new(registry),
        cache,
        prompt_catalog(),
    ))
}

fn call_tool_request(name: &str, arguments: Value) -> JsonRpcRequest {
    JsonRpcRequest::with_params(
        methods::CALL_TOOL,
        json!({"name": name, "arguments": arguments}),
    )
}

fn report_text(result: &Value) -> &str {
    result["content"][0]["text"].as_str().unwrap()
}

/// The standard session opening: initialize, initialized, ping, tools/list
#[tokio::test]
async fn test_handshake_and_discovery_flow() {
    let dispatcher = dispatcher_over(CountingBackend::new(vec![moscow_candidate()]));

    let response = dispatcher
        .dispatch(JsonRpcRequest::with_params(
            methods::INITIALIZE,
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "inspector", "version": "1.0.0"}
            }),
        ))
        .await
        .unwrap();
    let result = response.result.unwrap();
    assert_eq!(result["protocolVersion"], "2024-11-05");
    assert_eq!(result["serverInfo"]["name"], "weather-mcp");

    // the initialized notification gets no reply
    let mut notification = JsonRpcRequest::new(methods::NOTIFY_INITIALIZED);
    notification.id = None;
    assert!(dispatcher.dispatch(notification).await.is_none());

    let response = dispatcher
        .dispatch(JsonRpcRequest::new(methods::PING))
        .await
        .unwrap();
    assert_eq!(response.result, Some(json!({})));

    let response = dispatcher
        .dispatch(JsonRpcRequest::new(methods::LIST_TOOLS))
        .await
        .unwrap();
    let tools = response.result.unwrap()["tools"].as_array().unwrap().len();
    assert_eq!(tools, 3);
}

/// Geocoded call answered from upstream once, then from the cache
#[tokio::test]
async fn test_repeated_call_is_served_from_cache() {
    let backend = CountingBackend::new(vec![moscow_candidate()]);
    let dispatcher = dispatcher_over(Arc::clone(&backend));
    let request = call_tool_request("get_current_weather", json!({"location": "Москва"}));

    let first = dispatcher.dispatch(request.clone()).await.unwrap();
    let second = dispatcher.dispatch(request).await.unwrap();

    assert_eq!(backend.resolve_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.current_calls.load(Ordering::SeqCst), 1);
    // the replay is byte-identical, not merely equivalent
    assert_eq!(
        serde_json::to_string(&first.result).unwrap(),
        serde_json::to_string(&second.result).unwrap()
    );

    let result = first.result.unwrap();
    // success results carry no isError flag
    assert!(result.get("isError").is_none());
    assert!(report_text(&result).contains("Weather in Москва, Россия"));
}

/// Concurrent identical calls coalesce onto one upstream fetch
#[tokio::test]
async fn test_concurrent_identical_calls_fetch_once() {
    let backend = CountingBackend::slow(vec![moscow_candidate()], Duration::from_millis(30));
    let dispatcher = dispatcher_over(Arc::clone(&backend));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let dispatcher = Arc::clone(&dispatcher);
        handles.push(tokio::spawn(async move {
            dispatcher
                .dispatch(call_tool_request(
                    "get_current_weather",
                    json!({"location": "Москва"}),
                ))
                .await
                .unwrap()
        }));
    }

    let mut texts = Vec::new();
    for handle in handles {
        let response = handle.await.unwrap();
        assert!(response.is_success());
        texts.push(serde_json::to_string(&response.result).unwrap());
    }

    assert_eq!(backend.current_calls.load(Ordering::SeqCst), 1);
    assert!(texts.windows(2).all(|pair| pair[0] == pair[1]));
}

/// Oversized day counts are clamped to the seven-day limit
#[tokio::test]
async fn test_forecast_days_clamped() {
    let backend = CountingBackend::new(Vec::new());
    let dispatcher = dispatcher_over(Arc::clone(&backend));

    let response = dispatcher
        .dispatch(call_tool_request(
            "get_weather_forecast",
            json!({"days": 14}),
        ))
        .await
        .unwrap();

    let result = response.result.unwrap();
    assert!(report_text(&result).contains("7 day(s)"));
    assert_eq!(backend.forecast_calls.load(Ordering::SeqCst), 1);
}

/// A "lat,lon" location string never reaches the geocoder
#[tokio::test]
async fn test_coordinate_string_skips_geocoding() {
    let backend = CountingBackend::new(vec![moscow_candidate()]);
    let dispatcher = dispatcher_over(Arc::clone(&backend));

    let response = dispatcher
        .dispatch(call_tool_request(
            "get_current_weather",
            json!({"location": "55.75,37.62"}),
        ))
        .await
        .unwrap();

    assert!(response.is_success());
    assert_eq!(backend.resolve_calls.load(Ordering::SeqCst), 0);
    assert_eq!(backend.current_calls.load(Ordering::SeqCst), 1);
}

/// Validation failures carry the invalid-params code
#[tokio::test]
async fn test_missing_required_parameter_is_rejected() {
    let dispatcher = dispatcher_over(CountingBackend::new(vec![moscow_candidate()]));

    let response = dispatcher
        .dispatch(call_tool_request("search_location", json!({})))
        .await
        .unwrap();

    let error = response.error.unwrap();
    assert_eq!(error.code, -32602);
    assert!(error.message.contains("city_name"));
}

/// An empty candidate list maps to the location-not-found code
#[tokio::test]
async fn test_unknown_place_is_location_not_found() {
    let dispatcher = dispatcher_over(CountingBackend::new(Vec::new()));

    let response = dispatcher
        .dispatch(call_tool_request(
            "search_location",
            json!({"city_name": "Нигдеград"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.error.unwrap().code, -32001);
}

/// Prompt discovery and rendering over the wire
#[tokio::test]
async fn test_prompt_flow() {
    let dispatcher = dispatcher_over(CountingBackend::new(Vec::new()));

    let response = dispatcher
        .dispatch(JsonRpcRequest::new(methods::LIST_PROMPTS))
        .await
        .unwrap();
    let prompts = response.result.unwrap()["prompts"]
        .as_array()
        .unwrap()
        .len();
    assert_eq!(prompts, 3);

    let response = dispatcher
        .dispatch(JsonRpcRequest::with_params(
            methods::GET_PROMPT,
            json!({"name": "weather_forecast", "arguments": {"location": "Сочи", "days": "5"}}),
        ))
        .await
        .unwrap();
    let result = response.result.unwrap();
    let text = result["messages"][0]["content"]["text"].as_str().unwrap();
    assert!(text.contains("for 5 days for Сочи"));
}
