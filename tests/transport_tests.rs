//! HTTP transport tests
//!
//! Exercises the SSE router in memory with `tower::ServiceExt::oneshot`:
//! no sockets, real handlers. The JSON-RPC response always rides the
//! session's SSE stream; the POST endpoint only ever acknowledges.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};

use weather_mcp::cache::TtlCache;
use weather_mcp::config::WeatherConfig;
use weather_mcp::gateway::transport::sse::{router, GatewayState};
use weather_mcp::gateway::{Dispatcher, SessionManager, SessionState};
use weather_mcp::weather::{
    build_registry, prompt_catalog, Coordinates, CurrentConditions, ForecastDay, GeoCandidate,
    ProviderError, WeatherBackend,
};

/// Fixed-answer backend; transport tests never assert on weather content
struct StubBackend;

#[async_trait]
impl WeatherBackend for StubBackend {
    async fn resolve_location(
        &self,
        _query: &str,
        _language: &str,
    ) -> Result<Vec<GeoCandidate>, ProviderError> {
        Ok(vec![GeoCandidate {
            name: "Москва".to_string(),
            latitude: 55.75222,
            longitude: 37.61556,
            country: Some("Россия".to_string()),
            admin1: None,
            population: None,
            timezone: None,
        }])
    }

    async fn current_conditions(
        &self,
        point: Coordinates,
        _language: &str,
    ) -> Result<CurrentConditions, ProviderError> {
        Ok(CurrentConditions {
            point,
            temperature_c: 0.0,
            humidity_percent: 50.0,
            weather_code: 0,
            wind_speed_kmh: 5.0,
            wind_direction_deg: 90.0,
            pressure_hpa: 1013.0,
            observed_at: None,
        })
    }

    async fn forecast(
        &self,
        _point: Coordinates,
        _days: u8,
        _language: &str,
    ) -> Result<Vec<ForecastDay>, ProviderError> {
        Ok(Vec::new())
    }
}

fn gateway() -> (axum::Router, Arc<SessionManager>) {
    let registry = build_registry(Arc::new(StubBackend), &WeatherConfig::default()).unwrap();
    let cache = Arc::new(TtlCache::new(Duration::from_secs(60)));
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(registry),
        cache,
        prompt_catalog(),
    ));
    let sessions = Arc::new(SessionManager::new());
    let app = router(GatewayState::new(
        dispatcher,
        Arc::clone(&sessions),
    ));
    (app, sessions)
}

fn post_message(session_id: Option<&str>, body: &str) -> Request<Body> {
    let uri = match session_id {
        Some(id) => format!("/messages?session_id={}", id),
        None => "/messages".to_string(),
    };
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _sessions) = gateway();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn test_post_without_session_id_is_bad_request() {
    let (app, _sessions) = gateway();
    let response = app
        .oneshot(post_message(
            None,
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32600);
}

#[tokio::test]
async fn test_post_to_unknown_session_is_not_found() {
    let (app, sessions) = gateway();
    let response = app
        .oneshot(post_message(
            Some("deadbeef"),
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32003);
    // the bogus id must not have created a session
    assert!(sessions.is_empty());
}

#[tokio::test]
async fn test_unparseable_body_is_parse_error() {
    let (app, sessions) = gateway();
    let (session_id, _rx) = sessions.open_push();

    let response = app
        .oneshot(post_message(Some(&session_id), "{not json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32700);
}

#[tokio::test]
async fn test_wrong_jsonrpc_version_is_invalid_request() {
    let (app, sessions) = gateway();
    let (session_id, _rx) = sessions.open_push();

    let response = app
        .oneshot(post_message(
            Some(&session_id),
            r#"{"jsonrpc":"1.0","id":3,"method":"ping"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32600);
    assert_eq!(body["id"], 3);
}

#[tokio::test]
async fn test_response_rides_the_session_stream() {
    let (app, sessions) = gateway();
    let (session_id, mut rx) = sessions.open_push();

    let response = app
        .oneshot(post_message(
            Some(&session_id),
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05"}}"#,
        ))
        .await
        .unwrap();

    // the POST acknowledges; it never carries the result
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"Accepted");

    let payload = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("no pushed response within 1s")
        .expect("stream closed");
    let pushed: Value = serde_json::from_str(&payload).unwrap();
    assert_eq!(pushed["id"], 1);
    assert_eq!(pushed["result"]["protocolVersion"], "2024-11-05");

    // a successful initialize activates the session
    assert_eq!(sessions.state(&session_id), Some(SessionState::Active));
}

#[tokio::test]
async fn test_dispatch_errors_also_ride_the_stream() {
    let (app, sessions) = gateway();
    let (session_id, mut rx) = sessions.open_push();

    let response = app
        .oneshot(post_message(
            Some(&session_id),
            r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"get_stock_price","arguments":{}}}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let payload = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("no pushed response within 1s")
        .expect("stream closed");
    let pushed: Value = serde_json::from_str(&payload).unwrap();
    assert_eq!(pushed["id"], 7);
    assert_eq!(pushed["error"]["code"], -32601);
}

#[tokio::test]
async fn test_sse_stream_opens_and_announces_endpoint() {
    let (app, sessions) = gateway();

    let response = app
        .oneshot(Request::builder().uri("/sse").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.starts_with("text/event-stream"));
    assert_eq!(sessions.len(), 1);

    // the first event names the POST endpoint for this session
    let mut stream = response.into_body().into_data_stream();
    let chunk = stream.next().await.unwrap().unwrap();
    let text = String::from_utf8(chunk.to_vec()).unwrap();
    assert!(text.contains("event: endpoint"));
    assert!(text.contains("/messages?session_id="));

    // dropping the stream closes the session
    drop(stream);
    assert!(sessions.is_empty());
}

#[tokio::test]
async fn test_full_round_trip_over_post_and_push() {
    let (app, sessions) = gateway();
    let (session_id, mut rx) = sessions.open_push();

    let body = json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "tools/call",
        "params": {"name": "search_location", "arguments": {"city_name": "Москва"}}
    });
    let response = app
        .oneshot(post_message(Some(&session_id), &body.to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let payload = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("no pushed response within 1s")
        .expect("stream closed");
    let pushed: Value = serde_json::from_str(&payload).unwrap();
    assert_eq!(pushed["id"], 2);
    let text = pushed["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("Москва"));
}
