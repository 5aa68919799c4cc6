//! HTTP push transport
//!
//! Three routes:
//! - `GET /sse` opens a push session and streams responses as SSE events;
//!   the first event (`endpoint`) carries the POST path with the session id
//! - `POST /messages?session_id=<id>` accepts one JSON-RPC envelope, answers
//!   `202 Accepted` immediately and pushes the real response on the session's
//!   stream
//! - `GET /health` answers `OK` without touching the dispatcher
//!
//! Responses travel only on the stream; the POST body response is never the
//! JSON-RPC result. Dropping the stream closes the session via a guard.

use async_stream::stream;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use super::super::dispatcher::Dispatcher;
use super::super::errors::GatewayError;
use super::super::protocol::{methods, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use super::super::session::SessionManager;
use crate::error::AppResult;

/// Shared state behind every route
#[derive(Clone)]
pub struct GatewayState {
    dispatcher: Arc<Dispatcher>,
    sessions: Arc<SessionManager>,
}

impl GatewayState {
    /// Bundle the dispatcher and session index for the router
    pub fn new(dispatcher: Arc<Dispatcher>, sessions: Arc<SessionManager>) -> Self {
        Self {
            dispatcher,
            sessions,
        }
    }
}

/// Build the transport's router
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/sse", get(sse_handler))
        .route("/messages", post(messages_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve the router until the process ends
pub async fn serve(
    dispatcher: Arc<Dispatcher>,
    sessions: Arc<SessionManager>,
    host: &str,
    port: u16,
) -> AppResult<()> {
    let state = GatewayState::new(dispatcher, sessions);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!("SSE transport listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Closes the session when the SSE stream is dropped, however that happens
struct StreamGuard {
    sessions: Arc<SessionManager>,
    session_id: String,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        debug!("SSE stream gone for session {}", self.session_id);
        self.sessions.close(&self.session_id);
    }
}

async fn sse_handler(
    State(state): State<GatewayState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (session_id, mut outbound) = state.sessions.open_push();
    info!("SSE stream opened for session {}", session_id);

    let guard = StreamGuard {
        sessions: Arc::clone(&state.sessions),
        session_id: session_id.clone(),
    };

    let stream = stream! {
        let _guard = guard;
        yield Ok(Event::default()
            .event("endpoint")
            .data(format!("/messages?session_id={}", session_id)));

        while let Some(payload) = outbound.recv().await {
            yield Ok(Event::default().event("message").data(payload));
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[derive(Debug, Deserialize)]
struct MessagesQuery {
    session_id: Option<String>,
}

async fn messages_handler(
    State(state): State<GatewayState>,
    Query(query): Query<MessagesQuery>,
    body: String,
) -> Response {
    let Some(session_id) = query.session_id else {
        let error = JsonRpcError::invalid_request("missing session_id query parameter");
        return (
            StatusCode::BAD_REQUEST,
            Json(JsonRpcResponse::error(None, error)),
        )
            .into_response();
    };

    // an unknown id never implicitly creates a session
    if !state.sessions.contains(&session_id) {
        warn!("POST for unknown session {}", session_id);
        let error = GatewayError::session_not_found(session_id.as_str()).to_rpc_error();
        return (
            StatusCode::NOT_FOUND,
            Json(JsonRpcResponse::error(None, error)),
        )
            .into_response();
    }

    let request: JsonRpcRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(err) => {
            let error = JsonRpcError::parse_error(err.to_string());
            return (
                StatusCode::BAD_REQUEST,
                Json(JsonRpcResponse::error(None, error)),
            )
                .into_response();
        }
    };

    if let Err(err) = request.validate() {
        let error = JsonRpcError::invalid_request(err.to_string());
        return (
            StatusCode::BAD_REQUEST,
            Json(JsonRpcResponse::error(request.id.clone(), error)),
        )
            .into_response();
    }

    state.sessions.touch(&session_id);
    let is_initialize = request.method == methods::INITIALIZE;
    let dispatcher = Arc::clone(&state.dispatcher);
    let sessions = Arc::clone(&state.sessions);

    // the POST answers immediately; the response rides the SSE stream
    tokio::spawn(async move {
        let Some(response) = dispatcher.dispatch(request).await else {
            return;
        };
        if is_initialize && response.is_success() {
            sessions.activate(&session_id);
        }
        match serde_json::to_string(&response) {
            Ok(payload) => {
                if let Err(err) = sessions.push(&session_id, payload) {
                    warn!("Dropping response for session {}: {}", session_id, err);
                }
            }
            Err(err) => warn!("Could not serialize response: {}", err),
        }
    });

    (StatusCode::ACCEPTED, "Accepted").into_response()
}

async fn health_handler() -> &'static str {
    "OK"
}
