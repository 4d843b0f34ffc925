//! HTTP and WebSocket routes.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{delete, get},
};
use codepod_core::{
    DispatchOutcome, EventSink, KernelEvent, KernelSummary, Language, SessionSupervisor,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;

use crate::error::{ServerError, ServerResult};
use crate::protocol::{encode_event, error_event, parse_command};

/// Application state shared across handlers.
pub struct AppState {
    pub supervisor: Arc<SessionSupervisor>,
}

/// Create the router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .route("/api/kernels", get(list_kernels_handler))
        .route(
            "/api/kernels/{session_id}/{language}",
            delete(kill_kernel_handler),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint.
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn list_kernels_handler(State(state): State<Arc<AppState>>) -> Json<Vec<KernelSummary>> {
    Json(state.supervisor.list_kernels().await)
}

async fn kill_kernel_handler(
    State(state): State<Arc<AppState>>,
    Path((session_id, language)): Path<(String, String)>,
) -> ServerResult<StatusCode> {
    let language: Language = language.parse()?;
    if state.supervisor.kill(&session_id, language).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ServerError::KernelNotFound(format!("{session_id}/{language}")))
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Handle a WebSocket connection.
///
/// Commands are dispatched one at a time so a client's commands reach the
/// kernel in the order they were sent. Kernel events flow back through a
/// forward task that owns the write half.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (sink, mut events) = mpsc::unbounded_channel::<KernelEvent>();

    let forward_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let json = match encode_event(&event) {
                Ok(json) => json,
                Err(e) => {
                    tracing::warn!("Failed to encode {} event: {}", event.event_type(), e);
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                handle_text(&state.supervisor, text.as_str(), &sink).await;
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::warn!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    tracing::debug!("WebSocket client disconnected");
    forward_task.abort();
}

/// Parse one text frame and hand it to the supervisor.
///
/// A frame that is not a valid command is answered with an `error` event
/// on `sink`.
pub async fn handle_text(
    supervisor: &SessionSupervisor,
    text: &str,
    sink: &EventSink,
) -> DispatchOutcome {
    match parse_command(text) {
        Ok(command) => supervisor.dispatch(command, sink).await,
        Err(e) => {
            tracing::warn!("Failed to parse client message: {} (input: {})", e, text);
            let _ = sink.send(error_event(&e));
            DispatchOutcome::Failed
        }
    }
}
