//! HTTP and WebSocket handler tests against the mock kernel backend.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use codepod_core::{
    DispatchOutcome, KernelBackend, KernelEvent, Language, MockBackend, SessionSupervisor,
    SupervisorConfig,
};
use codepod_server::{AppState, create_router, handle_text};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

fn supervisor() -> Arc<SessionSupervisor> {
    let backend: Arc<dyn KernelBackend> = Arc::new(MockBackend::new());
    Arc::new(SessionSupervisor::new(backend, SupervisorConfig::default()))
}

fn app(supervisor: &Arc<SessionSupervisor>) -> axum::Router {
    create_router(Arc::new(AppState {
        supervisor: supervisor.clone(),
    }))
}

async fn send(app: axum::Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn test_health() {
    let supervisor = supervisor();
    let (status, body) = send(app(&supervisor), "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_list_kernels() {
    let supervisor = supervisor();
    let (_, body) = send(app(&supervisor), "GET", "/api/kernels").await;
    assert_eq!(body, Value::Array(vec![]));

    supervisor
        .get_or_create("s1", Language::Python)
        .await
        .unwrap()
        .unwrap();

    let (status, body) = send(app(&supervisor), "GET", "/api/kernels").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["sessionId"], "s1");
    assert_eq!(body[0]["language"], "python");
    assert_eq!(body[0]["state"], "ready");
}

#[tokio::test]
async fn test_kill_kernel() {
    let supervisor = supervisor();
    supervisor
        .get_or_create("s1", Language::Julia)
        .await
        .unwrap()
        .unwrap();

    let (status, _) = send(app(&supervisor), "DELETE", "/api/kernels/s1/julia").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(supervisor.list_kernels().await.is_empty());

    let (status, body) = send(app(&supervisor), "DELETE", "/api/kernels/s1/julia").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "KernelNotFound");
}

#[tokio::test]
async fn test_kill_unknown_language() {
    let supervisor = supervisor();
    let (status, body) = send(app(&supervisor), "DELETE", "/api/kernels/s1/cobol").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "UnsupportedLanguage");
}

#[tokio::test]
async fn test_handle_text_runs_code() {
    let supervisor = supervisor();
    let (sink, mut events) = mpsc::unbounded_channel();

    let outcome = handle_text(
        &supervisor,
        r#"{"type": "runCode", "payload": {"sessionId": "s1", "lang": "python",
            "code": "1+1", "podId": "pod1"}}"#,
        &sink,
    )
    .await;
    assert_eq!(outcome, DispatchOutcome::Dispatched);

    let result = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match events.recv().await {
                Some(KernelEvent::ExecuteResult(payload)) => return payload,
                Some(_) => continue,
                None => panic!("event stream closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for execute_result");

    assert_eq!(result.element_id, "pod1");
    assert_eq!(result.count, Some(1));
}

#[tokio::test]
async fn test_handle_text_invalid_frame() {
    let supervisor = supervisor();
    let (sink, mut events) = mpsc::unbounded_channel();

    let outcome = handle_text(&supervisor, "{\"type\": \"runCode\"", &sink).await;
    assert_eq!(outcome, DispatchOutcome::Failed);

    match events.recv().await {
        Some(KernelEvent::Error(payload)) => assert_eq!(payload.ename, "InvalidCommand"),
        other => panic!("expected error event, got {other:?}"),
    }
    assert!(supervisor.list_kernels().await.is_empty());
}
