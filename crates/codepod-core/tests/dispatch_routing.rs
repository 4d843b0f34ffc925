//! Integration tests for command dispatch and event routing.
//!
//! Every test drives the mock backend's scripted engine end to end: client
//! command, adapter, wire codec, loopback transport, router, subscriber.

mod common;

use std::sync::Arc;
use std::time::Duration;

use codepod_core::event::{InterruptReplyPayload, ReplyPayload};
use codepod_core::kernel::KernelInstance;
use codepod_core::transport::{FrameSocket, memory};
use codepod_core::{
    DispatchOutcome, KernelEvent, KernelKey, Language, MockBackend, wire,
};
use serde_json::json;

use common::{assert_quiet, collect_execution, collect_until, command, next_event, sink, supervisor};

#[tokio::test]
async fn test_run_code_event_sequence() {
    let supervisor = supervisor(Arc::new(MockBackend::new()));
    let (tx, mut rx) = sink();

    let outcome = supervisor
        .dispatch(
            command(
                r#"{"type": "runCode", "payload": {"sessionId": "s1", "lang": "python",
                    "code": "1+1", "podId": "pod1", "namespace": ""}}"#,
            ),
            &tx,
        )
        .await;
    assert_eq!(outcome, DispatchOutcome::Dispatched);

    let events = collect_execution(&mut rx).await;
    let iopub: Vec<&KernelEvent> = events
        .iter()
        .filter(|e| !matches!(e, KernelEvent::ExecuteReply(_)))
        .collect();

    assert_eq!(iopub.len(), 3, "{events:?}");
    match iopub[0] {
        KernelEvent::Status(p) => {
            assert_eq!(p.status, "busy");
            assert_eq!(p.id.as_deref(), Some("pod1"));
            assert_eq!(p.lang, Language::Python);
        }
        other => panic!("expected busy status, got {other:?}"),
    }
    match iopub[1] {
        KernelEvent::ExecuteResult(p) => {
            assert_eq!(p.element_id, "pod1");
            assert_eq!(p.name, None);
            assert_eq!(p.count, Some(1));
            assert_eq!(
                p.content["data"]["text/plain"],
                r#"CODEPOD_EVAL("""1+1""", "")"#
            );
        }
        other => panic!("expected execute_result, got {other:?}"),
    }
    assert!(matches!(iopub[2], KernelEvent::Status(p) if p.status == "idle"));

    assert!(events.contains(&KernelEvent::ExecuteReply(ReplyPayload {
        element_id: "pod1".to_string(),
        name: None,
        result: "ok".to_string(),
        count: Some(1),
    })));
}

#[tokio::test]
async fn test_execution_count_increments() {
    let supervisor = supervisor(Arc::new(MockBackend::new()));
    let (tx, mut rx) = sink();

    for (pod, expected) in [("pod1", 1), ("pod2", 2)] {
        let json = format!(
            r#"{{"type": "runCode", "payload": {{"sessionId": "s1", "lang": "python",
                "code": "x", "podId": "{pod}"}}}}"#
        );
        supervisor.dispatch(command(&json), &tx).await;
        let events = collect_execution(&mut rx).await;
        let count = events.iter().find_map(|e| match e {
            KernelEvent::ExecuteResult(p) => p.count,
            _ => None,
        });
        assert_eq!(count, Some(expected));
    }
}

#[tokio::test]
async fn test_engine_error_routed_to_element() {
    let supervisor = supervisor(Arc::new(MockBackend::new()));
    let (tx, mut rx) = sink();

    supervisor
        .dispatch(
            command(
                r#"{"type": "runCode", "payload": {"sessionId": "s1", "lang": "julia",
                    "code": "raise()", "podId": "pod3"}}"#,
            ),
            &tx,
        )
        .await;

    let events = collect_execution(&mut rx).await;
    let error = events
        .iter()
        .find_map(|e| match e {
            KernelEvent::Error(p) => Some(p),
            _ => None,
        })
        .expect("error event");
    assert_eq!(error.element_id.as_deref(), Some("pod3"));
    assert_eq!(error.ename, "MockError");
    assert!(events.iter().any(
        |e| matches!(e, KernelEvent::ExecuteReply(p) if p.result == "error")
    ));
}

#[tokio::test]
async fn test_stdout_stream_routed() {
    let supervisor = supervisor(Arc::new(MockBackend::new()));
    let (tx, mut rx) = sink();

    supervisor
        .dispatch(
            command(
                r#"{"type": "runCode", "payload": {"sessionId": "s1", "lang": "python",
                    "code": "print(1)", "podId": "pod4", "raw": true}}"#,
            ),
            &tx,
        )
        .await;

    let events = collect_execution(&mut rx).await;
    let stream = events
        .iter()
        .find_map(|e| match e {
            KernelEvent::Stream(p) => Some(p),
            _ => None,
        })
        .expect("stream event");
    assert_eq!(stream.element_id, "pod4");
    assert_eq!(stream.content["name"], "stdout");
    assert_eq!(stream.content["text"], "print(1)");
}

#[tokio::test]
async fn test_import_results_use_sub_channel() {
    let supervisor = supervisor(Arc::new(MockBackend::new()));
    let (tx, mut rx) = sink();

    supervisor
        .dispatch(
            command(
                r#"{"type": "addImport", "payload": {"sessionId": "s1", "lang": "python",
                    "id": "pod1", "from": "lib", "to": "app", "name": "x"}}"#,
            ),
            &tx,
        )
        .await;

    let events = collect_execution(&mut rx).await;
    let result = events
        .iter()
        .find_map(|e| match e {
            KernelEvent::IoExecuteResult(p) => Some(p),
            _ => None,
        })
        .expect("IO:execute_result");
    assert_eq!(result.element_id, "pod1");
    assert_eq!(result.name.as_deref(), Some("x"));
    assert!(events.iter().any(|e| matches!(
        e,
        KernelEvent::IoExecuteReply(p) if p.name.as_deref() == Some("x")
    )));
}

#[tokio::test]
async fn test_ensure_imports_one_result_per_name() {
    let supervisor = supervisor(Arc::new(MockBackend::new()));
    let (tx, mut rx) = sink();

    supervisor
        .dispatch(
            command(
                r#"{"type": "ensureImports", "payload": {"sessionId": "s1", "lang": "javascript",
                    "id": "pod2", "from": "lib", "to": "app", "names": ["f", "g"]}}"#,
            ),
            &tx,
        )
        .await;

    let mut replies = Vec::new();
    collect_until(&mut rx, |event| {
        if let KernelEvent::IoExecuteReply(p) = event {
            replies.push(p.name.clone().unwrap_or_default());
        }
        replies.len() == 2
    })
    .await;
    replies.sort();
    assert_eq!(replies, vec!["f", "g"]);
}

#[tokio::test]
async fn test_interrupt_reply() {
    let supervisor = supervisor(Arc::new(MockBackend::new()));
    let (tx, mut rx) = sink();

    let outcome = supervisor
        .dispatch(
            command(
                r#"{"type": "interruptKernel", "payload": {"sessionId": "s1", "lang": "racket"}}"#,
            ),
            &tx,
        )
        .await;
    assert_eq!(outcome, DispatchOutcome::Dispatched);

    let events = collect_until(&mut rx, |e| matches!(e, KernelEvent::InterruptReply(_))).await;
    assert_eq!(
        events.last(),
        Some(&KernelEvent::InterruptReply(InterruptReplyPayload {
            status: json!({"status": "ok"}),
            lang: Language::Racket,
        }))
    );
}

#[tokio::test]
async fn test_startup_output_never_reaches_client() {
    let supervisor = supervisor(Arc::new(MockBackend::new()));
    let (tx, mut rx) = sink();

    // Requesting status spawns the kernel; the only traffic afterwards is
    // the startup script's output and a kernel_info_reply, neither of which
    // is routed.
    let outcome = supervisor
        .dispatch(
            command(
                r#"{"type": "requestKernelStatus", "payload": {"sessionId": "s1", "lang": "python"}}"#,
            ),
            &tx,
        )
        .await;
    assert_eq!(outcome, DispatchOutcome::Dispatched);
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn test_not_ready_reports_starting() {
    let supervisor = Arc::new(supervisor(Arc::new(MockBackend::slow(Duration::from_millis(150)))));
    let spawner = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.get_or_create("s1", Language::Python).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    let (tx, mut rx) = sink();
    let outcome = supervisor
        .dispatch(
            command(
                r#"{"type": "runCode", "payload": {"sessionId": "s1", "lang": "python",
                    "code": "1", "podId": "pod1"}}"#,
            ),
            &tx,
        )
        .await;

    assert_eq!(outcome, DispatchOutcome::NotReady);
    assert_eq!(next_event(&mut rx).await, KernelEvent::starting(Language::Python));
    spawner.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_spawn_failure_reported_as_error_event() {
    let supervisor = supervisor(Arc::new(MockBackend::failing()));
    let (tx, mut rx) = sink();

    let outcome = supervisor
        .dispatch(
            command(
                r#"{"type": "runCode", "payload": {"sessionId": "s1", "lang": "python",
                    "code": "1", "podId": "pod9"}}"#,
            ),
            &tx,
        )
        .await;

    assert_eq!(outcome, DispatchOutcome::Failed);
    match next_event(&mut rx).await {
        KernelEvent::Error(p) => {
            assert_eq!(p.ename, "KernelUnavailable");
            assert_eq!(p.element_id.as_deref(), Some("pod9"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_adapter_input_reported() {
    let supervisor = supervisor(Arc::new(MockBackend::new()));
    let (tx, mut rx) = sink();

    let outcome = supervisor
        .dispatch(
            command(
                r#"{"type": "deleteImport", "payload": {"sessionId": "s1", "lang": "python",
                    "id": "pod5", "ns": "app", "name": ""}}"#,
            ),
            &tx,
        )
        .await;

    assert_eq!(outcome, DispatchOutcome::Failed);
    match next_event(&mut rx).await {
        KernelEvent::Error(p) => assert_eq!(p.ename, "InvalidAdapterInput"),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_delete_midport_sent_to_javascript() {
    let backend = Arc::new(MockBackend::new());
    let supervisor = supervisor(Arc::clone(&backend));
    let (tx, mut rx) = sink();

    let outcome = supervisor
        .dispatch(
            command(
                r#"{"type": "deleteMidport", "payload": {"sessionId": "s1", "lang": "javascript",
                    "id": "pod6", "ns": "app", "name": "f"}}"#,
            ),
            &tx,
        )
        .await;
    assert_eq!(outcome, DispatchOutcome::Dispatched);
    collect_execution(&mut rx).await;

    let requests = backend
        .requests(&KernelKey::new("s1", Language::JavaScript))
        .await;
    let (_, delete) = requests.last().expect("delete request");
    assert_eq!(delete.header.msg_id, "pod6");
    assert_eq!(delete.content["code"], r#"CODEPOD_DELETE_NAMES("app", ["f"])"#);
    assert_eq!(delete.content["store_history"], false);
}

#[tokio::test]
async fn test_delete_midport_rejected_outside_javascript() {
    let supervisor = supervisor(Arc::new(MockBackend::new()));
    let (tx, mut rx) = sink();

    let outcome = supervisor
        .dispatch(
            command(
                r#"{"type": "deleteMidport", "payload": {"sessionId": "s1", "lang": "python",
                    "id": "pod7", "ns": "app", "name": "f"}}"#,
            ),
            &tx,
        )
        .await;

    assert_eq!(outcome, DispatchOutcome::Failed);
    match next_event(&mut rx).await {
        KernelEvent::Error(p) => {
            assert_eq!(p.ename, "InvalidAdapterInput");
            assert_eq!(p.element_id.as_deref(), Some("pod7"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_ping_ignored() {
    let backend = Arc::new(MockBackend::new());
    let supervisor = supervisor(Arc::clone(&backend));
    let (tx, mut rx) = sink();

    let outcome = supervisor.dispatch(command(r#"{"type": "ping"}"#), &tx).await;
    assert_eq!(outcome, DispatchOutcome::Ignored);
    assert_eq!(backend.start_count(), 0);
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn test_latest_subscriber_wins() {
    let supervisor = supervisor(Arc::new(MockBackend::new()));
    let (first_tx, mut first_rx) = sink();
    let (second_tx, mut second_rx) = sink();

    let run = |pod: &str| {
        command(&format!(
            r#"{{"type": "runCode", "payload": {{"sessionId": "s1", "lang": "python",
                "code": "1", "podId": "{pod}"}}}}"#
        ))
    };

    supervisor.dispatch(run("pod1"), &first_tx).await;
    collect_execution(&mut first_rx).await;

    supervisor.dispatch(run("pod2"), &second_tx).await;
    let events = collect_execution(&mut second_rx).await;
    assert!(events.iter().any(|e| e.element_id() == Some("pod2")));
    assert_quiet(&mut first_rx).await;
}

#[tokio::test]
async fn test_kill_kernel_command() {
    let backend = Arc::new(MockBackend::new());
    let supervisor = supervisor(Arc::clone(&backend));
    let (tx, _rx) = sink();

    supervisor.get_or_create("s1", Language::Python).await.unwrap();
    let outcome = supervisor
        .dispatch(
            command(r#"{"type": "killKernel", "payload": {"sessionId": "s1", "lang": "python"}}"#),
            &tx,
        )
        .await;

    assert_eq!(outcome, DispatchOutcome::Dispatched);
    assert!(!backend.is_running(&KernelKey::new("s1", Language::Python)).await);
}

#[tokio::test]
async fn test_stale_reply_after_shutdown_is_dropped() {
    let key = wire::SigningKey::new(b"stale");
    let (transport, mut engine) = memory::loopback(Some(key.clone()));
    let kernel = KernelInstance::start(KernelKey::new("s1", Language::Python), transport).unwrap();
    let (tx, mut rx) = sink();
    kernel.attach_subscriber(tx);

    kernel.evaluate("pod1", "1", "", &[]).unwrap();
    let request = wire::decode(engine.shell.recv_frames().await.unwrap(), Some(&key)).unwrap();

    kernel.shutdown();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let late = request.child("execute_result", json!({"data": {}, "execution_count": 1}));
    let _ = engine
        .iopub
        .send_frames(wire::encode(&late, Some(&key)).unwrap())
        .await;

    assert_quiet(&mut rx).await;
}
