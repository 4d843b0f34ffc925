//! Shared helpers for supervisor integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use codepod_core::{
    ClientCommand, EventSink, KernelBackend, KernelEvent, MockBackend, SessionSupervisor,
    SupervisorConfig,
};
use tokio::sync::mpsc;

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

pub fn supervisor(backend: Arc<MockBackend>) -> SessionSupervisor {
    let backend: Arc<dyn KernelBackend> = backend;
    SessionSupervisor::new(backend, SupervisorConfig::default())
}

pub fn sink() -> (EventSink, mpsc::UnboundedReceiver<KernelEvent>) {
    mpsc::unbounded_channel()
}

pub fn command(json: &str) -> ClientCommand {
    serde_json::from_str(json).expect("valid command")
}

pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<KernelEvent>) -> KernelEvent {
    tokio::time::timeout(EVENT_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event stream closed")
}

/// Collect events until `done` returns true for one of them (inclusive).
pub async fn collect_until<F>(
    rx: &mut mpsc::UnboundedReceiver<KernelEvent>,
    mut done: F,
) -> Vec<KernelEvent>
where
    F: FnMut(&KernelEvent) -> bool,
{
    let mut events = Vec::new();
    loop {
        let event = next_event(rx).await;
        let finished = done(&event);
        events.push(event);
        if finished {
            return events;
        }
    }
}

/// Events of one execution: everything up to both the idle status and the
/// execute reply.
pub async fn collect_execution(rx: &mut mpsc::UnboundedReceiver<KernelEvent>) -> Vec<KernelEvent> {
    let mut idle = false;
    let mut replied = false;
    collect_until(rx, |event| {
        match event {
            KernelEvent::Status(p) if p.status == "idle" => idle = true,
            KernelEvent::ExecuteReply(_) | KernelEvent::IoExecuteReply(_) => replied = true,
            _ => {}
        }
        idle && replied
    })
    .await
}

/// Assert no event arrives within a short window.
pub async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<KernelEvent>) {
    match tokio::time::timeout(Duration::from_millis(100), rx.recv()).await {
        Ok(Some(event)) => panic!("unexpected event {event:?}"),
        Ok(None) | Err(_) => {}
    }
}
