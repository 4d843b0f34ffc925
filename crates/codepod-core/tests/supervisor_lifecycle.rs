//! Integration tests for kernel registry lifecycle.

mod common;

use std::sync::Arc;
use std::time::Duration;

use codepod_core::{Error, KernelBackend, KernelKey, KernelState, Language, MockBackend};
use codepod_core::transport::Channel;

use common::supervisor;

#[tokio::test]
async fn test_concurrent_callers_spawn_once() {
    let backend = Arc::new(MockBackend::slow(Duration::from_millis(100)));
    let supervisor = Arc::new(supervisor(Arc::clone(&backend)));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let supervisor = Arc::clone(&supervisor);
        handles.push(tokio::spawn(async move {
            supervisor.get_or_create("s1", Language::Python).await
        }));
    }

    let mut ready = Vec::new();
    let mut pending = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            Some(kernel) => ready.push(kernel),
            None => pending += 1,
        }
    }

    assert_eq!(ready.len(), 1);
    assert_eq!(pending, 7);
    assert_eq!(backend.start_count(), 1);

    let again = supervisor
        .get_or_create("s1", Language::Python)
        .await
        .unwrap()
        .unwrap();
    assert!(Arc::ptr_eq(&again, &ready[0]));
    assert_eq!(again.state(), KernelState::Ready);
}

#[tokio::test]
async fn test_spawning_kernel_reported_in_list() {
    let backend = Arc::new(MockBackend::slow(Duration::from_millis(200)));
    let supervisor = Arc::new(supervisor(Arc::clone(&backend)));

    let spawner = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.get_or_create("s1", Language::Julia).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let kernels = supervisor.list_kernels().await;
    assert_eq!(kernels.len(), 1);
    assert_eq!(kernels[0].state, KernelState::Spawning);

    spawner.await.unwrap().unwrap().unwrap();
    assert_eq!(supervisor.list_kernels().await[0].state, KernelState::Ready);
}

#[tokio::test]
async fn test_different_languages_get_different_kernels() {
    let backend = Arc::new(MockBackend::new());
    let supervisor = supervisor(Arc::clone(&backend));

    let python = supervisor.get_or_create("s1", Language::Python).await.unwrap().unwrap();
    let racket = supervisor.get_or_create("s1", Language::Racket).await.unwrap().unwrap();
    let other = supervisor.get_or_create("s2", Language::Python).await.unwrap().unwrap();

    assert!(!Arc::ptr_eq(&python, &racket));
    assert!(!Arc::ptr_eq(&python, &other));
    assert_eq!(backend.start_count(), 3);
}

#[tokio::test]
async fn test_startup_script_sent_with_sentinel() {
    let backend = Arc::new(MockBackend::new());
    let supervisor = supervisor(Arc::clone(&backend));
    supervisor.get_or_create("s1", Language::Python).await.unwrap();

    let key = KernelKey::new("s1", Language::Python);
    let mut requests = Vec::new();
    for _ in 0..50 {
        requests = backend.requests(&key).await;
        if !requests.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let (channel, startup) = &requests[0];
    assert_eq!(*channel, Channel::Shell);
    assert_eq!(startup.header.msg_id, "CODEPOD");
    assert!(
        startup.content["code"]
            .as_str()
            .unwrap()
            .contains("CODEPOD_EVAL")
    );
}

#[tokio::test]
async fn test_spawn_failure_leaves_no_entry() {
    let backend = Arc::new(MockBackend::failing());
    let supervisor = supervisor(Arc::clone(&backend));

    let err = supervisor
        .get_or_create("s1", Language::Python)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Spawn { .. }));
    assert!(supervisor.list_kernels().await.is_empty());

    assert!(supervisor.get_or_create("s1", Language::Python).await.is_err());
    assert_eq!(backend.start_count(), 2);
}

#[tokio::test]
async fn test_empty_session_rejected() {
    let backend = Arc::new(MockBackend::new());
    let supervisor = supervisor(Arc::clone(&backend));

    assert!(matches!(
        supervisor.get_or_create("", Language::Python).await,
        Err(Error::InvalidAdapterInput(_))
    ));
    assert_eq!(backend.start_count(), 0);
}

#[tokio::test]
async fn test_kill_is_idempotent() {
    let backend = Arc::new(MockBackend::new());
    let supervisor = supervisor(Arc::clone(&backend));
    let kernel = supervisor
        .get_or_create("s1", Language::Python)
        .await
        .unwrap()
        .unwrap();

    assert!(supervisor.kill("s1", Language::Python).await.unwrap());
    assert_eq!(kernel.state(), KernelState::Dead);
    assert_eq!(backend.release_count(), 1);
    assert!(!backend.is_running(&KernelKey::new("s1", Language::Python)).await);
    assert!(supervisor.list_kernels().await.is_empty());

    assert!(!supervisor.kill("s1", Language::Python).await.unwrap());
    assert_eq!(backend.release_count(), 1);
}

#[tokio::test]
async fn test_kill_holds_key_until_released() {
    let mut backend = MockBackend::new();
    backend.release_delay = Duration::from_millis(100);
    let backend = Arc::new(backend);
    let supervisor = Arc::new(supervisor(Arc::clone(&backend)));
    supervisor.get_or_create("s1", Language::Python).await.unwrap();

    let kill = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.kill("s1", Language::Python).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(supervisor.get_or_create("s1", Language::Python).await.unwrap().is_none());
    let listed = supervisor.list_kernels().await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].state, KernelState::Dead);

    assert!(kill.await.unwrap().unwrap());
    assert_eq!(backend.start_count(), 1);

    let fresh = supervisor
        .get_or_create("s1", Language::Python)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fresh.state(), KernelState::Ready);
    assert!(backend.is_running(&KernelKey::new("s1", Language::Python)).await);
    assert_eq!(backend.start_count(), 2);
}

#[tokio::test]
async fn test_spawn_failure_holds_key_until_released() {
    let mut backend = MockBackend::failing();
    backend.release_delay = Duration::from_millis(100);
    let backend = Arc::new(backend);
    let supervisor = Arc::new(supervisor(Arc::clone(&backend)));

    let first = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.get_or_create("s1", Language::Python).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(supervisor.get_or_create("s1", Language::Python).await.unwrap().is_none());
    assert!(matches!(first.await.unwrap(), Err(Error::Spawn { .. })));
    assert_eq!(backend.start_count(), 1);
    assert!(supervisor.list_kernels().await.is_empty());
}

#[tokio::test]
async fn test_kill_session_only_touches_that_session() {
    let backend = Arc::new(MockBackend::new());
    let supervisor = supervisor(Arc::clone(&backend));
    for (session, language) in [
        ("s1", Language::Python),
        ("s1", Language::JavaScript),
        ("s2", Language::Python),
    ] {
        supervisor.get_or_create(session, language).await.unwrap();
    }

    assert_eq!(supervisor.kill_session("s1").await.unwrap(), 2);

    let remaining = supervisor.list_kernels().await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].session_id, "s2");
}

#[tokio::test]
async fn test_dead_kernel_is_replaced() {
    let backend = Arc::new(MockBackend::new());
    let supervisor = supervisor(Arc::clone(&backend));
    let first = supervisor
        .get_or_create("s1", Language::Python)
        .await
        .unwrap()
        .unwrap();

    // Kill the engine behind the supervisor's back.
    backend
        .release(&KernelKey::new("s1", Language::Python))
        .await
        .unwrap();
    let mut state = first.subscribe_state();
    tokio::time::timeout(
        Duration::from_secs(2),
        state.wait_for(|s| *s == KernelState::Dead),
    )
    .await
    .unwrap()
    .unwrap();

    let second = supervisor
        .get_or_create("s1", Language::Python)
        .await
        .unwrap()
        .unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(second.state(), KernelState::Ready);
    assert_eq!(backend.start_count(), 2);
}

#[tokio::test]
async fn test_shutdown_kills_everything() {
    let backend = Arc::new(MockBackend::new());
    let supervisor = supervisor(Arc::clone(&backend));
    supervisor.get_or_create("s1", Language::Python).await.unwrap();
    supervisor.get_or_create("s2", Language::Julia).await.unwrap();

    supervisor.shutdown().await;

    assert!(supervisor.list_kernels().await.is_empty());
    assert_eq!(backend.release_count(), 2);
}
