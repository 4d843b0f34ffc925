//! In-process mock backend.
//!
//! Each kernel is a small scripted engine on the far side of a loopback
//! transport. It speaks the wire protocol well enough to exercise the whole
//! stack:
//!
//! - `execute_request`: status `busy`, then an `error` if the code contains
//!   `raise`, a stdout `stream` if it contains `print`, otherwise an
//!   `execute_result` echoing the code; then status `idle` and an
//!   `execute_reply`.
//! - `kernel_info_request`: `kernel_info_reply`.
//! - `interrupt_request` on control: `interrupt_reply`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde_json::json;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::KernelBackend;
use crate::error::{Error, Result};
use crate::kernel::KernelKey;
use crate::transport::memory::{self, EngineSockets, MemorySocket};
use crate::transport::{Channel, FrameSocket, KernelTransport};
use crate::wire::{self, MessageType, SigningKey, WireMessage};

type RequestLog = Arc<Mutex<Vec<(Channel, WireMessage)>>>;

struct MockEngine {
    task: JoinHandle<()>,
    requests: RequestLog,
}

pub struct MockBackend {
    key: Option<SigningKey>,
    /// Delay before `start` returns.
    pub start_delay: Duration,
    /// If true, every `start` fails.
    pub fail_starts: bool,
    /// Delay before `release` tears the engine down.
    pub release_delay: Duration,
    starts: AtomicUsize,
    releases: AtomicUsize,
    engines: Mutex<FxHashMap<KernelKey, MockEngine>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            key: Some(SigningKey::new(b"mock-kernel-key")),
            start_delay: Duration::ZERO,
            fail_starts: false,
            release_delay: Duration::ZERO,
            starts: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            engines: Mutex::new(FxHashMap::default()),
        }
    }

    /// A backend whose kernels take `delay` to start.
    pub fn slow(delay: Duration) -> Self {
        Self {
            start_delay: delay,
            ..Self::new()
        }
    }

    /// A backend that never manages to start a kernel.
    pub fn failing() -> Self {
        Self {
            fail_starts: true,
            ..Self::new()
        }
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub async fn is_running(&self, key: &KernelKey) -> bool {
        self.engines.lock().await.contains_key(key)
    }

    /// Every request the engine for `key` has received, in order.
    pub async fn requests(&self, key: &KernelKey) -> Vec<(Channel, WireMessage)> {
        let log = match self.engines.lock().await.get(key) {
            Some(engine) => Arc::clone(&engine.requests),
            None => return Vec::new(),
        };
        log.lock().await.clone()
    }
}

#[async_trait]
impl KernelBackend for MockBackend {
    fn backend_type(&self) -> &'static str {
        "mock"
    }

    async fn start(&self, key: &KernelKey) -> Result<KernelTransport> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if !self.start_delay.is_zero() {
            tokio::time::sleep(self.start_delay).await;
        }
        if self.fail_starts {
            return Err(Error::spawn(key, "mock backend configured to fail"));
        }

        let (transport, sockets) = memory::loopback(self.key.clone());
        let requests = RequestLog::default();
        let task = tokio::spawn(run_engine(
            sockets,
            self.key.clone(),
            Arc::clone(&requests),
        ));
        if let Some(previous) = self
            .engines
            .lock()
            .await
            .insert(key.clone(), MockEngine { task, requests })
        {
            previous.task.abort();
        }
        Ok(transport)
    }

    async fn release(&self, key: &KernelKey) -> Result<()> {
        if !self.release_delay.is_zero() {
            tokio::time::sleep(self.release_delay).await;
        }
        if let Some(engine) = self.engines.lock().await.remove(key) {
            engine.task.abort();
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

async fn emit(socket: &mut MemorySocket, message: &WireMessage, key: Option<&SigningKey>) -> Result<()> {
    socket.send_frames(wire::encode(message, key)?).await
}

async fn run_engine(sockets: EngineSockets, key: Option<SigningKey>, requests: RequestLog) {
    let EngineSockets {
        mut shell,
        mut control,
        mut iopub,
    } = sockets;
    let mut execution_count = 0u64;

    loop {
        let (channel, frames) = tokio::select! {
            frames = shell.recv_frames() => (Channel::Shell, frames),
            frames = control.recv_frames() => (Channel::Control, frames),
        };
        let Ok(frames) = frames else {
            break;
        };
        let Ok(request) = wire::decode(frames, key.as_ref()) else {
            continue;
        };
        requests.lock().await.push((channel, request.clone()));

        let result = match request.msg_type() {
            MessageType::ExecuteRequest => {
                execute(&request, &mut execution_count, &mut shell, &mut iopub, key.as_ref()).await
            }
            MessageType::KernelInfoRequest => {
                let reply = request.child(
                    "kernel_info_reply",
                    json!({
                        "status": "ok",
                        "protocol_version": wire::PROTOCOL_VERSION,
                        "implementation": "mock",
                    }),
                );
                emit(&mut shell, &reply, key.as_ref()).await
            }
            MessageType::InterruptRequest => {
                let reply = request.child("interrupt_reply", json!({"status": "ok"}));
                emit(&mut control, &reply, key.as_ref()).await
            }
            _ => Ok(()),
        };
        if result.is_err() {
            break;
        }
    }
}

async fn execute(
    request: &WireMessage,
    execution_count: &mut u64,
    shell: &mut MemorySocket,
    iopub: &mut MemorySocket,
    key: Option<&SigningKey>,
) -> Result<()> {
    let code = request.content["code"].as_str().unwrap_or_default();
    if request.content["store_history"].as_bool().unwrap_or(false) {
        *execution_count += 1;
    }
    let count = *execution_count;

    emit(iopub, &request.child("status", json!({"execution_state": "busy"})), key).await?;

    let status = if code.contains("raise") {
        let error = request.child(
            "error",
            json!({"ename": "MockError", "evalue": "raised by request", "traceback": [code]}),
        );
        emit(iopub, &error, key).await?;
        "error"
    } else if code.contains("print") {
        let stream = request.child("stream", json!({"name": "stdout", "text": code}));
        emit(iopub, &stream, key).await?;
        "ok"
    } else {
        let result = request.child(
            "execute_result",
            json!({"data": {"text/plain": code}, "metadata": {}, "execution_count": count}),
        );
        emit(iopub, &result, key).await?;
        "ok"
    };

    emit(iopub, &request.child("status", json!({"execution_state": "idle"})), key).await?;
    let reply = request.child(
        "execute_reply",
        json!({"status": status, "execution_count": count}),
    );
    emit(shell, &reply, key).await
}
