//! In-process sockets.
//!
//! Lets a kernel transport talk to an engine living in the same process,
//! which is how the mock backend and the tests drive the full stack without
//! a real kernel.

use bytes::Bytes;
use tokio::sync::mpsc;

use super::{FrameSocket, KernelTransport};
use crate::error::{Error, Result};
use crate::wire::SigningKey;

/// One end of an in-memory duplex socket.
#[derive(Debug)]
pub struct MemorySocket {
    tx: mpsc::UnboundedSender<Vec<Bytes>>,
    rx: mpsc::UnboundedReceiver<Vec<Bytes>>,
}

/// Create a connected pair of sockets.
pub fn pair() -> (MemorySocket, MemorySocket) {
    let (a_tx, b_rx) = mpsc::unbounded_channel();
    let (b_tx, a_rx) = mpsc::unbounded_channel();
    (
        MemorySocket { tx: a_tx, rx: a_rx },
        MemorySocket { tx: b_tx, rx: b_rx },
    )
}

impl FrameSocket for MemorySocket {
    async fn send_frames(&mut self, frames: Vec<Bytes>) -> Result<()> {
        self.tx.send(frames).map_err(|_| Error::Transport {
            channel: "memory".to_string(),
            message: "peer closed".to_string(),
        })
    }

    async fn recv_frames(&mut self) -> Result<Vec<Bytes>> {
        self.rx.recv().await.ok_or_else(|| Error::Transport {
            channel: "memory".to_string(),
            message: "peer closed".to_string(),
        })
    }
}

/// The engine's side of a loopback transport.
#[derive(Debug)]
pub struct EngineSockets {
    pub shell: MemorySocket,
    pub control: MemorySocket,
    pub iopub: MemorySocket,
}

/// Create a kernel transport wired to in-memory engine sockets.
///
/// Must be called from within a tokio runtime.
pub fn loopback(key: Option<SigningKey>) -> (KernelTransport, EngineSockets) {
    let (shell, engine_shell) = pair();
    let (control, engine_control) = pair();
    let (iopub, engine_iopub) = pair();

    let transport = KernelTransport::start(shell, control, iopub, key);
    (
        transport,
        EngineSockets {
            shell: engine_shell,
            control: engine_control,
            iopub: engine_iopub,
        },
    )
}
