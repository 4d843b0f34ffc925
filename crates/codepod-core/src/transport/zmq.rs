//! ZeroMQ sockets.

use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;
use tracing::{debug, info};
use zeromq::{DealerSocket, Socket, SocketRecv, SocketSend, SubSocket, ZmqMessage};

use super::{Channel, FrameSocket, KernelTransport};
use crate::connection::ConnectionInfo;
use crate::error::{Error, Result};

const RETRY_INTERVAL: Duration = Duration::from_millis(200);

fn zmq_error(e: impl std::fmt::Display) -> Error {
    Error::Transport {
        channel: "zmq".to_string(),
        message: e.to_string(),
    }
}

impl FrameSocket for DealerSocket {
    async fn send_frames(&mut self, frames: Vec<Bytes>) -> Result<()> {
        let message = ZmqMessage::try_from(frames).map_err(zmq_error)?;
        self.send(message).await.map_err(zmq_error)
    }

    async fn recv_frames(&mut self) -> Result<Vec<Bytes>> {
        let message = self.recv().await.map_err(zmq_error)?;
        Ok(message.iter().cloned().collect())
    }
}

impl FrameSocket for SubSocket {
    async fn send_frames(&mut self, _frames: Vec<Bytes>) -> Result<()> {
        Err(zmq_error("subscriber sockets cannot send"))
    }

    async fn recv_frames(&mut self) -> Result<Vec<Bytes>> {
        let message = self.recv().await.map_err(zmq_error)?;
        Ok(message.iter().cloned().collect())
    }
}

/// Connect `socket` to `endpoint`, retrying until `deadline`.
///
/// A freshly spawned kernel needs a moment before it binds its ports.
async fn connect_with_retry<S: Socket + Send>(
    socket: &mut S,
    channel: Channel,
    endpoint: &str,
    deadline: Instant,
) -> Result<()> {
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        let error = match tokio::time::timeout_at(deadline, socket.connect(endpoint)).await {
            Ok(Ok(())) => {
                debug!("Connected {} to {} after {} attempt(s)", channel, endpoint, attempts);
                return Ok(());
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => "timed out".to_string(),
        };
        if Instant::now() + RETRY_INTERVAL >= deadline {
            return Err(Error::Transport {
                channel: channel.to_string(),
                message: format!("could not connect to {endpoint}: {error}"),
            });
        }
        debug!("Connecting {} to {} failed: {}; retrying", channel, endpoint, error);
        tokio::time::sleep(RETRY_INTERVAL).await;
    }
}

/// Connect all three channels of the kernel described by `info`.
///
/// Succeeds only once shell, control and IOPub are all connected; gives up
/// after `timeout`.
pub async fn connect(info: &ConnectionInfo, timeout: Duration) -> Result<KernelTransport> {
    let deadline = Instant::now() + timeout;

    let mut shell = DealerSocket::new();
    connect_with_retry(&mut shell, Channel::Shell, &info.endpoint(Channel::Shell), deadline).await?;

    let mut control = DealerSocket::new();
    connect_with_retry(
        &mut control,
        Channel::Control,
        &info.endpoint(Channel::Control),
        deadline,
    )
    .await?;

    let mut iopub = SubSocket::new();
    connect_with_retry(&mut iopub, Channel::IOPub, &info.endpoint(Channel::IOPub), deadline).await?;
    iopub.subscribe("").await.map_err(|e| Error::Transport {
        channel: Channel::IOPub.to_string(),
        message: format!("subscribe failed: {e}"),
    })?;

    info!("Connected to kernel at {}", info.ip);
    Ok(KernelTransport::start(shell, control, iopub, info.signing_key()))
}
