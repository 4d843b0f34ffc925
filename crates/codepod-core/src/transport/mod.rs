//! Kernel channel transport.
//!
//! A kernel is reached over three channels: shell (requests and replies),
//! control (interrupts) and IOPub (broadcast outputs). Each channel is driven
//! by its own task that owns the socket, so sends and receives on the same
//! socket never race. Decoded messages from all channels are merged into a
//! single event stream that exactly one listener consumes.

pub mod memory;
mod zmq;

use std::fmt;
use std::future::Future;

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub use zmq::connect;

use crate::error::{Error, Result};
use crate::wire::{self, SigningKey, WireMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Shell,
    Control,
    IOPub,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Shell => "shell",
            Channel::Control => "control",
            Channel::IOPub => "iopub",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Connected,
    Closed,
}

/// A socket that moves whole multipart messages.
pub trait FrameSocket: Send + 'static {
    fn send_frames(&mut self, frames: Vec<Bytes>) -> impl Future<Output = Result<()>> + Send;

    fn recv_frames(&mut self) -> impl Future<Output = Result<Vec<Bytes>>> + Send;
}

/// Something that happened on one of a kernel's channels.
#[derive(Debug)]
pub enum TransportEvent {
    Message {
        channel: Channel,
        message: WireMessage,
    },
    /// The channel's socket failed; no further messages will arrive on it.
    Disconnected { channel: Channel, reason: String },
}

/// The three channels of one kernel.
#[derive(Debug)]
pub struct KernelTransport {
    session: String,
    key: Option<SigningKey>,
    shell_tx: mpsc::UnboundedSender<Vec<Bytes>>,
    control_tx: mpsc::UnboundedSender<Vec<Bytes>>,
    events: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    states: [watch::Receiver<ChannelState>; 3],
    tasks: Vec<JoinHandle<()>>,
}

impl KernelTransport {
    /// Start channel tasks over already connected sockets.
    pub fn start<S, C, I>(shell: S, control: C, iopub: I, key: Option<SigningKey>) -> Self
    where
        S: FrameSocket,
        C: FrameSocket,
        I: FrameSocket,
    {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shell_tx, shell_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        let (shell_state, shell_state_rx) = watch::channel(ChannelState::Connecting);
        let (control_state, control_state_rx) = watch::channel(ChannelState::Connecting);
        let (iopub_state, iopub_state_rx) = watch::channel(ChannelState::Connecting);

        let tasks = vec![
            tokio::spawn(run_channel(
                Channel::Shell,
                shell,
                key.clone(),
                Some(shell_rx),
                events_tx.clone(),
                shell_state,
            )),
            tokio::spawn(run_channel(
                Channel::Control,
                control,
                key.clone(),
                Some(control_rx),
                events_tx.clone(),
                control_state,
            )),
            tokio::spawn(run_channel(
                Channel::IOPub,
                iopub,
                key.clone(),
                None,
                events_tx,
                iopub_state,
            )),
        ];

        Self {
            session: uuid::Uuid::new_v4().to_string(),
            key,
            shell_tx,
            control_tx,
            events: Some(events_rx),
            states: [shell_state_rx, control_state_rx, iopub_state_rx],
            tasks,
        }
    }

    /// Client session id stamped on outbound messages.
    pub fn session(&self) -> &str {
        &self.session
    }

    /// Encode and queue a message on the shell or control channel.
    pub fn send(&self, channel: Channel, mut message: WireMessage) -> Result<()> {
        let tx = match channel {
            Channel::Shell => &self.shell_tx,
            Channel::Control => &self.control_tx,
            Channel::IOPub => {
                return Err(Error::Transport {
                    channel: channel.to_string(),
                    message: "iopub is receive-only".to_string(),
                });
            }
        };

        if message.header.session.is_empty() {
            message.header.session = self.session.clone();
        }
        debug!(
            "Sending {} {} on {}",
            message.header.msg_type, message.header.msg_id, channel
        );
        let frames = wire::encode(&message, self.key.as_ref())?;
        tx.send(frames)
            .map_err(|_| Error::ChannelClosed(channel.to_string()))
    }

    /// Take the merged inbound event stream.
    ///
    /// Only one listener may exist; a second call fails with
    /// [`Error::ListenerActive`].
    pub fn take_events(&mut self) -> Result<mpsc::UnboundedReceiver<TransportEvent>> {
        self.events.take().ok_or(Error::ListenerActive)
    }

    pub fn state(&self, channel: Channel) -> ChannelState {
        let index = match channel {
            Channel::Shell => 0,
            Channel::Control => 1,
            Channel::IOPub => 2,
        };
        *self.states[index].borrow()
    }

    /// Stop all channel tasks. Idempotent.
    pub fn close(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl Drop for KernelTransport {
    fn drop(&mut self) {
        self.close();
    }
}

async fn next_outbound(outbound: &mut Option<mpsc::UnboundedReceiver<Vec<Bytes>>>) -> Option<Vec<Bytes>> {
    match outbound {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn run_channel<S: FrameSocket>(
    channel: Channel,
    mut socket: S,
    key: Option<SigningKey>,
    mut outbound: Option<mpsc::UnboundedReceiver<Vec<Bytes>>>,
    events: mpsc::UnboundedSender<TransportEvent>,
    state: watch::Sender<ChannelState>,
) {
    state.send_replace(ChannelState::Connected);

    let reason = loop {
        tokio::select! {
            frames = next_outbound(&mut outbound) => {
                let Some(frames) = frames else {
                    break "transport dropped".to_string();
                };
                if let Err(e) = socket.send_frames(frames).await {
                    break e.to_string();
                }
            }
            received = socket.recv_frames() => {
                let frames = match received {
                    Ok(frames) => frames,
                    Err(e) => break e.to_string(),
                };
                match wire::decode(frames, key.as_ref()) {
                    Ok(message) => {
                        if events.send(TransportEvent::Message { channel, message }).is_err() {
                            break "listener dropped".to_string();
                        }
                    }
                    Err(Error::BadSignature) => {
                        warn!("Dropping message with bad signature on {}", channel);
                    }
                    Err(e) => {
                        warn!("Dropping undecodable message on {}: {}", channel, e);
                    }
                }
            }
        }
    };

    debug!("Channel {} closed: {}", channel, reason);
    state.send_replace(ChannelState::Closed);
    let _ = events.send(TransportEvent::Disconnected { channel, reason });
}
