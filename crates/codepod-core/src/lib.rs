//! Kernel session supervisor for CodePod runtimes.
//!
//! This crate provides:
//! - Jupyter-style multipart wire codec with HMAC signing
//! - Shell, control and IOPub channel transport over ZeroMQ
//! - Language adapters for namespaced evaluation and imports
//! - Native, container and mock kernel backends
//! - Session supervisor with at-most-one kernel per session and language
//! - Message routing from engine replies to client events

pub mod backend;
pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod kernel;
pub mod kernelspec;
pub mod lang;
pub mod lifecycle;
pub mod paths;
pub mod router;
pub mod supervisor;
pub mod transport;
pub mod wire;

pub use backend::{ContainerBackend, KernelBackend, MockBackend, NativeBackend};
pub use command::ClientCommand;
pub use config::{BackendKind, SupervisorConfig};
pub use connection::ConnectionInfo;
pub use error::{Error, Result};
pub use event::KernelEvent;
pub use kernel::{EventSink, KernelInstance, KernelKey, KernelState};
pub use kernelspec::{KernelSpec, KernelSpecIndex};
pub use lang::{Language, LanguageAdapter};
pub use lifecycle::{ContainerDriver, EnsureOutcome, ResourceManager};
pub use paths::RuntimeDirs;
pub use router::MessageRouter;
pub use supervisor::{DispatchOutcome, KernelRegistry, KernelSummary, SessionSupervisor};
pub use transport::{Channel, ChannelState, KernelTransport, TransportEvent};
pub use wire::{CorrelationId, SigningKey, WireMessage};
