//! A running kernel.
//!
//! Owns the kernel's transport, turns client intents into execute requests
//! through the language adapter, and pumps engine messages through the
//! router to whichever client is attached.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::event::KernelEvent;
use crate::lang::{Language, LanguageAdapter};
use crate::router::MessageRouter;
use crate::transport::{Channel, KernelTransport, TransportEvent};
use crate::wire::{CorrelationId, WireMessage};

/// Where outward events for a kernel are delivered.
pub type EventSink = mpsc::UnboundedSender<KernelEvent>;

/// Registry key: one kernel per (session, language).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KernelKey {
    pub session_id: String,
    pub language: Language,
}

impl KernelKey {
    pub fn new(session_id: impl Into<String>, language: Language) -> Self {
        Self {
            session_id: session_id.into(),
            language,
        }
    }
}

impl fmt::Display for KernelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.session_id, self.language)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelState {
    /// Transport up, startup script not yet sent.
    Spawning,
    Ready,
    /// A channel failed or the kernel was shut down.
    Dead,
}

pub struct KernelInstance {
    key: KernelKey,
    adapter: &'static dyn LanguageAdapter,
    transport: KernelTransport,
    subscriber: watch::Sender<Option<EventSink>>,
    state: Arc<watch::Sender<KernelState>>,
    pump: JoinHandle<()>,
}

impl KernelInstance {
    /// Take over `transport` and start delivering its events.
    ///
    /// # Errors
    /// [`crate::Error::ListenerActive`] if the transport's events were
    /// already taken.
    pub fn start(key: KernelKey, mut transport: KernelTransport) -> Result<Self> {
        let events = transport.take_events()?;
        let (subscriber, subscriber_rx) = watch::channel(None);
        let state = Arc::new(watch::Sender::new(KernelState::Spawning));

        let pump = tokio::spawn(pump_events(
            key.clone(),
            MessageRouter::new(key.language),
            events,
            subscriber_rx,
            Arc::clone(&state),
        ));

        Ok(Self {
            adapter: key.language.adapter(),
            key,
            transport,
            subscriber,
            state,
            pump,
        })
    }

    pub fn key(&self) -> &KernelKey {
        &self.key
    }

    pub fn language(&self) -> Language {
        self.key.language
    }

    pub fn state(&self) -> KernelState {
        *self.state.borrow()
    }

    /// Watch state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<KernelState> {
        self.state.subscribe()
    }

    pub(crate) fn mark_ready(&self) {
        self.state.send_if_modified(|state| {
            if *state == KernelState::Spawning {
                *state = KernelState::Ready;
                true
            } else {
                false
            }
        });
    }

    /// Deliver future events to `sink`, replacing any previous subscriber.
    pub fn attach_subscriber(&self, sink: EventSink) {
        self.subscriber.send_replace(Some(sink));
    }

    pub fn has_subscriber(&self) -> bool {
        self.subscriber
            .borrow()
            .as_ref()
            .is_some_and(|sink| !sink.is_closed())
    }

    /// Send the startup script under the startup sentinel.
    pub fn run_startup(&self, script: &str) -> Result<()> {
        debug!("Sending startup script to {}", self.key);
        self.execute(script, &CorrelationId::startup(), false)
    }

    /// Evaluate `code` in `namespace`, attributing output to `element_id`.
    pub fn evaluate(
        &self,
        element_id: &str,
        code: &str,
        namespace: &str,
        exports: &[String],
    ) -> Result<()> {
        let source = self
            .adapter
            .build_evaluate_with_exports(code, namespace, exports)?;
        self.execute(&source, &CorrelationId::primary(element_id), true)
    }

    /// Send `code` without namespace wrapping.
    pub fn evaluate_raw(&self, element_id: &str, code: &str) -> Result<()> {
        self.execute(code, &CorrelationId::primary(element_id), true)
    }

    pub fn add_import(&self, element_id: &str, from: &str, to: &str, name: &str) -> Result<()> {
        let source = self.adapter.build_add_import(from, to, name)?;
        self.execute(
            &source,
            &CorrelationId::with_sub_channel(element_id, name),
            false,
        )
    }

    pub fn add_import_namespace(
        &self,
        element_id: &str,
        namespaces: &[String],
        to: &str,
    ) -> Result<()> {
        let source = self.adapter.build_add_import_namespace(namespaces, to)?;
        self.execute(&source, &CorrelationId::primary(element_id), false)
    }

    pub fn delete_import(&self, element_id: &str, namespace: &str, name: &str) -> Result<()> {
        let source = self.adapter.build_delete_import(namespace, name)?;
        self.execute(
            &source,
            &CorrelationId::with_sub_channel(element_id, name),
            false,
        )
    }

    /// Drop `name` from the exports of `namespace`.
    pub fn delete_export(&self, element_id: &str, namespace: &str, name: &str) -> Result<()> {
        let source = self.adapter.build_delete_export(namespace, name)?;
        self.execute(&source, &CorrelationId::primary(element_id), false)
    }

    /// Ensure each of `names` is bound in `to`, one request per name.
    ///
    /// Every name is validated before anything is sent.
    pub fn ensure_imports(
        &self,
        element_id: &str,
        from: &str,
        to: &str,
        names: &[String],
    ) -> Result<()> {
        let requests = names
            .iter()
            .map(|name| {
                self.adapter
                    .build_ensure_import(from, to, name)
                    .map(|source| (source, CorrelationId::with_sub_channel(element_id, name)))
            })
            .collect::<Result<Vec<_>>>()?;

        for (source, correlation) in requests {
            self.execute(&source, &correlation, false)?;
        }
        Ok(())
    }

    /// Ask the kernel for its info; the reply is only logged.
    pub fn request_status(&self) -> Result<()> {
        self.transport
            .send(Channel::Shell, WireMessage::kernel_info_request())
    }

    /// Interrupt the running evaluation. The reply arrives as an
    /// `interrupt_reply` event.
    pub fn interrupt(&self) -> Result<()> {
        info!("Interrupting {}", self.key);
        self.transport
            .send(Channel::Control, WireMessage::interrupt_request())
    }

    /// Stop the event pump and close the transport. Idempotent.
    pub fn shutdown(&self) {
        self.pump.abort();
        self.transport.close();
        self.subscriber.send_replace(None);
        self.state.send_replace(KernelState::Dead);
    }

    fn execute(&self, code: &str, correlation: &CorrelationId, store_history: bool) -> Result<()> {
        let message = WireMessage::execute_request(code, &correlation.to_string(), store_history);
        self.transport.send(Channel::Shell, message)
    }
}

impl fmt::Debug for KernelInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelInstance")
            .field("key", &self.key)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Drop for KernelInstance {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

async fn pump_events(
    key: KernelKey,
    router: MessageRouter,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    subscriber: watch::Receiver<Option<EventSink>>,
    state: Arc<watch::Sender<KernelState>>,
) {
    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Message { channel, message } => {
                match router.route(channel, &message) {
                    Ok(Some(event)) => {
                        let sink = subscriber.borrow().clone();
                        match sink {
                            Some(sink) => {
                                if sink.send(event).is_err() {
                                    debug!("Subscriber for {} went away", key);
                                }
                            }
                            None => debug!("No subscriber for {}; dropping {}", key, event.event_type()),
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Dropping {} from {}: {}", message.header.msg_type, key, e),
                }
            }
            TransportEvent::Disconnected { channel, reason } => {
                warn!("Kernel {} lost its {} channel: {}", key, channel, reason);
                state.send_replace(KernelState::Dead);
                break;
            }
        }
    }
}
