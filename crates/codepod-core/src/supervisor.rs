//! Session supervisor.
//!
//! Keeps at most one kernel per (session, language). The first caller for a
//! key installs a spawning marker and starts the kernel; concurrent callers
//! see the marker and get `None` back instead of starting a second kernel.
//! A key stays reserved until its backend resources are released, so a
//! late release never tears down a kernel started after it.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::backend::KernelBackend;
use crate::command::ClientCommand;
use crate::config::SupervisorConfig;
use crate::error::{Error, Result};
use crate::event::KernelEvent;
use crate::kernel::{EventSink, KernelInstance, KernelKey, KernelState};
use crate::lang::Language;

enum Slot {
    Spawning,
    Kernel(Arc<KernelInstance>),
    /// Killed; backend release still in progress.
    Releasing,
}

/// Kernel registry shared by every client of one supervisor.
#[derive(Default)]
pub struct KernelRegistry {
    slots: Mutex<FxHashMap<KernelKey, Slot>>,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

/// One row of [`SessionSupervisor::list_kernels`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KernelSummary {
    pub session_id: String,
    pub language: Language,
    /// `spawning`, `ready` or `dead`.
    pub state: KernelState,
}

/// What [`SessionSupervisor::dispatch`] did with a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Sent to the kernel (or acted on directly).
    Dispatched,
    /// Kernel is still starting; a `starting` status was sent instead.
    NotReady,
    /// An error event was sent to the client.
    Failed,
    /// Nothing to do.
    Ignored,
}

pub struct SessionSupervisor {
    registry: KernelRegistry,
    backend: Arc<dyn KernelBackend>,
    config: SupervisorConfig,
}

impl SessionSupervisor {
    pub fn new(backend: Arc<dyn KernelBackend>, config: SupervisorConfig) -> Self {
        Self::with_registry(KernelRegistry::new(), backend, config)
    }

    pub fn with_registry(
        registry: KernelRegistry,
        backend: Arc<dyn KernelBackend>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            registry,
            backend,
            config,
        }
    }

    pub fn backend_type(&self) -> &'static str {
        self.backend.backend_type()
    }

    /// Get the ready kernel for a session and language, starting it if there
    /// is none.
    ///
    /// Returns `Ok(None)` while another caller is starting the same kernel.
    /// A dead kernel is evicted and replaced.
    ///
    /// # Errors
    /// Spawn failures. The registry is left without an entry for the key.
    pub async fn get_or_create(
        &self,
        session_id: &str,
        language: Language,
    ) -> Result<Option<Arc<KernelInstance>>> {
        if session_id.is_empty() {
            return Err(Error::InvalidAdapterInput(
                "session id must not be empty".to_string(),
            ));
        }
        let key = KernelKey::new(session_id, language);

        let evicted = {
            let mut slots = self.registry.slots.lock().await;
            match slots.get(&key) {
                Some(Slot::Kernel(kernel)) if kernel.state() != KernelState::Dead => {
                    return Ok(Some(Arc::clone(kernel)));
                }
                Some(Slot::Spawning) => {
                    debug!("Kernel {} is still spawning", key);
                    return Ok(None);
                }
                Some(Slot::Releasing) => {
                    debug!("Kernel {} is still being released", key);
                    return Ok(None);
                }
                _ => {}
            }
            slots.insert(key.clone(), Slot::Spawning)
        };

        if let Some(Slot::Kernel(dead)) = evicted {
            info!("Replacing dead kernel {}", key);
            dead.shutdown();
            if let Err(e) = self.backend.release(&key).await {
                warn!("Failed to release dead kernel {}: {}", key, e);
            }
        }

        info!("Spawning {} kernel for session {}", language, session_id);
        match self.spawn(&key).await {
            Ok(kernel) => {
                let kernel = Arc::new(kernel);
                self.registry
                    .slots
                    .lock()
                    .await
                    .insert(key.clone(), Slot::Kernel(Arc::clone(&kernel)));
                info!("Kernel {} ready", key);
                Ok(Some(kernel))
            }
            Err(e) => {
                if let Err(release_err) = self.backend.release(&key).await {
                    warn!("Failed to release {} after spawn failure: {}", key, release_err);
                }
                self.registry.slots.lock().await.remove(&key);
                error!("Failed to spawn kernel {}: {}", key, e);
                Err(e)
            }
        }
    }

    async fn spawn(&self, key: &KernelKey) -> Result<KernelInstance> {
        let script = self.config.startup_script(key.language)?;
        let transport = self.backend.start(key).await?;
        let kernel = KernelInstance::start(key.clone(), transport)?;
        kernel.run_startup(&script)?;
        kernel.mark_ready();
        Ok(kernel)
    }

    /// Route future events of `kernel` to `sink`, replacing any previous
    /// subscriber.
    pub fn attach_subscriber(&self, kernel: &KernelInstance, sink: EventSink) {
        kernel.attach_subscriber(sink);
    }

    /// Shut down and release the kernel. Returns whether one was running.
    ///
    /// A kernel that is still spawning or already being released is left
    /// alone. The key stays reserved until the backend release finishes.
    pub async fn kill(&self, session_id: &str, language: Language) -> Result<bool> {
        let key = KernelKey::new(session_id, language);
        let kernel = {
            let mut slots = self.registry.slots.lock().await;
            if matches!(slots.get(&key), Some(Slot::Kernel(_))) {
                match slots.insert(key.clone(), Slot::Releasing) {
                    Some(Slot::Kernel(kernel)) => Some(kernel),
                    _ => None,
                }
            } else {
                if slots.contains_key(&key) {
                    debug!("Not killing {} while it is spawning or releasing", key);
                }
                None
            }
        };

        let Some(kernel) = kernel else {
            return Ok(false);
        };
        kernel.shutdown();
        let released = self.backend.release(&key).await;
        self.registry.slots.lock().await.remove(&key);
        released?;
        info!("Killed kernel {}", key);
        Ok(true)
    }

    /// Kill every kernel of a session. Returns how many were killed.
    pub async fn kill_session(&self, session_id: &str) -> Result<usize> {
        let languages: Vec<Language> = {
            let slots = self.registry.slots.lock().await;
            slots
                .iter()
                .filter(|(key, slot)| key.session_id == session_id && matches!(slot, Slot::Kernel(_)))
                .map(|(key, _)| key.language)
                .collect()
        };

        let mut killed = 0;
        for language in languages {
            if self.kill(session_id, language).await? {
                killed += 1;
            }
        }
        Ok(killed)
    }

    pub async fn list_kernels(&self) -> Vec<KernelSummary> {
        let slots = self.registry.slots.lock().await;
        let mut kernels: Vec<KernelSummary> = slots
            .iter()
            .map(|(key, slot)| KernelSummary {
                session_id: key.session_id.clone(),
                language: key.language,
                state: match slot {
                    Slot::Spawning => KernelState::Spawning,
                    Slot::Kernel(kernel) => kernel.state(),
                    Slot::Releasing => KernelState::Dead,
                },
            })
            .collect();
        kernels.sort_by(|a, b| {
            (&a.session_id, a.language).cmp(&(&b.session_id, b.language))
        });
        kernels
    }

    /// Kill every kernel.
    pub async fn shutdown(&self) {
        let keys: Vec<KernelKey> = {
            let slots = self.registry.slots.lock().await;
            slots.keys().cloned().collect()
        };
        for key in keys {
            if let Err(e) = self.kill(&key.session_id, key.language).await {
                warn!("Failed to kill {} during shutdown: {}", key, e);
            }
        }
    }

    /// Carry out a client command, reporting problems to `sink`.
    pub async fn dispatch(&self, command: ClientCommand, sink: &EventSink) -> DispatchOutcome {
        let Some((session_id, language)) = command.target() else {
            return DispatchOutcome::Ignored;
        };
        let element_id = command.element_id().map(str::to_string);

        if let ClientCommand::KillKernel(_) = &command {
            return match self.kill(session_id, language).await {
                Ok(_) => DispatchOutcome::Dispatched,
                Err(e) => report(sink, element_id.as_deref(), &e),
            };
        }

        let kernel = match self.get_or_create(session_id, language).await {
            Ok(Some(kernel)) => kernel,
            Ok(None) => {
                let _ = sink.send(KernelEvent::starting(language));
                return DispatchOutcome::NotReady;
            }
            Err(e) => return report(sink, element_id.as_deref(), &e),
        };
        kernel.attach_subscriber(sink.clone());

        debug!("Dispatching {} to {}", command.command_type(), kernel.key());
        let result = match &command {
            ClientCommand::RunCode(run) if run.raw => kernel.evaluate_raw(&run.element_id, &run.code),
            ClientCommand::RunCode(run) => kernel.evaluate(
                &run.element_id,
                &run.code,
                &run.namespace,
                run.exports.as_deref().unwrap_or_default(),
            ),
            ClientCommand::RequestKernelStatus(_) => kernel.request_status(),
            ClientCommand::InterruptKernel(_) => kernel.interrupt(),
            ClientCommand::AddImport(c) => kernel.add_import(&c.element_id, &c.from, &c.to, &c.name),
            ClientCommand::AddImportNs(c) => {
                kernel.add_import_namespace(&c.element_id, &c.namespaces, &c.to)
            }
            ClientCommand::DeleteImport(c) => {
                kernel.delete_import(&c.element_id, &c.namespace, &c.name)
            }
            ClientCommand::DeleteMidport(c) => {
                kernel.delete_export(&c.element_id, &c.namespace, &c.name)
            }
            ClientCommand::EnsureImports(c) => {
                kernel.ensure_imports(&c.element_id, &c.from, &c.to, &c.names)
            }
            ClientCommand::KillKernel(_) | ClientCommand::Ping => Ok(()),
        };

        match result {
            Ok(()) => DispatchOutcome::Dispatched,
            Err(e) => report(sink, element_id.as_deref(), &e),
        }
    }
}

fn report(sink: &EventSink, element_id: Option<&str>, error: &Error) -> DispatchOutcome {
    warn!("Command failed: {}", error);
    let _ = sink.send(KernelEvent::failure(element_id, error));
    DispatchOutcome::Failed
}
