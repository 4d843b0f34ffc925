//! Kernel backends.
//!
//! A backend turns a [`KernelKey`] into a connected [`KernelTransport`] and
//! later releases whatever it allocated for that key. The supervisor never
//! cares whether the kernel is a local process, a container, or an
//! in-process mock.

mod container;
mod mock;
mod native;

use std::sync::Arc;

use async_trait::async_trait;

pub use container::{ContainerBackend, container_name};
pub use mock::MockBackend;
pub use native::NativeBackend;

use crate::config::{BackendKind, SupervisorConfig};
use crate::error::Result;
use crate::kernel::KernelKey;
use crate::lifecycle::{DockerCli, ResourceManager};
use crate::transport::KernelTransport;

#[async_trait]
pub trait KernelBackend: Send + Sync {
    fn backend_type(&self) -> &'static str;

    /// Start (or attach to) the kernel for `key` and connect its channels.
    async fn start(&self, key: &KernelKey) -> Result<KernelTransport>;

    /// Release everything allocated for `key`. Releasing an unknown key is
    /// a no-op.
    async fn release(&self, key: &KernelKey) -> Result<()>;
}

/// Build the backend selected by `config`.
pub fn from_config(config: &SupervisorConfig) -> Result<Arc<dyn KernelBackend>> {
    Ok(match config.backend {
        BackendKind::Native => Arc::new(NativeBackend::new(config)?),
        BackendKind::Docker => {
            let manager = ResourceManager::new(DockerCli::locate()?, config.address_timeout);
            Arc::new(ContainerBackend::new(manager, config.clone()))
        }
    })
}
