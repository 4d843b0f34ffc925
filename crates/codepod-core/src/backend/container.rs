//! One container per kernel.

use async_trait::async_trait;
use tracing::info;

use super::KernelBackend;
use crate::config::SupervisorConfig;
use crate::error::Result;
use crate::kernel::KernelKey;
use crate::lifecycle::{ContainerDriver, ResourceManager};
use crate::transport::{self, KernelTransport};

/// Container name for a kernel: `cpkernel_<network>_<session>_<language>`.
///
/// Every byte of the network and session outside `[A-Za-z0-9.]` is written
/// as `-` plus two hex digits, so distinct keys never share a name.
pub fn container_name(network: &str, key: &KernelKey) -> String {
    format!(
        "cpkernel_{}_{}_{}",
        escape_name_part(network),
        escape_name_part(&key.session_id),
        key.language
    )
}

fn escape_name_part(part: &str) -> String {
    let mut escaped = String::with_capacity(part.len());
    for byte in part.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'.' {
            escaped.push(char::from(byte));
        } else {
            escaped.push_str(&format!("-{byte:02x}"));
        }
    }
    escaped
}

pub struct ContainerBackend<D> {
    manager: ResourceManager<D>,
    config: SupervisorConfig,
}

impl<D: ContainerDriver> ContainerBackend<D> {
    pub fn new(manager: ResourceManager<D>, config: SupervisorConfig) -> Self {
        Self { manager, config }
    }

    pub fn manager(&self) -> &ResourceManager<D> {
        &self.manager
    }
}

#[async_trait]
impl<D: ContainerDriver + 'static> KernelBackend for ContainerBackend<D> {
    fn backend_type(&self) -> &'static str {
        "docker"
    }

    async fn start(&self, key: &KernelKey) -> Result<KernelTransport> {
        let descriptor = self.config.connection_descriptor(key.language)?;
        let name = container_name(&self.config.network, key);
        let env = vec![
            format!("CODEPOD_SESSION_ID={}", key.session_id),
            format!("CODEPOD_LANGUAGE={}", key.language),
        ];

        let outcome = self
            .manager
            .ensure_running(
                &self.config.image_for(key.language),
                &name,
                &self.config.network,
                &env,
            )
            .await?;
        info!(
            "Kernel container {} at {} ({})",
            name,
            outcome.address,
            if outcome.created { "created" } else { "reused" }
        );

        transport::connect(
            &descriptor.with_ip(outcome.address),
            self.config.connect_timeout,
        )
        .await
    }

    async fn release(&self, key: &KernelKey) -> Result<()> {
        self.manager
            .remove(&container_name(&self.config.network, key))
            .await
    }
}
