//! Container lifecycle.
//!
//! [`ResourceManager`] makes "a running container with this name on this
//! network" an idempotent request, on top of a [`ContainerDriver`] that talks
//! to the actual container runtime.

mod docker;
mod mock;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info};

pub use docker::DockerCli;
pub use mock::MockDriver;

use crate::error::{Error, Result};

/// What the runtime reports about a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub name: String,
    pub running: bool,
    /// Address on each attached network.
    pub networks: BTreeMap<String, String>,
}

impl ContainerInfo {
    /// Address on `network`, if assigned.
    pub fn address_on(&self, network: &str) -> Option<&str> {
        self.networks
            .get(network)
            .map(String::as_str)
            .filter(|addr| !addr.is_empty())
    }
}

/// A container to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: String,
    pub name: String,
    pub network: String,
    /// `KEY=VALUE` pairs.
    pub env: Vec<String>,
}

/// A container runtime.
#[async_trait]
pub trait ContainerDriver: Send + Sync {
    fn driver_type(&self) -> &'static str;

    /// Look a container up by name. `None` if it does not exist.
    async fn inspect(&self, name: &str) -> Result<Option<ContainerInfo>>;

    async fn create_and_start(&self, spec: &ContainerSpec) -> Result<()>;

    async fn stop(&self, name: &str) -> Result<()>;

    async fn remove(&self, name: &str) -> Result<()>;
}

/// Result of [`ResourceManager::ensure_running`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsureOutcome {
    /// Whether a new container was created.
    pub created: bool,
    pub address: String,
}

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct ResourceManager<D> {
    driver: D,
    address_timeout: Duration,
    poll_interval: Duration,
}

impl<D: ContainerDriver> ResourceManager<D> {
    pub fn new(driver: D, address_timeout: Duration) -> Self {
        Self {
            driver,
            address_timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Make sure container `name` is running from `image` on `network`.
    ///
    /// A running container is reused as-is. A stopped one is removed and
    /// recreated. Returns the container's address on `network`.
    ///
    /// # Errors
    /// [`Error::AddressUnavailable`] if no address shows up within the
    /// address timeout; driver errors otherwise.
    pub async fn ensure_running(
        &self,
        image: &str,
        name: &str,
        network: &str,
        env: &[String],
    ) -> Result<EnsureOutcome> {
        match self.driver.inspect(name).await? {
            Some(info) if info.running => {
                debug!("Container {} already running", name);
                let address = self.wait_for_address(name, network).await?;
                return Ok(EnsureOutcome {
                    created: false,
                    address,
                });
            }
            Some(_) => {
                info!("Removing stopped container {}", name);
                self.driver.remove(name).await?;
            }
            None => {}
        }

        info!("Creating container {} from {}", name, image);
        self.driver
            .create_and_start(&ContainerSpec {
                image: image.to_string(),
                name: name.to_string(),
                network: network.to_string(),
                env: env.to_vec(),
            })
            .await?;

        let address = self.wait_for_address(name, network).await?;
        Ok(EnsureOutcome {
            created: true,
            address,
        })
    }

    /// Stop and remove container `name`. A missing container is not an error.
    pub async fn remove(&self, name: &str) -> Result<()> {
        let Some(info) = self.driver.inspect(name).await? else {
            debug!("Container {} already gone", name);
            return Ok(());
        };
        if info.running {
            self.driver.stop(name).await?;
        }
        self.driver.remove(name).await?;
        info!("Removed container {}", name);
        Ok(())
    }

    async fn wait_for_address(&self, name: &str, network: &str) -> Result<String> {
        let deadline = Instant::now() + self.address_timeout;
        loop {
            if let Some(info) = self.driver.inspect(name).await?
                && let Some(address) = info.address_on(network)
            {
                return Ok(address.to_string());
            }
            if Instant::now() >= deadline {
                return Err(Error::AddressUnavailable {
                    name: name.to_string(),
                    network: network.to_string(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
