//! In-memory container driver for testing.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{ContainerDriver, ContainerInfo, ContainerSpec};
use crate::error::{Error, Result};

/// Simulates a container runtime.
///
/// Containers get sequential addresses `10.0.0.N` on the network they were
/// created on.
pub struct MockDriver {
    containers: Mutex<BTreeMap<String, ContainerInfo>>,
    created: AtomicUsize,
    removed: AtomicUsize,
    /// If false, containers never receive an address.
    assign_addresses: bool,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            containers: Mutex::new(BTreeMap::new()),
            created: AtomicUsize::new(0),
            removed: AtomicUsize::new(0),
            assign_addresses: true,
        }
    }

    /// A driver whose containers never get a network address.
    pub fn without_addresses() -> Self {
        Self {
            assign_addresses: false,
            ..Self::new()
        }
    }

    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn removed_count(&self) -> usize {
        self.removed.load(Ordering::SeqCst)
    }

    pub async fn names(&self) -> Vec<String> {
        self.containers.lock().await.keys().cloned().collect()
    }
}

#[async_trait]
impl ContainerDriver for MockDriver {
    fn driver_type(&self) -> &'static str {
        "mock"
    }

    async fn inspect(&self, name: &str) -> Result<Option<ContainerInfo>> {
        Ok(self.containers.lock().await.get(name).cloned())
    }

    async fn create_and_start(&self, spec: &ContainerSpec) -> Result<()> {
        let mut containers = self.containers.lock().await;
        if containers.contains_key(&spec.name) {
            return Err(Error::Container(format!(
                "container name {} is already in use",
                spec.name
            )));
        }

        let serial = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        let mut networks = BTreeMap::new();
        if self.assign_addresses {
            networks.insert(spec.network.clone(), format!("10.0.0.{serial}"));
        }
        containers.insert(
            spec.name.clone(),
            ContainerInfo {
                name: spec.name.clone(),
                running: true,
                networks,
            },
        );
        Ok(())
    }

    async fn stop(&self, name: &str) -> Result<()> {
        let mut containers = self.containers.lock().await;
        let info = containers
            .get_mut(name)
            .ok_or_else(|| Error::Container(format!("no such container: {name}")))?;
        info.running = false;
        info.networks.clear();
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        if self.containers.lock().await.remove(name).is_some() {
            self.removed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
