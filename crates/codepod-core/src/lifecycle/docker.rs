//! Docker CLI driver.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Output;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use super::{ContainerDriver, ContainerInfo, ContainerSpec};
use crate::error::{Error, Result};

/// Drives containers through the `docker` binary.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectEntry {
    name: String,
    state: InspectState,
    #[serde(default)]
    network_settings: InspectNetworkSettings,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    running: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectNetworkSettings {
    #[serde(default)]
    networks: Option<BTreeMap<String, InspectNetwork>>,
}

#[derive(Debug, Deserialize)]
struct InspectNetwork {
    #[serde(rename = "IPAddress", default)]
    ip_address: String,
}

impl DockerCli {
    /// Locate `docker` on the `PATH`.
    pub fn locate() -> Result<Self> {
        let binary = which::which("docker")
            .map_err(|e| Error::Container(format!("docker binary not found: {e}")))?;
        Ok(Self { binary })
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<Output> {
        debug!("docker {}", args.join(" "));
        Ok(Command::new(&self.binary).args(args).output().await?)
    }

    async fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args).await?;
        if !output.status.success() {
            return Err(Error::Container(format!(
                "docker {} failed: {}",
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output)
    }
}

fn is_missing(output: &Output) -> bool {
    String::from_utf8_lossy(&output.stderr).contains("No such")
}

/// Parse `docker inspect` output for a single container.
fn parse_inspect(json: &[u8]) -> Result<Option<ContainerInfo>> {
    let entries: Vec<InspectEntry> = serde_json::from_slice(json)?;
    Ok(entries.into_iter().next().map(|entry| ContainerInfo {
        name: entry.name.trim_start_matches('/').to_string(),
        running: entry.state.running,
        networks: entry
            .network_settings
            .networks
            .unwrap_or_default()
            .into_iter()
            .map(|(network, info)| (network, info.ip_address))
            .collect(),
    }))
}

#[async_trait]
impl ContainerDriver for DockerCli {
    fn driver_type(&self) -> &'static str {
        "docker"
    }

    async fn inspect(&self, name: &str) -> Result<Option<ContainerInfo>> {
        let output = self.run(&["inspect", "--type", "container", name]).await?;
        if !output.status.success() {
            if is_missing(&output) {
                return Ok(None);
            }
            return Err(Error::Container(format!(
                "docker inspect {name} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        parse_inspect(&output.stdout)
    }

    async fn create_and_start(&self, spec: &ContainerSpec) -> Result<()> {
        let mut args: Vec<&str> = vec![
            "run",
            "--detach",
            "--name",
            spec.name.as_str(),
            "--network",
            spec.network.as_str(),
        ];
        for var in &spec.env {
            args.push("--env");
            args.push(var);
        }
        args.push(&spec.image);
        self.run_checked(&args).await?;
        Ok(())
    }

    async fn stop(&self, name: &str) -> Result<()> {
        self.run_checked(&["stop", name]).await?;
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let output = self.run(&["rm", "--force", name]).await?;
        if !output.status.success() && !is_missing(&output) {
            return Err(Error::Container(format!(
                "docker rm {name} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}
