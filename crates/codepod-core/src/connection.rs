//! Kernel connection descriptors.
//!
//! The JSON file a Jupyter-style kernel reads on startup to learn which
//! ports to bind and which key to sign messages with.

use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::transport::Channel;
use crate::wire::SigningKey;

const DEFAULT_TRANSPORT: &str = "tcp";
const DEFAULT_SIGNATURE_SCHEME: &str = "hmac-sha256";

fn default_transport() -> String {
    DEFAULT_TRANSPORT.to_string()
}

fn default_signature_scheme() -> String {
    DEFAULT_SIGNATURE_SCHEME.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub shell_port: u16,
    pub iopub_port: u16,
    pub stdin_port: u16,
    pub control_port: u16,
    pub hb_port: u16,
    pub ip: String,
    /// HMAC key. Empty disables signing.
    #[serde(default)]
    pub key: String,
    #[serde(default = "default_transport")]
    pub transport: String,
    #[serde(default = "default_signature_scheme")]
    pub signature_scheme: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_name: Option<String>,
}

impl ConnectionInfo {
    /// Allocate five free local ports on `ip` and a random key.
    ///
    /// All five listeners are held until every port is chosen, so the same
    /// port is never handed out twice.
    pub async fn allocate(ip: &str) -> Result<Self> {
        let addr: IpAddr = ip
            .parse()
            .map_err(|_| Error::KernelSpec(format!("invalid kernel ip address: {ip}")))?;

        let mut listeners = Vec::with_capacity(5);
        for _ in 0..5 {
            listeners.push(TcpListener::bind(SocketAddr::new(addr, 0)).await?);
        }
        let mut ports = Vec::with_capacity(5);
        for listener in &listeners {
            ports.push(listener.local_addr()?.port());
        }
        drop(listeners);

        Ok(Self {
            shell_port: ports[0],
            iopub_port: ports[1],
            stdin_port: ports[2],
            control_port: ports[3],
            hb_port: ports[4],
            ip: ip.to_string(),
            key: Uuid::new_v4().to_string(),
            transport: default_transport(),
            signature_scheme: default_signature_scheme(),
            kernel_name: None,
        })
    }

    /// Read a descriptor from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write the descriptor to `path`, creating parent directories.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Same descriptor with the address replaced.
    pub fn with_ip(&self, ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            ..self.clone()
        }
    }

    /// Socket endpoint for a channel, e.g. `tcp://127.0.0.1:5555`.
    pub fn endpoint(&self, channel: Channel) -> String {
        let port = match channel {
            Channel::Shell => self.shell_port,
            Channel::Control => self.control_port,
            Channel::IOPub => self.iopub_port,
        };
        format!("{}://{}:{}", self.transport, self.ip, port)
    }

    /// Signing key, or `None` when messages are unsigned.
    pub fn signing_key(&self) -> Option<SigningKey> {
        SigningKey::from_secret(&self.key)
    }
}
