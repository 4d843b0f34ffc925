//! Supervisor configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::connection::ConnectionInfo;
use crate::error::{Error, Result};
use crate::kernelspec::default_kernelspec_dir;
use crate::lang::Language;
use crate::paths::RuntimeDirs;

/// Network kernels are attached to when running in containers.
pub const DEFAULT_NETWORK: &str = "codepod";

/// How kernels are started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Local processes launched from installed kernelspecs.
    #[default]
    Native,
    /// One container per kernel.
    Docker,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::Native => "native",
            BackendKind::Docker => "docker",
        })
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "native" => Ok(BackendKind::Native),
            "docker" => Ok(BackendKind::Docker),
            other => Err(Error::Config(format!("unknown backend: {other}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub backend: BackendKind,

    /// Container network kernels join.
    pub network: String,

    /// Image per language; unset languages use `<language>_kernel`.
    pub images: BTreeMap<Language, String>,

    /// Directory with per-language overrides:
    /// `<dir>/<language>/codepod.<ext>` replaces the bundled startup script
    /// and `<dir>/<language>/conn.json` is the connection descriptor baked
    /// into that language's container image.
    pub kernels_dir: Option<PathBuf>,

    /// Jupyter kernelspec directory searched by the native backend.
    pub kernelspec_dir: Option<PathBuf>,

    /// Root for runtime state such as connection files.
    pub state_dir: PathBuf,

    /// Address native kernels bind to.
    pub kernel_ip: String,

    /// How long to keep retrying channel connections to a new kernel.
    pub connect_timeout: Duration,

    /// How long to wait for a container to report its network address.
    pub address_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            network: DEFAULT_NETWORK.to_string(),
            images: BTreeMap::new(),
            kernels_dir: None,
            kernelspec_dir: None,
            state_dir: RuntimeDirs::default_root(),
            kernel_ip: "127.0.0.1".to_string(),
            connect_timeout: Duration::from_secs(10),
            address_timeout: Duration::from_secs(10),
        }
    }
}

impl SupervisorConfig {
    /// Container image for `language`.
    pub fn image_for(&self, language: Language) -> String {
        self.images
            .get(&language)
            .cloned()
            .unwrap_or_else(|| format!("{language}_kernel"))
    }

    /// Kernelspec directory, falling back to the user's Jupyter directory.
    pub fn kernelspec_dir(&self) -> Option<PathBuf> {
        self.kernelspec_dir.clone().or_else(default_kernelspec_dir)
    }

    /// Startup script for `language`, preferring an override file.
    pub fn startup_script(&self, language: Language) -> Result<String> {
        if let Some(dir) = &self.kernels_dir {
            let path = dir
                .join(language.as_str())
                .join(format!("codepod.{}", language.script_extension()));
            if path.is_file() {
                return Ok(fs::read_to_string(path)?);
            }
        }
        Ok(language.adapter().startup_script().to_string())
    }

    /// Connection descriptor for `language`'s container image.
    pub fn connection_descriptor(&self, language: Language) -> Result<ConnectionInfo> {
        let dir = self.kernels_dir.as_ref().ok_or_else(|| {
            Error::Config("container backend needs a kernels directory".to_string())
        })?;
        let path = dir.join(language.as_str()).join("conn.json");
        ConnectionInfo::load(&path).map_err(|e| {
            Error::KernelSpec(format!("{}: {e}", path.display()))
        })
    }
}
