//! Runtime directory management.
//!
//! Connection descriptors for natively spawned kernels are written under a
//! per-user data directory:
//!
//! ```text
//! <data dir>/codepod/
//! └── conns/      # conn-<uuid>.json, one per live kernel
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Directory structure used by the runtime.
#[derive(Debug, Clone)]
pub struct RuntimeDirs {
    /// Root of all runtime state.
    pub root: PathBuf,

    /// Connection descriptors handed to spawned kernels.
    pub conns_dir: PathBuf,
}

impl RuntimeDirs {
    /// Default root: the platform data directory, or the temp dir when
    /// there is none.
    pub fn default_root() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("codepod")
    }

    /// Create the directory structure under `root`.
    ///
    /// # Errors
    /// Returns an error if directory creation fails.
    pub fn new(root: &Path) -> Result<Self> {
        let conns_dir = root.join("conns");
        fs::create_dir_all(&conns_dir)?;

        Ok(Self {
            root: root.to_path_buf(),
            conns_dir,
        })
    }

    /// Path for a new connection descriptor.
    pub fn connection_file(&self, id: &str) -> PathBuf {
        self.conns_dir.join(format!("conn-{id}.json"))
    }

    /// Remove connection descriptors left behind by a previous run.
    ///
    /// Returns the number of files removed.
    pub fn clean_connections(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.conns_dir)? {
            let path = entry?.path();
            let is_conn = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("conn-") && n.ends_with(".json"));
            if is_conn {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
