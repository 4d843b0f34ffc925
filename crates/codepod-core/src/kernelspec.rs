//! Installed kernelspec discovery.
//!
//! Each kernel lives in `<kernels dir>/<name>/kernel.json`. The `language`
//! field selects which adapter the kernel serves; `argv` is the launch
//! command with `{connection_file}` substituted at spawn time.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::lang::Language;

const CONNECTION_FILE_PLACEHOLDER: &str = "{connection_file}";

/// A parsed `kernel.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct KernelSpec {
    pub argv: Vec<String>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Replaces `argv[0]` when set.
    #[serde(default, rename = "interpreterPath")]
    pub interpreter_path: Option<String>,
    /// Directory the spec was loaded from.
    #[serde(skip)]
    pub resource_dir: PathBuf,
}

impl KernelSpec {
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join("kernel.json");
        let raw = fs::read_to_string(&path)
            .map_err(|e| Error::KernelSpec(format!("{}: {e}", path.display())))?;
        let mut spec: KernelSpec = serde_json::from_str(&raw)
            .map_err(|e| Error::KernelSpec(format!("{}: {e}", path.display())))?;
        spec.resource_dir = dir.to_path_buf();
        Ok(spec)
    }

    /// Program and arguments for launching against `connection_file`.
    pub fn command(&self, connection_file: &Path) -> Result<(String, Vec<String>)> {
        let (program, args) = self.argv.split_first().ok_or_else(|| {
            Error::KernelSpec(format!("{} has an empty argv", self.display_name))
        })?;
        let program = self
            .interpreter_path
            .clone()
            .filter(|path| !path.is_empty())
            .unwrap_or_else(|| program.clone());
        let file = connection_file.to_string_lossy();
        let args = args
            .iter()
            .filter(|arg| !arg.is_empty())
            .map(|arg| arg.replace(CONNECTION_FILE_PLACEHOLDER, &file))
            .collect();
        Ok((program, args))
    }
}

/// Default Jupyter kernels directory for the current user.
pub fn default_kernelspec_dir() -> Option<PathBuf> {
    if cfg!(target_os = "macos") {
        dirs::home_dir().map(|home| home.join("Library/Jupyter/kernels"))
    } else {
        dirs::data_dir().map(|data| data.join("jupyter/kernels"))
    }
}

/// Kernelspecs indexed by language.
#[derive(Debug, Clone, Default)]
pub struct KernelSpecIndex {
    specs: BTreeMap<Language, KernelSpec>,
}

impl KernelSpecIndex {
    /// Scan `dir` for kernelspecs.
    ///
    /// Specs for languages without an adapter, and unreadable specs, are
    /// skipped. When several specs serve the same language the first in
    /// directory-name order wins. A missing directory yields an empty index.
    pub fn discover(dir: &Path) -> Result<Self> {
        let mut index = Self::default();
        if !dir.is_dir() {
            debug!("Kernelspec directory {} not found", dir.display());
            return Ok(index);
        }

        let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.join("kernel.json").is_file())
            .collect();
        entries.sort();

        for path in entries {
            let spec = match KernelSpec::load(&path) {
                Ok(spec) => spec,
                Err(e) => {
                    warn!("Skipping kernelspec: {}", e);
                    continue;
                }
            };
            let Ok(language) = spec.language.parse::<Language>() else {
                debug!(
                    "Ignoring kernelspec {} for unsupported language {}",
                    path.display(),
                    spec.language
                );
                continue;
            };
            index.specs.entry(language).or_insert(spec);
        }

        Ok(index)
    }

    pub fn get(&self, language: Language) -> Option<&KernelSpec> {
        self.specs.get(&language)
    }

    pub fn languages(&self) -> impl Iterator<Item = Language> + '_ {
        self.specs.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Language, &KernelSpec)> {
        self.specs.iter().map(|(lang, spec)| (*lang, spec))
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
