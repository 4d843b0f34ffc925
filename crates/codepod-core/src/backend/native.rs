//! Local kernel processes.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::KernelBackend;
use crate::config::SupervisorConfig;
use crate::connection::ConnectionInfo;
use crate::error::{Error, Result};
use crate::kernel::KernelKey;
use crate::kernelspec::KernelSpecIndex;
use crate::paths::RuntimeDirs;
use crate::transport::{self, KernelTransport};

struct KernelProcess {
    child: Child,
    connection_file: PathBuf,
    log_tasks: Vec<JoinHandle<()>>,
}

/// Launches kernels from installed kernelspecs.
pub struct NativeBackend {
    specs: KernelSpecIndex,
    dirs: RuntimeDirs,
    kernel_ip: String,
    connect_timeout: Duration,
    processes: Mutex<FxHashMap<KernelKey, KernelProcess>>,
}

impl NativeBackend {
    pub fn new(config: &SupervisorConfig) -> Result<Self> {
        let dirs = RuntimeDirs::new(&config.state_dir)?;
        let stale = dirs.clean_connections()?;
        if stale > 0 {
            debug!("Removed {} stale connection file(s)", stale);
        }

        let specs = match config.kernelspec_dir() {
            Some(dir) => KernelSpecIndex::discover(&dir)?,
            None => KernelSpecIndex::default(),
        };
        if specs.is_empty() {
            warn!("No kernelspecs found for any supported language");
        }

        Ok(Self {
            specs,
            dirs,
            kernel_ip: config.kernel_ip.clone(),
            connect_timeout: config.connect_timeout,
            processes: Mutex::new(FxHashMap::default()),
        })
    }

    pub fn specs(&self) -> &KernelSpecIndex {
        &self.specs
    }

    /// Whether a process is registered for `key`.
    pub async fn is_running(&self, key: &KernelKey) -> bool {
        self.processes.lock().await.contains_key(key)
    }
}

fn forward_output<R>(key: String, stream: &'static str, output: R) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(output).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!("kernel {} {}: {}", key, stream, line.trim_end());
        }
    })
}

#[async_trait]
impl KernelBackend for NativeBackend {
    fn backend_type(&self) -> &'static str {
        "native"
    }

    async fn start(&self, key: &KernelKey) -> Result<KernelTransport> {
        let spec = self.specs.get(key.language).ok_or_else(|| {
            Error::KernelSpec(format!("no {} kernel installed", key.language))
        })?;

        let info = ConnectionInfo::allocate(&self.kernel_ip).await?;
        let connection_file = self.dirs.connection_file(&Uuid::new_v4().to_string());
        info.write(&connection_file)?;

        let (program, args) = spec.command(&connection_file)?;
        let mut child = Command::new(&program)
            .args(&args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::spawn(key, format!("failed to launch {program}: {e}")))?;

        let mut log_tasks = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            log_tasks.push(forward_output(key.to_string(), "stdout", stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            log_tasks.push(forward_output(key.to_string(), "stderr", stderr));
        }

        info!(
            "Launched {} ({}) for {}, pid {:?}",
            spec.display_name,
            program,
            key,
            child.id()
        );
        self.processes.lock().await.insert(
            key.clone(),
            KernelProcess {
                child,
                connection_file,
                log_tasks,
            },
        );

        transport::connect(&info, self.connect_timeout).await
    }

    async fn release(&self, key: &KernelKey) -> Result<()> {
        let Some(mut process) = self.processes.lock().await.remove(key) else {
            return Ok(());
        };

        if let Err(e) = process.child.kill().await {
            debug!("Kernel process for {} already exited: {}", key, e);
        }
        for task in &process.log_tasks {
            task.abort();
        }
        if let Err(e) = fs::remove_file(&process.connection_file)
            && e.kind() != ErrorKind::NotFound
        {
            warn!(
                "Failed to remove {}: {}",
                process.connection_file.display(),
                e
            );
        }
        info!("Released kernel process for {}", key);
        Ok(())
    }
}
