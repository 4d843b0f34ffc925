//! Serve command implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use codepod_core::config::DEFAULT_NETWORK;
use codepod_core::{BackendKind, SessionSupervisor, SupervisorConfig, backend};
use codepod_server::ServerConfig;

use crate::colors;

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// How kernels are started: `native` or `docker`
    #[arg(long, env = "CODEPOD_BACKEND", default_value = "native")]
    pub backend: BackendKind,

    /// Container network kernels join (docker backend)
    #[arg(long, env = "KERNEL_NETWORK", default_value = DEFAULT_NETWORK)]
    pub network: String,

    /// Directory with per-language startup scripts and connection files
    #[arg(long, env = "CODEPOD_KERNELS_DIR")]
    pub kernels_dir: Option<PathBuf>,

    /// Jupyter kernels directory (native backend)
    #[arg(long, env = "CODEPOD_KERNELSPEC_DIR")]
    pub kernelspec_dir: Option<PathBuf>,

    /// Directory for connection files and other runtime state
    #[arg(long, env = "CODEPOD_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Seconds to keep retrying channel connections to a new kernel
    #[arg(long, default_value_t = 10)]
    pub connect_timeout: u64,

    /// Host to bind to
    #[arg(long, env = "WS_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "WS_PORT", default_value_t = 4020)]
    pub port: u16,
}

impl ServeArgs {
    pub fn supervisor_config(&self) -> SupervisorConfig {
        let mut config = SupervisorConfig {
            backend: self.backend,
            network: self.network.clone(),
            kernels_dir: self.kernels_dir.clone(),
            kernelspec_dir: self.kernelspec_dir.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout),
            ..SupervisorConfig::default()
        };
        if let Some(state_dir) = &self.state_dir {
            config.state_dir = state_dir.clone();
        }
        config
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
        }
    }
}

/// Start the WebSocket runtime.
pub async fn execute(args: ServeArgs) -> anyhow::Result<()> {
    let config = args.supervisor_config();
    let server = args.server_config();
    // Validate before spawning anything
    let addr = server.socket_addr()?;

    let backend = backend::from_config(&config)?;
    let supervisor = Arc::new(SessionSupervisor::new(backend, config.clone()));

    println!("\n{}CodePod Runtime{}", colors::BOLD, colors::RESET);
    println!("{}", "─".repeat(50));
    println!(
        "{}  ◆ Backend:{} {}",
        colors::CYAN,
        colors::RESET,
        supervisor.backend_type()
    );
    if config.backend == BackendKind::Docker {
        println!(
            "{}  ◆ Network:{} {}",
            colors::CYAN,
            colors::RESET,
            config.network
        );
    }
    println!(
        "{}  ◆ WebSocket:{} ws://{}/ws",
        colors::CYAN,
        colors::RESET,
        addr
    );
    println!("{}", "─".repeat(50));
    println!("{}Press Ctrl+C to stop{}", colors::GREEN, colors::RESET);
    println!();

    codepod_server::serve(server, supervisor).await?;

    Ok(())
}
