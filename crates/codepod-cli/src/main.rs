//! CodePod CLI - kernel runtime for CodePod notebooks.

mod colors;
mod kernels;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "codepod")]
#[command(about = "Kernel runtime for CodePod notebooks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the WebSocket runtime
    Serve(serve::ServeArgs),

    /// List installed kernelspecs
    Kernels {
        /// Jupyter kernels directory (default: the per-user Jupyter data dir)
        #[arg(long, env = "CODEPOD_KERNELSPEC_DIR")]
        kernelspec_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Core errors carry recovery hints
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(core_err) = err.downcast_ref::<codepod_core::Error>() {
            anyhow::anyhow!("{}", core_err.with_hint())
        } else if let Some(codepod_server::ServerError::Core(core_err)) =
            err.downcast_ref::<codepod_server::ServerError>()
        {
            anyhow::anyhow!("{}", core_err.with_hint())
        } else {
            err
        }
    };

    match cli.command {
        Commands::Serve(args) => serve::execute(args).await.map_err(format_error)?,
        Commands::Kernels { kernelspec_dir } => {
            kernels::execute(kernelspec_dir).map_err(format_error)?;
        }
    }

    Ok(())
}
