pub mod api;
pub mod server;
pub mod sweeper;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use thiserror::Error;
use tokio::time::sleep;
use tracing::debug;

use vget_core::{
    load_vget_config, FileJobStore, JobEngine, OutputType, ProviderRegistry, VgetConfig,
};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] vget_core::ConfigError),
    #[error("job error: {0}")]
    Job(#[from] vget_core::JobError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid bind address: {0}")]
    Address(#[from] std::net::AddrParseError),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("required resource missing: {0}")]
    MissingResource(String),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Media acquisition daemon", long_about = None)]
pub struct Cli {
    /// Path to the main vget.toml
    #[arg(long, default_value = "configs/vget.toml")]
    pub config: PathBuf,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API together with the cleanup sweeper
    Serve(ServeArgs),
    /// Acquire one URL synchronously and print the terminal job
    Fetch(FetchArgs),
    /// List registered providers in priority order
    Providers,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Bind address override, e.g. 127.0.0.1:9090
    #[arg(long)]
    pub bind: Option<SocketAddr>,
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Source URL
    pub url: String,
    /// Artifact kind to produce
    #[arg(long, value_enum, default_value_t = OutputArg::Audio)]
    pub output: OutputArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputArg {
    Audio,
    Video,
}

impl From<OutputArg> for OutputType {
    fn from(value: OutputArg) -> Self {
        match value {
            OutputArg::Audio => OutputType::Audio,
            OutputArg::Video => OutputType::Video,
        }
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = load_vget_config(&cli.config)?;
    match cli.command {
        Commands::Serve(args) => server::run(config, args.bind).await,
        Commands::Fetch(args) => fetch(&config, &args.url, args.output.into()).await,
        Commands::Providers => {
            let registry = ProviderRegistry::standard(&config);
            for name in registry.provider_names() {
                println!("{name}");
            }
            Ok(())
        }
    }
}

pub(crate) fn build_engine(config: &VgetConfig) -> Result<JobEngine> {
    let store = FileJobStore::new(config.jobs_dir())?;
    let registry = Arc::new(ProviderRegistry::standard(config));
    debug!(providers = ?registry.provider_names(), "provider registry ready");
    Ok(JobEngine::new(store, registry, config.media_dir()))
}

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// One-shot acquisition: submit, wait for the background task to reach a
/// terminal state, print the job. Reuses an existing completed job exactly
/// like the HTTP path does.
async fn fetch(config: &VgetConfig, url: &str, output_type: OutputType) -> Result<()> {
    let engine = build_engine(config)?;

    let mut job = engine.submit(url, output_type).await?;
    while !job.status.terminal() {
        sleep(POLL_INTERVAL).await;
        job = engine
            .status(&job.job_id)
            .await
            .ok_or_else(|| AppError::MissingResource(format!("job {}", job.job_id)))?;
    }

    println!("{}", serde_json::to_string_pretty(&job)?);
    Ok(())
}
