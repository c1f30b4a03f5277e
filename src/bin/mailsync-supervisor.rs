#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! Generates the mail-sync worker config from environment variables,
//! starts the worker and supervises it

use anyhow::Context;
use clap::Parser;
use mailsync_supervisor::{
    DEFAULT_CONFIG_PATH, ProcessWorker, Signal, SignalBridge, Supervisor, SyncConfig,
    WorkerCommand,
};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;

#[derive(Parser)]
#[command(name = "mailsync-supervisor")]
#[command(
    about = "Run a mail-sync worker configured from environment variables"
)]
struct Args {
    /// Where to write the generated worker config
    #[arg(long, env = "CONFIG_PATH", default_value = DEFAULT_CONFIG_PATH)]
    config_path: PathBuf,

    /// Seconds between worker health checks
    #[arg(
        long,
        env = "HEALTH_INTERVAL_SECONDS",
        default_value = "60",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    health_interval: u64,

    /// Worker executable; the config path is passed as its last argument
    #[arg(long, env = "WORKER_PROGRAM", default_value = "imap2imap")]
    worker: String,

    /// Tag printed in brackets at the start of every log line
    #[arg(long, env = "LOG_TAG", default_value = "railway")]
    log_tag: String,

    /// Write the config file and exit without starting the worker
    #[arg(long)]
    generate_only: bool,

    /// Extra arguments passed to the worker before the config path
    #[arg(last = true)]
    worker_args: Vec<String>,
}

/// `[railway] 2024-01-01 12:00:00` in local time, so every line
/// starts with the deployment tag.
struct TaggedLocalTime {
    tag: String,
}

impl FormatTime for TaggedLocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        if !self.tag.is_empty() {
            write!(w, "[{}] ", self.tag)?;
        }
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_timer(TaggedLocalTime {
            tag: args.log_tag.clone(),
        })
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    // Returning from main drops the runtime, which kills the worker
    // child if it is still around.
    match run(args).await {
        Ok(Some(signal)) => {
            info!("Shut down after {}", signal);
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<Option<Signal>> {
    info!("Starting mail-sync supervisor...");

    let config = SyncConfig::from_env().context("Invalid worker configuration")?;
    let supervisor = Supervisor::new(&args.config_path)
        .with_health_interval(Duration::from_secs(args.health_interval));

    if args.generate_only {
        supervisor
            .generate(&config)
            .with_context(|| format!("Failed to write {}", args.config_path.display()))?;
        return Ok(None);
    }

    let mut signals = SignalBridge::install().context("Failed to install signal handlers")?;
    let command = WorkerCommand::new(&args.worker).args(&args.worker_args);

    let signal = supervisor
        .launch(
            &config,
            |path| ProcessWorker::new(path, command),
            signals.recv(),
        )
        .await?;

    Ok(Some(signal))
}
