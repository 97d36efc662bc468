use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{error::ErrorKind, Parser};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rpc_latency_harness::{
    client::run_client, config::ClientConfig, dispatch::RunSummary, scheduler,
};

/// Time control-update round trips against a robot controller server.
#[derive(Debug, Parser)]
#[command(name = "latency_client", version)]
struct Cli {
    /// Path to the client config (TOML)
    config: PathBuf,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

fn run(cli: Cli) -> anyhow::Result<RunSummary> {
    let config = ClientConfig::load(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;
    let mode = config.scheduling_mode();
    info!(?mode, "launching client");

    let summary = scheduler::launch(mode, move || run_client(config))
        .context("launching client thread")?
        .context("client run aborted")?;
    Ok(summary)
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            eprintln!("Usage: latency_client /path/to/cfg.toml");
            return ExitCode::from(1);
        }
    };

    init_tracing();

    match run(cli) {
        Ok(summary) => {
            info!(
                iterations = summary.iterations,
                windows = summary.windows,
                slow_samples = summary.slow_samples,
                report_errors = summary.report_errors,
                "global max: {}, min: {}, avg: {}",
                summary.global.max,
                summary.global.min,
                summary.global.mean
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(2)
        }
    }
}
