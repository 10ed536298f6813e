use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use sortarrctl::cli::Cli;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<ExitCode> {
    let env_loaded = dotenvy::dotenv().is_ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                // Worker warnings are already echoed as progress output. Override via RUST_LOG.
                "sortarr_core=warn,sortarrctl=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if env_loaded {
        debug!("loaded .env file");
    }

    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the tokio runtime")?;
    let result = runtime.block_on(sortarrctl::run(cli));
    // A prompt left open by a stopped batch must not hold the process.
    runtime.shutdown_timeout(Duration::from_millis(250));

    let summary = result?;
    Ok(if summary.is_aborted() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
