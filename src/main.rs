mod cli;
mod error;

use crate::cli::Cli;
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use foldersort_config::Config;
use foldersort_convert::{CommandConverter, ConverterHandle};
use foldersort_triage::{CancellationToken, Outcome, Pipeline, ScanEvent, StatsCollector, WatchAdapter, scan};
use futures::StreamExt;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_directives()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "Stopped");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let overrides = cli.overrides().or_raise(|| ErrorKind::Config)?;
    let config = Config::load(&overrides).or_raise(|| ErrorKind::Config)?;
    tracing::info!(root = %config.root.display(), watch = config.watch, hash = %config.hash, "Starting");

    let command = Arc::new(CommandConverter::new(config.converter.max_concurrent, config.converter_timeout()));
    let converter: ConverterHandle = command.clone();
    let (sender, collector) = StatsCollector::channel();
    let collecting = tokio::spawn(collector.run());
    let pipeline = Arc::new(Pipeline::from_config(&config, &converter).await.with_telemetry(sender));
    tracing::info!(extensions = ?pipeline.registry().extensions(), "Handlers registered");

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown requested");
                cancel.cancel();
                // Conversions already running finish; queued ones fail.
                command.close();
            }
        }
    });

    // Watch first so nothing dropped during the scan is missed.
    let watching = if config.watch {
        let adapter = WatchAdapter::new(pipeline.clone(), &config.root, config.debounce());
        Some(adapter.start(cancel.clone()).await.or_raise(|| ErrorKind::Watch)?)
    } else {
        None
    };

    let tally = initial_scan(&pipeline, &config, &cancel).await;
    tracing::info!(
        handled = tally.handled,
        duplicates = tally.duplicates,
        unhandled = tally.unhandled,
        failed = tally.failed,
        "Initial scan finished"
    );

    if let Some(watching) = watching {
        if !cancel.is_cancelled() {
            tracing::info!("Watching for new files; press Ctrl-C to stop");
        }
        cancel.cancelled().await;
        watching.stopped().await;
    }

    // Last sender goes with the pipeline; the collector then finishes.
    drop(pipeline);
    match collecting.await {
        Ok(stats) => tracing::info!(summary = %stats, "Done"),
        Err(e) => tracing::warn!(error = %e, "Statistics unavailable"),
    }
    Ok(())
}

#[derive(Debug, Default)]
struct Tally {
    handled: u64,
    duplicates: u64,
    unhandled: u64,
    failed: u64,
}

async fn initial_scan(pipeline: &Pipeline, config: &Config, cancel: &CancellationToken) -> Tally {
    let mut tally = Tally::default();
    let mut events = std::pin::pin!(scan(pipeline, &config.root));
    loop {
        let event = tokio::select! {
            () = cancel.cancelled() => {
                tracing::info!("Initial scan interrupted");
                break;
            },
            event = events.next() => event,
        };
        match event {
            None => break,
            Some(Ok(ScanEvent::Processed { outcome, .. })) => match outcome {
                Outcome::Handled { .. } => tally.handled += 1,
                Outcome::Duplicate { .. } => tally.duplicates += 1,
                Outcome::Unhandled { .. } => tally.unhandled += 1,
                Outcome::Vanished | Outcome::Skipped | Outcome::Busy => {},
            },
            Some(Ok(_)) => {},
            Some(Err(e)) => {
                tally.failed += 1;
                tracing::warn!(error = ?e, "Failed to process file");
            },
        }
    }
    tally
}
