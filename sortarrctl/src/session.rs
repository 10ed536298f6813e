use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use dialoguer::Select;
use dialoguer::console::Term;
use sortarr_core::{
    BatchConfig, BatchSummary, Decision, DisambiguationRequest, JobId, LocalFileOps,
    SortController, SortEvent, TmdbProvider,
};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, info, warn};

use crate::cli::SortArgs;
use crate::config::{SettingsSource, SorterSettings};
use crate::render;

/// Runs one interactive sort batch to completion.
///
/// The first Ctrl-C finishes the file in flight and stops; a second one
/// stops immediately.
pub async fn run_sort(args: SortArgs) -> Result<BatchSummary> {
    let api_key = args
        .tmdb_api_key
        .clone()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| anyhow!("missing TMDB API key: pass --tmdb-api-key or set TMDB_API_KEY"))?;

    let (mut settings, source) = match &args.config {
        Some(path) => (
            SorterSettings::load_from_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            SettingsSource::File(path.clone()),
        ),
        None => SorterSettings::load_from_env().context("failed to load sorter settings")?,
    };
    match &source {
        SettingsSource::Default => debug!("using default sorter settings"),
        SettingsSource::EnvInline => info!("sorter settings loaded from inline environment json"),
        SettingsSource::EnvPath(path) | SettingsSource::File(path) => {
            info!(path = %path.display(), "sorter settings loaded from file")
        }
    }
    args.apply_to(&mut settings);

    let provider = TmdbProvider::new(api_key).with_language(settings.tmdb_language.clone());
    let mut controller = SortController::new(
        Arc::new(provider),
        Arc::new(LocalFileOps),
        settings.pipeline_settings(),
    );

    let batch = BatchConfig::new(&args.source, &args.destination)
        .with_media_filter(settings.mode)
        .keep_originals(settings.keep_originals);
    let mut events = controller.start(batch)?;

    let (answers_tx, mut answers_rx) = mpsc::unbounded_channel();
    let mut interrupted = false;

    let summary = loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SortEvent::Progress(update)) => {
                    if let Some(line) = render::progress_line(&update) {
                        println!("{line}");
                    }
                }
                Some(SortEvent::Log { level, text }) => {
                    if let Some(line) = render::log_line(level, &text) {
                        eprintln!("{line}");
                    }
                }
                Some(SortEvent::DisambiguationRequest(request)) => {
                    spawn_prompt(request, answers_tx.clone());
                }
                Some(SortEvent::BatchComplete(summary)) => break summary,
                None => break controller.wait().await?,
            },
            Some((job_id, decision)) = answers_rx.recv() => {
                if let Err(err) = controller.decide(job_id, decision) {
                    debug!(%err, "decision arrived after the batch ended");
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                if interrupted {
                    break controller.force_stop().await?;
                }
                interrupted = true;
                eprintln!("Stopping after the current file. Press Ctrl-C again to stop now.");
                if let Err(err) = controller.stop_graceful() {
                    debug!(%err, "stop requested after the batch ended");
                }
            }
        }
    };

    if let Err(err) = controller.wait().await {
        debug!(%err, "worker already joined");
    }
    println!("{}", render::summary_line(&summary));
    Ok(summary)
}

/// Asks on stderr which candidate `request` refers to. Prompt failures
/// count as a skip.
fn spawn_prompt(request: DisambiguationRequest, answers: UnboundedSender<(JobId, Decision)>) {
    tokio::task::spawn_blocking(move || {
        let mut labels: Vec<String> = request.candidates.iter().map(|c| c.label()).collect();
        labels.push("Skip this file".to_string());

        let choice = Select::new()
            .with_prompt(format!("Which title is {}?", request.file_name))
            .items(&labels)
            .default(0)
            .interact_on(&Term::stderr());

        let decision = match choice {
            Ok(idx) => match request.candidates.get(idx) {
                Some(candidate) => Decision::Select(candidate.key()),
                None => Decision::Skip,
            },
            Err(err) => {
                warn!(error = %err, file = %request.file_name, "prompt failed, skipping file");
                Decision::Skip
            }
        };
        let _ = answers.send((request.job_id, decision));
    });
}
