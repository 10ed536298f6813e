use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Level, debug, info, info_span, warn};

use crate::cache::{CacheKey, IdentityCache};
use crate::config::{BatchConfig, PipelineSettings};
use crate::disambiguation::{Decision, DecisionMessage, DisambiguationGate, GateOutcome};
use crate::error::{Result, SortError};
use crate::events::{BatchPosition, BatchSummary, EventSink, SortEvent, StopKind};
use crate::file_ops::{FileOps, apply_plan};
use crate::gateway::{GatewayError, MetadataGateway};
use crate::job::{JobId, JobStatus, SortJob};
use crate::media::{Candidate, Identity, MediaKind, MediaType, SeasonListing, TitleDetails};
use crate::parser::FilenameParser;
use crate::planner::SortPlanner;
use crate::providers::MetadataProvider;
use crate::ranking::{Aggregator, RankingOutcome};
use crate::scanner::MediaScanner;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    #[error("a batch is already running")]
    AlreadyRunning,

    #[error("no batch is running")]
    NotRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Running,
    /// Stop requested; the in-flight file is being finished.
    StoppingGraceful,
}

/// Owns the background worker of one batch at a time.
///
/// The worker runs on its own tokio task and only talks to the front-end
/// through the event channel returned by [`start`](Self::start) and the
/// decisions sent with [`decide`](Self::decide).
pub struct SortController {
    provider: Arc<dyn MetadataProvider>,
    file_ops: Arc<dyn FileOps>,
    settings: PipelineSettings,
    cache: IdentityCache,
    active: Option<ActiveRun>,
}

#[derive(Debug)]
struct ActiveRun {
    handle: JoinHandle<BatchSummary>,
    stop: CancellationToken,
    decisions: UnboundedSender<DecisionMessage>,
    events: EventSink,
    summary: watch::Receiver<BatchSummary>,
}

impl fmt::Debug for SortController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortController")
            .field("provider", &self.provider.name())
            .field("settings", &self.settings)
            .field("cached_identities", &self.cache.len())
            .field("state", &self.state())
            .finish()
    }
}

impl SortController {
    pub fn new(
        provider: Arc<dyn MetadataProvider>,
        file_ops: Arc<dyn FileOps>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            provider,
            file_ops,
            settings,
            cache: IdentityCache::new(),
            active: None,
        }
    }

    /// Shares an existing cache instead of starting empty.
    pub fn with_cache(mut self, cache: IdentityCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn state(&self) -> ControllerState {
        match &self.active {
            None => ControllerState::Idle,
            Some(run) if run.handle.is_finished() => ControllerState::Idle,
            Some(run) if run.stop.is_cancelled() => ControllerState::StoppingGraceful,
            Some(_) => ControllerState::Running,
        }
    }

    /// Spawns the worker for `batch` on the current tokio runtime.
    pub fn start(
        &mut self,
        batch: BatchConfig,
    ) -> std::result::Result<UnboundedReceiver<SortEvent>, ControllerError> {
        if self.state() != ControllerState::Idle {
            return Err(ControllerError::AlreadyRunning);
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (decision_tx, decision_rx) = mpsc::unbounded_channel();
        let (summary_tx, summary_rx) = watch::channel(BatchSummary::default());
        let stop = CancellationToken::new();
        let events = EventSink::new(event_tx);

        let gateway = MetadataGateway::new(Arc::clone(&self.provider), self.settings.call_timeout);
        let worker = Worker {
            aggregator: Aggregator::new(gateway, self.settings.confident_results_target),
            cache: self.cache.clone(),
            file_ops: Arc::clone(&self.file_ops),
            parser: FilenameParser::with_source_root(&batch.source_dir),
            planner: SortPlanner::new(&batch.destination_dir, batch.action()),
            video_extensions: self.settings.video_extensions.clone(),
            batch,
            events: events.clone(),
            gate: DisambiguationGate::new(decision_rx, stop.clone()),
            stop: stop.clone(),
            summary: summary_tx,
            position: BatchPosition::default(),
        };

        info!(
            source = %worker.batch.source_dir.display(),
            destination = %worker.batch.destination_dir.display(),
            filter = %worker.batch.media_filter,
            keep_originals = worker.batch.keep_originals,
            "starting sort batch"
        );
        let handle = tokio::spawn(worker.run());

        self.active = Some(ActiveRun {
            handle,
            stop,
            decisions: decision_tx,
            events,
            summary: summary_rx,
        });
        Ok(event_rx)
    }

    /// Answers the pending disambiguation request of `job_id`.
    pub fn decide(
        &self,
        job_id: JobId,
        decision: Decision,
    ) -> std::result::Result<(), ControllerError> {
        let run = self.running()?;
        run.decisions
            .send(DecisionMessage { job_id, decision })
            .map_err(|_| ControllerError::NotRunning)
    }

    /// Lets the in-flight file finish, then ends the batch.
    pub fn stop_graceful(&self) -> std::result::Result<(), ControllerError> {
        let run = self.running()?;
        info!("graceful stop requested");
        run.stop.cancel();
        Ok(())
    }

    /// Tears the worker down without waiting for the current file.
    ///
    /// Plans already applied and identities already cached stay as they
    /// are. The final `BatchComplete` is sent from the last published
    /// summary.
    pub async fn force_stop(&mut self) -> std::result::Result<BatchSummary, ControllerError> {
        let run = self.active.take().ok_or(ControllerError::NotRunning)?;
        warn!("force stop requested");
        run.stop.cancel();
        run.handle.abort();

        Ok(run.join().await)
    }

    /// Waits for the running batch to end on its own.
    pub async fn wait(&mut self) -> std::result::Result<BatchSummary, ControllerError> {
        let run = self.active.take().ok_or(ControllerError::NotRunning)?;
        Ok(run.join().await)
    }

    fn running(&self) -> std::result::Result<&ActiveRun, ControllerError> {
        self.active
            .as_ref()
            .filter(|run| !run.handle.is_finished())
            .ok_or(ControllerError::NotRunning)
    }
}

impl ActiveRun {
    /// Summary of the finished task. A task that did not return on its own
    /// gets its `BatchComplete` sent here, from the last published snapshot.
    async fn join(self) -> BatchSummary {
        match self.handle.await {
            Ok(summary) => summary,
            Err(err) => {
                let mut summary = self.summary.borrow().clone();
                summary.stop = if err.is_cancelled() {
                    StopKind::Forced
                } else {
                    StopKind::Aborted(format!("worker task failed: {err}"))
                };
                self.events.send(SortEvent::BatchComplete(summary.clone()));
                summary
            }
        }
    }
}

enum Flow {
    Continue(JobStatus),
    Stop(JobStatus, StopKind),
}

struct Worker {
    aggregator: Aggregator,
    cache: IdentityCache,
    file_ops: Arc<dyn FileOps>,
    parser: FilenameParser,
    planner: SortPlanner,
    video_extensions: Vec<String>,
    batch: BatchConfig,
    events: EventSink,
    gate: DisambiguationGate,
    stop: CancellationToken,
    summary: watch::Sender<BatchSummary>,
    position: BatchPosition,
}

impl Worker {
    async fn run(mut self) -> BatchSummary {
        let files = match self.scan().await {
            Ok(files) => files,
            Err(reason) => {
                self.events.log(Level::ERROR, format!("scan failed: {reason}"));
                let summary = BatchSummary {
                    stop: StopKind::Aborted(reason),
                    ..BatchSummary::default()
                };
                return self.complete(summary);
            }
        };

        let mut summary = BatchSummary::new(files.len());
        self.summary.send_replace(summary.clone());

        let total = files.len();
        for (idx, path) in files.into_iter().enumerate() {
            if self.stop.is_cancelled() {
                summary.stop = StopKind::Graceful;
                break;
            }

            self.position = BatchPosition {
                index: idx + 1,
                total,
            };

            match self.process(&path).await {
                Flow::Continue(status) => summary.record(status),
                Flow::Stop(status, stop) => {
                    summary.record(status);
                    summary.stop = stop;
                    self.summary.send_replace(summary.clone());
                    break;
                }
            }
            self.summary.send_replace(summary.clone());
        }

        self.complete(summary)
    }

    fn complete(&self, summary: BatchSummary) -> BatchSummary {
        self.summary.send_replace(summary.clone());
        self.events.log(Level::INFO, format!("batch finished: {summary}"));
        self.events.send(SortEvent::BatchComplete(summary.clone()));
        summary
    }

    async fn scan(&self) -> std::result::Result<Vec<PathBuf>, String> {
        let scanner = MediaScanner::new()
            .with_extensions(self.video_extensions.clone())
            .excluding(&self.batch.destination_dir);
        let source = self.batch.source_dir.clone();

        let result = tokio::task::spawn_blocking(move || scanner.scan_directory(source))
            .await
            .map_err(|err| format!("scan task failed: {err}"))?
            .map_err(|err| err.to_string())?;

        for error in &result.errors {
            self.events.log(Level::WARN, error.clone());
        }
        self.events.log(
            Level::INFO,
            format!(
                "found {} video files in {}",
                result.video_files.len(),
                self.batch.source_dir.display()
            ),
        );
        Ok(result.video_files)
    }

    async fn process(&mut self, path: &Path) -> Flow {
        let job = SortJob::new(path, self.parser.parse(path));
        let span = info_span!("sort_job", job_id = %job.id(), path = %path.display());
        self.process_job(job).instrument(span).await
    }

    async fn process_job(&mut self, mut job: SortJob) -> Flow {
        self.events.progress(&job, self.position);
        let outcome = self.sort_job(&mut job).await;

        let flow = match outcome {
            Ok(()) => Flow::Continue(job.status()),
            Err(err) => {
                let stop = if err.aborts_batch() {
                    Some(StopKind::Aborted(err.to_string()))
                } else if err == SortError::Interrupted {
                    Some(StopKind::Graceful)
                } else {
                    None
                };

                let level = if err.is_skip() { Level::INFO } else { Level::WARN };
                self.events
                    .log(level, format!("{}: {}", job.file_name(), err));
                if let Err(internal) = job.finish_with(err) {
                    warn!("{}", internal);
                }

                match stop {
                    Some(stop) => Flow::Stop(job.status(), stop),
                    None => Flow::Continue(job.status()),
                }
            }
        };

        self.events.progress(&job, self.position);
        flow
    }

    async fn sort_job(&mut self, job: &mut SortJob) -> Result<()> {
        let kind = job.parsed().kind;
        if !self.batch.media_filter.admits(kind) {
            return Err(SortError::Filtered(self.batch.media_filter));
        }
        if kind == MediaKind::Unknown {
            return Err(SortError::ParseAmbiguous(job.file_name().to_string()));
        }

        let identity = self.identify(job).await?;
        info!(phase = "identify", "identified as {}", identity.title());
        job.resolve(identity)?;

        let plan = self.planner.plan(job)?;
        let plan = job.attach_plan(plan)?.clone();
        apply_plan(self.file_ops.as_ref(), &plan).await?;
        self.events.log(
            Level::INFO,
            format!(
                "{} -> {}",
                job.file_name(),
                plan.destination_path.display()
            ),
        );
        Ok(())
    }

    async fn identify(&mut self, job: &mut SortJob) -> Result<Arc<Identity>> {
        let parsed = job.parsed().clone();

        if let (Some(season), Some(folder)) = (parsed.season, parsed.show_folder.as_ref())
            && let Some(show) = self.cache.lookup(&CacheKey::ShowFolder(folder.clone()))
        {
            debug!(phase = "cache", folder = %folder.display(), "show folder alias hit");
            return self
                .identify_season(show.details(), season, Some(folder.as_path()))
                .await;
        }

        let candidate = self.choose(job).await?;
        match (candidate.kind, parsed.season) {
            (MediaType::Movie, _) => self.identify_movie(&candidate).await,
            (MediaType::Tv, Some(season)) => {
                let key = CacheKey::Season {
                    show_id: candidate.provider_id.clone(),
                    season,
                };
                if let Some(hit) = self.cache.lookup(&key) {
                    debug!(phase = "cache", "season cache hit");
                    self.alias_show_folder(parsed.show_folder.as_deref(), &hit);
                    return Ok(hit);
                }

                let details = self
                    .aggregator
                    .gateway()
                    .fetch_details(&candidate.provider_id, MediaType::Tv)
                    .await?;
                self.identify_season(details, season, parsed.show_folder.as_deref())
                    .await
            }
            (MediaType::Tv, None) => Err(SortError::IncompleteMetadata(format!(
                "'{}' was matched to a series but has no season/episode marker",
                job.file_name()
            ))),
        }
    }

    /// Runs the search and, when needed, asks the user to pick.
    async fn choose(&mut self, job: &mut SortJob) -> Result<Candidate> {
        let ranking = self.aggregator.aggregate(job.parsed()).await?;

        match ranking.outcome() {
            RankingOutcome::NoMatch => {
                Err(SortError::NoMatch(job.parsed().guessed_title.clone()))
            }
            RankingOutcome::Confident(candidate) => {
                debug!(phase = "rank", "auto-selected {}", candidate.label());
                Ok(candidate)
            }
            RankingOutcome::Ambiguous(candidates) => {
                job.mark_awaiting_user()?;
                self.events.progress(job, self.position);

                match self.gate.resolve(job, candidates, &self.events).await {
                    GateOutcome::Selected(candidate) => {
                        info!(phase = "decide", "user selected {}", candidate.label());
                        Ok(candidate)
                    }
                    GateOutcome::Skipped => Err(SortError::UserSkipped),
                    GateOutcome::Stopped => Err(SortError::Interrupted),
                }
            }
        }
    }

    async fn identify_movie(&self, candidate: &Candidate) -> Result<Arc<Identity>> {
        if let Some(hit) = self
            .cache
            .lookup(&CacheKey::Movie(candidate.provider_id.clone()))
        {
            debug!(phase = "cache", "movie cache hit");
            return Ok(hit);
        }

        let details = self
            .aggregator
            .gateway()
            .fetch_details(&candidate.provider_id, MediaType::Movie)
            .await?;
        let key = CacheKey::Movie(details.provider_id.clone());
        self.cache
            .commit(key, Identity::movie(details))
            .map_err(|err| SortError::Internal(err.to_string()))
    }

    /// Resolves one season of a known show. The season entry is committed
    /// only with its full episode list, and the folder alias only after it.
    async fn identify_season(
        &self,
        show: TitleDetails,
        season: u32,
        show_folder: Option<&Path>,
    ) -> Result<Arc<Identity>> {
        let key = CacheKey::Season {
            show_id: show.provider_id.clone(),
            season,
        };
        if let Some(hit) = self.cache.lookup(&key) {
            debug!(phase = "cache", "season cache hit");
            return Ok(hit);
        }

        let episodes = match self
            .aggregator
            .gateway()
            .fetch_season(&show.provider_id, season)
            .await
        {
            Ok(episodes) => episodes,
            Err(err @ GatewayError::Unavailable { .. }) => return Err(err.into()),
            Err(err) => {
                return Err(SortError::IncompleteMetadata(format!(
                    "season {season} of '{}' could not be fetched: {err}",
                    show.title
                )));
            }
        };

        let listing = SeasonListing::new(season, episodes)?;
        let identity = self
            .cache
            .commit(key, Identity::with_season(show, listing))
            .map_err(|err| SortError::Internal(err.to_string()))?;
        self.alias_show_folder(show_folder, &identity);
        Ok(identity)
    }

    fn alias_show_folder(&self, folder: Option<&Path>, identity: &Arc<Identity>) {
        let Some(folder) = folder else {
            return;
        };
        if let Err(err) = self
            .cache
            .commit_shared(CacheKey::ShowFolder(folder.to_path_buf()), Arc::clone(identity))
        {
            warn!("could not alias {}: {}", folder.display(), err);
        }
    }
}
