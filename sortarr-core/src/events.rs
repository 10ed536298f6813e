use std::fmt;
use std::path::PathBuf;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{Level, debug, error, info, trace, warn};

use crate::job::{JobId, JobStatus, SortJob};
use crate::media::Candidate;

/// Everything the worker tells its front-end.
#[derive(Debug, Clone)]
pub enum SortEvent {
    Progress(ProgressUpdate),
    Log { level: Level, text: String },
    DisambiguationRequest(DisambiguationRequest),
    BatchComplete(BatchSummary),
}

/// One-based position of a file within its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchPosition {
    pub index: usize,
    pub total: usize,
}

impl fmt::Display for BatchPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.index, self.total)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub job_id: JobId,
    pub file_name: String,
    pub position: BatchPosition,
    pub status: JobStatus,
    /// Human readable reason for skipped and failed jobs.
    pub reason: Option<String>,
    pub destination: Option<PathBuf>,
}

impl ProgressUpdate {
    pub fn from_job(job: &SortJob, position: BatchPosition) -> Self {
        Self {
            job_id: job.id(),
            file_name: job.file_name().to_string(),
            position,
            status: job.status(),
            reason: job.failure().map(ToString::to_string),
            destination: job.plan().map(|plan| plan.destination_path.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisambiguationRequest {
    pub job_id: JobId,
    pub file_name: String,
    /// Best first.
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StopKind {
    #[default]
    Completed,
    Graceful,
    Forced,
    Aborted(String),
}

impl fmt::Display for StopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopKind::Completed => write!(f, "completed"),
            StopKind::Graceful => write!(f, "stopped"),
            StopKind::Forced => write!(f, "force stopped"),
            StopKind::Aborted(reason) => write!(f, "aborted: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub resolved: usize,
    pub skipped: usize,
    pub failed: usize,
    pub stop: StopKind,
}

impl BatchSummary {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn record(&mut self, status: JobStatus) {
        match status {
            JobStatus::Resolved => self.resolved += 1,
            JobStatus::Skipped => self.skipped += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::Pending | JobStatus::AwaitingUser => {}
        }
    }

    pub fn processed(&self) -> usize {
        self.resolved + self.skipped + self.failed
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.stop, StopKind::Aborted(_))
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} files processed ({} sorted, {} skipped, {} failed), {}",
            self.processed(),
            self.total,
            self.resolved,
            self.skipped,
            self.failed,
            self.stop
        )
    }
}

/// Sending half of the event channel. A vanished receiver is not an error
/// for the worker, so send failures are dropped.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: UnboundedSender<SortEvent>,
}

impl EventSink {
    pub fn new(tx: UnboundedSender<SortEvent>) -> Self {
        Self { tx }
    }

    pub fn send(&self, event: SortEvent) {
        let _ = self.tx.send(event);
    }

    pub fn progress(&self, job: &SortJob, position: BatchPosition) {
        self.send(SortEvent::Progress(ProgressUpdate::from_job(job, position)));
    }

    /// Traces `text` locally and forwards it to the front-end.
    pub fn log(&self, level: Level, text: impl Into<String>) {
        let text = text.into();
        if level == Level::ERROR {
            error!("{}", text);
        } else if level == Level::WARN {
            warn!("{}", text);
        } else if level == Level::INFO {
            info!("{}", text);
        } else if level == Level::DEBUG {
            debug!("{}", text);
        } else {
            trace!("{}", text);
        }
        self.send(SortEvent::Log { level, text });
    }
}
