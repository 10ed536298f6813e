use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SortError};
use crate::media::Identity;
use crate::parser::ParsedFilename;
use crate::planner::FilePlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    AwaitingUser,
    Resolved,
    Skipped,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Skipped | JobStatus::Failed)
    }

    /// Statuses only move forward. A resolved job can still fail while
    /// planning or moving.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (Pending, AwaitingUser | Resolved | Skipped | Failed) => true,
            (AwaitingUser, AwaitingUser | Resolved | Skipped | Failed) => true,
            (Resolved, Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobStatus::Pending => "pending",
            JobStatus::AwaitingUser => "awaiting user",
            JobStatus::Resolved => "resolved",
            JobStatus::Skipped => "skipped",
            JobStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Record of one file moving through the pipeline.
#[derive(Debug, Clone)]
pub struct SortJob {
    id: JobId,
    source_path: PathBuf,
    parsed: ParsedFilename,
    resolved: Option<Arc<Identity>>,
    status: JobStatus,
    plan: Option<FilePlan>,
    failure: Option<SortError>,
}

impl SortJob {
    pub fn new(source_path: impl AsRef<Path>, parsed: ParsedFilename) -> Self {
        Self {
            id: JobId::new(),
            source_path: source_path.as_ref().to_path_buf(),
            parsed,
            resolved: None,
            status: JobStatus::Pending,
            plan: None,
            failure: None,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn parsed(&self) -> &ParsedFilename {
        &self.parsed
    }

    pub fn file_name(&self) -> &str {
        &self.parsed.raw_name
    }

    pub fn identity(&self) -> Option<&Arc<Identity>> {
        self.resolved.as_ref()
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn plan(&self) -> Option<&FilePlan> {
        self.plan.as_ref()
    }

    pub fn failure(&self) -> Option<&SortError> {
        self.failure.as_ref()
    }

    pub fn mark_awaiting_user(&mut self) -> Result<()> {
        self.transition(JobStatus::AwaitingUser)
    }

    pub fn resolve(&mut self, identity: Arc<Identity>) -> Result<()> {
        self.transition(JobStatus::Resolved)?;
        self.resolved = Some(identity);
        Ok(())
    }

    /// Ends the job as skipped or failed depending on `reason`.
    pub fn finish_with(&mut self, reason: SortError) -> Result<()> {
        let next = if reason.is_skip() {
            JobStatus::Skipped
        } else {
            JobStatus::Failed
        };
        self.transition(next)?;
        self.failure = Some(reason);
        Ok(())
    }

    /// Plans can be attached once, and only to a resolved job.
    pub fn attach_plan(&mut self, plan: FilePlan) -> Result<&FilePlan> {
        if self.status != JobStatus::Resolved {
            return Err(SortError::Internal(format!(
                "job {} cannot be planned while {}",
                self.id, self.status
            )));
        }
        if self.plan.is_some() {
            return Err(SortError::Internal(format!(
                "job {} already has a plan",
                self.id
            )));
        }
        Ok(self.plan.insert(plan))
    }

    fn transition(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(SortError::Internal(format!(
                "job {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }
}
