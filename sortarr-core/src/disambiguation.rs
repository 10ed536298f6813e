use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::events::{DisambiguationRequest, EventSink, SortEvent};
use crate::job::{JobId, SortJob};
use crate::media::{Candidate, CandidateKey};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Select(CandidateKey),
    Skip,
}

/// A user's answer to one [`DisambiguationRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionMessage {
    pub job_id: JobId,
    pub decision: Decision,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    Selected(Candidate),
    Skipped,
    /// Stop was requested, or the front-end went away, before an answer.
    Stopped,
}

/// Parks the worker on a user decision without polling.
#[derive(Debug)]
pub struct DisambiguationGate {
    decisions: UnboundedReceiver<DecisionMessage>,
    stop: CancellationToken,
}

impl DisambiguationGate {
    pub fn new(decisions: UnboundedReceiver<DecisionMessage>, stop: CancellationToken) -> Self {
        Self { decisions, stop }
    }

    /// Emits exactly one request for `job` and waits for a matching answer.
    ///
    /// Answers for other jobs, or naming a candidate that was not offered,
    /// are ignored and waiting continues.
    pub async fn resolve(
        &mut self,
        job: &SortJob,
        candidates: Vec<Candidate>,
        events: &EventSink,
    ) -> GateOutcome {
        if self.stop.is_cancelled() {
            return GateOutcome::Stopped;
        }

        let job_id = job.id();
        info!(
            job_id = %job_id,
            offered = candidates.len(),
            "waiting for user decision on {}",
            job.file_name()
        );
        events.send(SortEvent::DisambiguationRequest(DisambiguationRequest {
            job_id,
            file_name: job.file_name().to_string(),
            candidates: candidates.clone(),
        }));

        loop {
            let message = tokio::select! {
                biased;
                _ = self.stop.cancelled() => return GateOutcome::Stopped,
                message = self.decisions.recv() => message,
            };

            let Some(message) = message else {
                warn!(job_id = %job_id, "decision channel closed while waiting");
                return GateOutcome::Stopped;
            };

            if message.job_id != job_id {
                warn!(
                    job_id = %job_id,
                    other = %message.job_id,
                    "ignoring decision for another job"
                );
                continue;
            }

            match message.decision {
                Decision::Skip => return GateOutcome::Skipped,
                Decision::Select(key) => {
                    match candidates.iter().find(|candidate| candidate.key() == key) {
                        Some(candidate) => return GateOutcome::Selected(candidate.clone()),
                        None => warn!(
                            job_id = %job_id,
                            provider_id = %key.provider_id,
                            "ignoring selection of a candidate that was not offered"
                        ),
                    }
                }
            }
        }
    }
}
