use std::collections::VecDeque;
use std::time::Duration;

use client_logging::{client_debug, client_warn};
use research_core::{
    update_poll, JobStatus, PollEffect, PollMsg, PollPhase, PollState, ResearchReport,
};
use tokio_util::sync::CancellationToken;

use crate::error::ClientError;
use crate::research::ResearchService;

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    StatusChecked { check: u32, status: JobStatus },
    /// A status check failed; polling continues.
    TransientError { message: String },
    Finished { phase: PollPhase },
}

pub trait PollSink: Send + Sync {
    fn emit(&self, event: PollEvent);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Completed(ResearchReport),
    Failed(String),
    Cancelled,
}

/// Watches one job until a terminal status or cancellation.
#[derive(Clone)]
pub struct StatusPoller {
    research: ResearchService,
    settings: PollSettings,
}

impl StatusPoller {
    pub fn new(research: ResearchService, settings: PollSettings) -> Self {
        Self { research, settings }
    }

    /// Checks are strictly sequential. Cancelling stops further checks; a check
    /// already in flight completes but its answer is dropped.
    pub async fn watch(
        &self,
        job_id: &str,
        cancel: &CancellationToken,
        sink: &dyn PollSink,
    ) -> Result<PollOutcome, ClientError> {
        let mut state = PollState::new(job_id);
        let mut inbox = VecDeque::from([PollMsg::Started]);
        if cancel.is_cancelled() {
            inbox.push_front(PollMsg::Cancelled);
        }

        while let Some(msg) = inbox.pop_front() {
            let (next, effects) = update_poll(state, msg);
            state = next;

            for effect in effects {
                match effect {
                    PollEffect::CheckStatus => {
                        let result = self.research.status(job_id).await;
                        if cancel.is_cancelled() {
                            inbox.push_back(PollMsg::Cancelled);
                            continue;
                        }
                        match result {
                            Ok(status) => {
                                client_debug!("Job {} status {:?}", job_id, status);
                                sink.emit(PollEvent::StatusChecked {
                                    check: state.checks_issued(),
                                    status,
                                });
                                inbox.push_back(PollMsg::StatusReceived(status));
                            }
                            Err(err) => inbox.push_back(PollMsg::StatusCheckFailed(err.message)),
                        }
                    }
                    PollEffect::ScheduleCheck => {
                        tokio::select! {
                            _ = cancel.cancelled() => inbox.push_back(PollMsg::Cancelled),
                            _ = tokio::time::sleep(self.settings.interval) => {
                                inbox.push_back(PollMsg::TimerElapsed)
                            }
                        }
                    }
                    PollEffect::FetchReport => {
                        let report = self.research.report(job_id).await;
                        if cancel.is_cancelled() {
                            return Ok(PollOutcome::Cancelled);
                        }
                        let report = report?;
                        sink.emit(PollEvent::Finished {
                            phase: PollPhase::Completed,
                        });
                        return Ok(PollOutcome::Completed(report));
                    }
                    PollEffect::ReportFailure(message) => {
                        sink.emit(PollEvent::Finished {
                            phase: PollPhase::Failed,
                        });
                        return Ok(PollOutcome::Failed(message));
                    }
                    PollEffect::ReportTransientError(message) => {
                        client_warn!("Status check for {} failed: {}", job_id, message);
                        sink.emit(PollEvent::TransientError { message });
                    }
                }
            }

            if state.is_cancelled() {
                client_debug!("Stopped watching job {}", job_id);
                return Ok(PollOutcome::Cancelled);
            }
        }

        Ok(PollOutcome::Cancelled)
    }
}
