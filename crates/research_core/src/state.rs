use crate::{JobStatus, ResearchId, UserProfile};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Uninitialized,
    Resolving,
    Authenticated(UserProfile),
    Anonymous,
}

/// Tab-wide authentication state as seen by consumers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    phase: SessionPhase,
    epoch: u64,
    dirty: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    /// Advances on every logout. Work started in an earlier epoch must not land.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn user(&self) -> Option<&UserProfile> {
        match &self.phase {
            SessionPhase::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    /// Derived only from the presence of a resolved user, never from token validity.
    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }

    pub fn is_loading(&self) -> bool {
        matches!(
            self.phase,
            SessionPhase::Uninitialized | SessionPhase::Resolving
        )
    }

    /// Returns whether the phase changed since the last call, and resets the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn set_phase(&mut self, phase: SessionPhase) {
        if self.phase != phase {
            self.phase = phase;
            self.dirty = true;
        }
    }

    pub(crate) fn end_epoch(&mut self) {
        self.epoch += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollPhase {
    #[default]
    Submitted,
    Polling,
    Completed,
    Failed,
}

/// Progress of watching one research job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollState {
    job_id: ResearchId,
    phase: PollPhase,
    checks_issued: u32,
    last_status: Option<JobStatus>,
    last_error: Option<String>,
    cancelled: bool,
}

impl PollState {
    pub fn new(job_id: impl Into<ResearchId>) -> Self {
        Self {
            job_id: job_id.into(),
            phase: PollPhase::Submitted,
            checks_issued: 0,
            last_status: None,
            last_error: None,
            cancelled: false,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    pub fn checks_issued(&self) -> u32 {
        self.checks_issued
    }

    pub fn last_status(&self) -> Option<JobStatus> {
        self.last_status
    }

    /// Most recent transient error; cleared by the next successful check.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// True once no further effects will be produced.
    pub fn is_finished(&self) -> bool {
        self.cancelled || matches!(self.phase, PollPhase::Completed | PollPhase::Failed)
    }

    pub(crate) fn set_phase(&mut self, phase: PollPhase) {
        self.phase = phase;
    }

    pub(crate) fn record_check_issued(&mut self) {
        self.checks_issued += 1;
    }

    pub(crate) fn record_status(&mut self, status: JobStatus) {
        self.last_status = Some(status);
        self.last_error = None;
    }

    pub(crate) fn record_error(&mut self, message: String) {
        self.last_error = Some(message);
    }

    pub(crate) fn cancel(&mut self) {
        self.cancelled = true;
    }
}
