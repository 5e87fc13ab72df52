use crate::UserProfile;

/// Message surfaced when the backend reports a job as failed.
pub const JOB_FAILED_MESSAGE: &str = "Research failed. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEffect {
    ResolveUser,
    /// Warm the result cache; never awaited by the caller.
    StartPrefetch,
    ConfirmProfile {
        provisional: UserProfile,
        epoch: u64,
    },
    ClearLocalState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEffect {
    CheckStatus,
    /// Wait one poll interval, then deliver `PollMsg::TimerElapsed`.
    ScheduleCheck,
    FetchReport,
    ReportFailure(String),
    ReportTransientError(String),
}
