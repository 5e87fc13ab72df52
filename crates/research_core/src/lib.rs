//! Research core: domain types and the pure session and status-poll state machines.
mod cache;
mod effect;
mod msg;
mod state;
mod types;
mod update;

pub use cache::{CacheEntry, PROFILE_TTL_MS, RESULT_TTL_MS};
pub use effect::{PollEffect, SessionEffect, JOB_FAILED_MESSAGE};
pub use msg::{PollMsg, SessionMsg};
pub use state::{PollPhase, PollState, SessionPhase, SessionState};
pub use types::{
    Credential, CredentialSource, HistoryEntry, JobStatus, ReportSection, ResearchHistory,
    ResearchId, ResearchJob, ResearchReport, ResearchRequest, Source, SubmittedResearch,
    UserProfile,
};
pub use update::{update_poll, update_session};
