use crate::{JobStatus, UserProfile};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMsg {
    /// A consumer attached to the session; resolve whatever credential is already stored.
    Mounted,
    /// Outcome of the resolution requested after `Mounted`.
    UserResolved(Option<UserProfile>),
    /// Login, registration or an OAuth redirect-back finished and the user was re-resolved.
    /// `epoch` is the session epoch the sign-in started in.
    SignedIn {
        user: Option<UserProfile>,
        epoch: u64,
    },
    /// The backend answered for a provisional profile.
    ProfileConfirmed { profile: UserProfile, epoch: u64 },
    /// User asked to sign out.
    LogoutRequested,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollMsg {
    /// The job was submitted and the consumer started watching it.
    Started,
    /// A status check answered.
    StatusReceived(JobStatus),
    /// A status check failed before producing a status.
    StatusCheckFailed(String),
    /// The scheduled delay between checks elapsed.
    TimerElapsed,
    /// The consumer went away.
    Cancelled,
}
