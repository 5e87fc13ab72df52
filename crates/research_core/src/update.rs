use crate::{
    JobStatus, PollEffect, PollMsg, PollPhase, PollState, SessionEffect, SessionMsg,
    SessionPhase, SessionState, UserProfile, JOB_FAILED_MESSAGE,
};

/// Pure session update: applies a message to state and returns any effects.
pub fn update_session(
    mut state: SessionState,
    msg: SessionMsg,
) -> (SessionState, Vec<SessionEffect>) {
    let effects = match msg {
        SessionMsg::Mounted => {
            if *state.phase() == SessionPhase::Uninitialized {
                state.set_phase(SessionPhase::Resolving);
                vec![SessionEffect::ResolveUser]
            } else {
                Vec::new()
            }
        }
        SessionMsg::UserResolved(user) => {
            // A login or logout may have settled the session while resolution was in flight.
            if *state.phase() != SessionPhase::Resolving {
                return (state, Vec::new());
            }
            authenticate_or_clear(&mut state, user)
        }
        SessionMsg::SignedIn { user, epoch } => {
            // A logout since the sign-in started wins.
            if epoch != state.epoch() {
                return (state, Vec::new());
            }
            authenticate_or_clear(&mut state, user)
        }
        SessionMsg::ProfileConfirmed { profile, epoch } => {
            let replaces_current = epoch == state.epoch()
                && matches!(
                    state.phase(),
                    SessionPhase::Authenticated(current)
                        if current.same_identity(&profile) && *current != profile
                );
            if replaces_current {
                state.set_phase(SessionPhase::Authenticated(profile));
            }
            Vec::new()
        }
        SessionMsg::LogoutRequested => {
            state.end_epoch();
            state.set_phase(SessionPhase::Anonymous);
            vec![SessionEffect::ClearLocalState]
        }
    };

    (state, effects)
}

fn authenticate_or_clear(
    state: &mut SessionState,
    user: Option<UserProfile>,
) -> Vec<SessionEffect> {
    match user {
        Some(user) => {
            let mut effects = vec![SessionEffect::StartPrefetch];
            if user.provisional {
                effects.push(SessionEffect::ConfirmProfile {
                    provisional: user.clone(),
                    epoch: state.epoch(),
                });
            }
            state.set_phase(SessionPhase::Authenticated(user));
            effects
        }
        None => {
            state.set_phase(SessionPhase::Anonymous);
            Vec::new()
        }
    }
}

/// Pure poll update: advances the status-watch machine for one job.
pub fn update_poll(mut state: PollState, msg: PollMsg) -> (PollState, Vec<PollEffect>) {
    if state.is_cancelled() {
        return (state, Vec::new());
    }

    let effects = match msg {
        PollMsg::Started => {
            if state.phase() != PollPhase::Submitted {
                return (state, Vec::new());
            }
            state.set_phase(PollPhase::Polling);
            state.record_check_issued();
            vec![PollEffect::CheckStatus]
        }
        PollMsg::TimerElapsed => {
            if state.phase() != PollPhase::Polling {
                return (state, Vec::new());
            }
            state.record_check_issued();
            vec![PollEffect::CheckStatus]
        }
        PollMsg::StatusReceived(status) => {
            if state.phase() != PollPhase::Polling {
                return (state, Vec::new());
            }
            state.record_status(status);
            match status {
                JobStatus::Pending | JobStatus::InProgress => vec![PollEffect::ScheduleCheck],
                JobStatus::Completed => {
                    state.set_phase(PollPhase::Completed);
                    vec![PollEffect::FetchReport]
                }
                JobStatus::Failed => {
                    state.set_phase(PollPhase::Failed);
                    vec![PollEffect::ReportFailure(JOB_FAILED_MESSAGE.to_string())]
                }
            }
        }
        PollMsg::StatusCheckFailed(message) => {
            if state.phase() != PollPhase::Polling {
                return (state, Vec::new());
            }
            state.record_error(message.clone());
            vec![
                PollEffect::ReportTransientError(message),
                PollEffect::ScheduleCheck,
            ]
        }
        PollMsg::Cancelled => {
            state.cancel();
            Vec::new()
        }
    };

    (state, effects)
}
