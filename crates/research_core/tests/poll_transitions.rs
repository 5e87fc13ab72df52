use pretty_assertions::assert_eq;
use research_core::{
    update_poll, JobStatus, PollEffect, PollMsg, PollPhase, PollState, JOB_FAILED_MESSAGE,
};

/// Drives the machine the way a runner would, answering each `CheckStatus`
/// with the next scripted response. Returns the final state and every effect.
fn drive(responses: Vec<Result<JobStatus, &str>>) -> (PollState, Vec<PollEffect>) {
    let mut responses = responses.into_iter();
    let (mut state, mut pending) = update_poll(PollState::new("job-1"), PollMsg::Started);
    let mut seen = Vec::new();

    while let Some(effect) = pending.first().cloned() {
        pending.remove(0);
        seen.push(effect.clone());
        let msg = match effect {
            PollEffect::CheckStatus => match responses.next() {
                Some(Ok(status)) => PollMsg::StatusReceived(status),
                Some(Err(message)) => PollMsg::StatusCheckFailed(message.to_string()),
                None => break,
            },
            PollEffect::ScheduleCheck => PollMsg::TimerElapsed,
            PollEffect::FetchReport | PollEffect::ReportFailure(_) => break,
            PollEffect::ReportTransientError(_) => continue,
        };
        let (next, effects) = update_poll(state, msg);
        state = next;
        pending.extend(effects);
    }

    (state, seen)
}

fn count(effects: &[PollEffect], wanted: &PollEffect) -> usize {
    effects.iter().filter(|effect| *effect == wanted).count()
}

#[test]
fn start_moves_submitted_to_polling() {
    let state = PollState::new("job-1");
    assert_eq!(state.phase(), PollPhase::Submitted);

    let (state, effects) = update_poll(state, PollMsg::Started);
    assert_eq!(state.phase(), PollPhase::Polling);
    assert_eq!(state.checks_issued(), 1);
    assert_eq!(effects, vec![PollEffect::CheckStatus]);
}

#[test]
fn pending_pending_completed_issues_three_checks_and_one_fetch() {
    let (state, effects) = drive(vec![
        Ok(JobStatus::Pending),
        Ok(JobStatus::Pending),
        Ok(JobStatus::Completed),
    ]);

    assert_eq!(state.phase(), PollPhase::Completed);
    assert_eq!(state.checks_issued(), 3);
    assert_eq!(count(&effects, &PollEffect::CheckStatus), 3);
    assert_eq!(count(&effects, &PollEffect::FetchReport), 1);
    assert_eq!(effects.last(), Some(&PollEffect::FetchReport));
}

#[test]
fn failed_status_is_terminal_with_user_message() {
    let (state, effects) = drive(vec![Ok(JobStatus::InProgress), Ok(JobStatus::Failed)]);

    assert_eq!(state.phase(), PollPhase::Failed);
    assert!(state.is_finished());
    assert_eq!(
        effects.last(),
        Some(&PollEffect::ReportFailure(JOB_FAILED_MESSAGE.to_string()))
    );
    assert_eq!(count(&effects, &PollEffect::FetchReport), 0);
}

#[test]
fn transient_error_keeps_polling() {
    let (state, effects) = drive(vec![
        Ok(JobStatus::InProgress),
        Err("connection reset"),
        Ok(JobStatus::Completed),
    ]);

    assert_eq!(state.phase(), PollPhase::Completed);
    assert_eq!(state.checks_issued(), 3);
    assert_eq!(state.last_error(), None);
    assert_eq!(
        count(
            &effects,
            &PollEffect::ReportTransientError("connection reset".to_string())
        ),
        1
    );
}

#[test]
fn transient_error_is_remembered_until_next_status() {
    let (state, _) = update_poll(PollState::new("job-2"), PollMsg::Started);
    let (state, effects) = update_poll(state, PollMsg::StatusCheckFailed("timeout".into()));

    assert_eq!(state.phase(), PollPhase::Polling);
    assert_eq!(state.last_error(), Some("timeout"));
    assert_eq!(
        effects,
        vec![
            PollEffect::ReportTransientError("timeout".into()),
            PollEffect::ScheduleCheck,
        ]
    );
}

#[test]
fn cancellation_discards_late_results() {
    let (state, _) = update_poll(PollState::new("job-3"), PollMsg::Started);
    let (state, effects) = update_poll(state, PollMsg::Cancelled);
    assert!(effects.is_empty());
    assert!(state.is_finished());

    // The in-flight check answers after teardown.
    let (state, effects) = update_poll(state, PollMsg::StatusReceived(JobStatus::Completed));
    assert_eq!(state.phase(), PollPhase::Polling);
    assert!(effects.is_empty());
}

#[test]
fn messages_after_terminal_state_are_ignored() {
    let (state, _) = drive(vec![Ok(JobStatus::Completed)]);
    let (state, effects) = update_poll(state, PollMsg::TimerElapsed);
    assert_eq!(state.phase(), PollPhase::Completed);
    assert_eq!(state.checks_issued(), 1);
    assert!(effects.is_empty());
}
