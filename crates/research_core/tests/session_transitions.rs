use std::sync::Once;

use pretty_assertions::assert_eq;
use research_core::{
    update_session, SessionEffect, SessionMsg, SessionPhase, SessionState, UserProfile,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(client_logging::initialize_for_tests);
}

fn confirmed_user(email: &str) -> UserProfile {
    UserProfile {
        id: Some(7),
        email: email.to_string(),
        username: email.split('@').next().unwrap().to_string(),
        created_at: "2025-03-01T10:00:00".to_string(),
        provisional: false,
    }
}

fn signed_in(user: Option<UserProfile>, epoch: u64) -> SessionMsg {
    SessionMsg::SignedIn { user, epoch }
}

fn confirmed(profile: UserProfile, epoch: u64) -> SessionMsg {
    SessionMsg::ProfileConfirmed { profile, epoch }
}

fn mounted() -> SessionState {
    let (state, _) = update_session(SessionState::new(), SessionMsg::Mounted);
    state
}

#[test]
fn mount_starts_resolution_once() {
    init_logging();
    let (mut state, effects) = update_session(SessionState::new(), SessionMsg::Mounted);
    assert_eq!(*state.phase(), SessionPhase::Resolving);
    assert_eq!(effects, vec![SessionEffect::ResolveUser]);
    assert!(state.is_loading());
    assert!(state.consume_dirty());

    let (state, effects) = update_session(state, SessionMsg::Mounted);
    assert_eq!(*state.phase(), SessionPhase::Resolving);
    assert!(effects.is_empty());
}

#[test]
fn restored_session_authenticates_and_prefetches() {
    init_logging();
    let user = confirmed_user("ada@example.com");
    let (state, effects) =
        update_session(mounted(), SessionMsg::UserResolved(Some(user.clone())));

    assert_eq!(state.user(), Some(&user));
    assert!(state.is_authenticated());
    assert!(!state.is_loading());
    assert_eq!(effects, vec![SessionEffect::StartPrefetch]);
}

#[test]
fn no_credential_resolves_to_anonymous() {
    init_logging();
    let (state, effects) = update_session(mounted(), SessionMsg::UserResolved(None));
    assert_eq!(*state.phase(), SessionPhase::Anonymous);
    assert!(!state.is_authenticated());
    assert!(effects.is_empty());
}

#[test]
fn provisional_user_requests_confirmation() {
    init_logging();
    let provisional = UserProfile::provisional(Some("grace@example.com"), "now");
    let (state, effects) = update_session(mounted(), signed_in(Some(provisional.clone()), 0));

    assert!(state.is_authenticated());
    assert_eq!(
        effects,
        vec![
            SessionEffect::StartPrefetch,
            SessionEffect::ConfirmProfile {
                provisional,
                epoch: 0
            },
        ]
    );
}

#[test]
fn confirmation_replaces_provisional_profile_with_same_identity() {
    init_logging();
    let provisional = UserProfile::provisional(Some("Grace@Example.com"), "now");
    let (state, _) = update_session(mounted(), signed_in(Some(provisional), 0));

    let authoritative = confirmed_user("grace@example.com");
    let (state, effects) = update_session(state, confirmed(authoritative.clone(), 0));
    assert_eq!(state.user(), Some(&authoritative));
    assert!(effects.is_empty());
}

#[test]
fn confirmation_for_another_identity_is_ignored() {
    init_logging();
    let provisional = UserProfile::provisional(Some("grace@example.com"), "now");
    let (state, _) = update_session(mounted(), signed_in(Some(provisional.clone()), 0));

    let (state, _) = update_session(state, confirmed(confirmed_user("mallory@example.com"), 0));
    assert_eq!(state.user(), Some(&provisional));
}

#[test]
fn logout_clears_and_ignores_late_resolution() {
    init_logging();
    let (state, effects) = update_session(mounted(), SessionMsg::LogoutRequested);
    assert_eq!(*state.phase(), SessionPhase::Anonymous);
    assert_eq!(effects, vec![SessionEffect::ClearLocalState]);

    // Resolution started by the mount lands after the logout.
    let (state, effects) = update_session(
        state,
        SessionMsg::UserResolved(Some(confirmed_user("ada@example.com"))),
    );
    assert_eq!(*state.phase(), SessionPhase::Anonymous);
    assert!(effects.is_empty());
}

#[test]
fn sign_in_without_resolvable_user_is_anonymous() {
    init_logging();
    let user = confirmed_user("ada@example.com");
    let (state, _) = update_session(mounted(), SessionMsg::UserResolved(Some(user)));
    let (mut state, effects) = update_session(state, signed_in(None, 0));
    assert_eq!(*state.phase(), SessionPhase::Anonymous);
    assert!(effects.is_empty());
    assert!(state.consume_dirty());
    assert!(!state.consume_dirty());
}

#[test]
fn sign_in_started_before_logout_is_dropped() {
    init_logging();
    let (state, _) = update_session(mounted(), SessionMsg::LogoutRequested);
    assert_eq!(state.epoch(), 1);

    let (state, effects) =
        update_session(state, signed_in(Some(confirmed_user("ada@example.com")), 0));
    assert_eq!(*state.phase(), SessionPhase::Anonymous);
    assert!(effects.is_empty());

    let (state, effects) =
        update_session(state, signed_in(Some(confirmed_user("ada@example.com")), 1));
    assert!(state.is_authenticated());
    assert_eq!(effects, vec![SessionEffect::StartPrefetch]);
}

#[test]
fn confirmation_from_before_logout_is_ignored_after_signing_in_again() {
    init_logging();
    let provisional = UserProfile::provisional(Some("grace@example.com"), "now");
    let (state, _) = update_session(mounted(), signed_in(Some(provisional.clone()), 0));
    let (state, _) = update_session(state, SessionMsg::LogoutRequested);
    let (state, _) = update_session(state, signed_in(Some(provisional.clone()), 1));

    let (state, _) = update_session(state, confirmed(confirmed_user("grace@example.com"), 0));
    assert_eq!(state.user(), Some(&provisional));
}
