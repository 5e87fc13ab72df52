use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use client_logging::{client_debug, client_info, client_warn};
use research_core::{
    update_session, SessionEffect, SessionMsg, SessionPhase, SessionState, UserProfile,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{ClientError, ErrorKind};
use crate::gateway::IdentityGateway;
use crate::prefetch::{PrefetchCoordinator, PrefetchSummary};
use crate::result_cache::ResultCache;

struct Inner {
    gateway: IdentityGateway,
    cache: ResultCache,
    prefetch: PrefetchCoordinator,
    state: Mutex<SessionState>,
    phase_tx: watch::Sender<SessionPhase>,
    prefetch_task: Mutex<Option<JoinHandle<PrefetchSummary>>>,
    /// Cancelled on logout; background work for the signed-in user runs under it.
    signed_in: Mutex<CancellationToken>,
}

/// Shared authentication state plus the init, login and logout lifecycle.
///
/// Cloning yields another handle onto the same session.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<Inner>,
}

impl SessionContext {
    pub fn new(
        gateway: IdentityGateway,
        cache: ResultCache,
        prefetch: PrefetchCoordinator,
    ) -> Self {
        let (phase_tx, _) = watch::channel(SessionPhase::Uninitialized);
        Self {
            inner: Arc::new(Inner {
                gateway,
                cache,
                prefetch,
                state: Mutex::new(SessionState::new()),
                phase_tx,
                prefetch_task: Mutex::new(None),
                signed_in: Mutex::new(CancellationToken::new()),
            }),
        }
    }

    /// Receives every phase change.
    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.inner.phase_tx.subscribe()
    }

    pub fn phase(&self) -> SessionPhase {
        self.lock_state().phase().clone()
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.lock_state().user().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock_state().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.lock_state().is_loading()
    }

    /// Resolves whatever credential is already stored. Later calls are no-ops.
    pub async fn init(&self) -> SessionPhase {
        let effects = self.apply(SessionMsg::Mounted);
        if let Err(err) = self.run(effects).await {
            client_warn!("Session init: {}", err);
        }
        self.phase()
    }

    /// A failed login leaves the session as it was.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, ClientError> {
        let epoch = self.epoch();
        self.inner
            .gateway
            .sign_in_with_password(email, password)
            .await?;
        self.finish_sign_in(epoch).await
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, ClientError> {
        let epoch = self.epoch();
        self.inner
            .gateway
            .register(username, email, password)
            .await?;
        self.finish_sign_in(epoch).await
    }

    /// Returns the URL to send the user to. The session changes only once
    /// [`complete_external_sign_in`](Self::complete_external_sign_in) reads the redirect.
    pub async fn sign_in_with_external_provider(&self) -> Result<Url, ClientError> {
        self.inner.gateway.sign_in_with_external_provider().await
    }

    pub async fn complete_external_sign_in(
        &self,
        callback: &Url,
    ) -> Result<UserProfile, ClientError> {
        let epoch = self.epoch();
        if !self.inner.gateway.complete_external_sign_in(callback).await? {
            return Err(ClientError::new(
                ErrorKind::AuthenticationFailed,
                "No session established. Please try again.",
            ));
        }
        self.finish_sign_in(epoch).await
    }

    /// Ends the session. Local state is cleared even if the provider cannot be reached.
    ///
    /// Sign-ins and profile confirmations still in flight are discarded when they land.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let effects = self.apply(SessionMsg::LogoutRequested);
        self.run(effects).await
    }

    /// Resolves the user from storage and the provider, bypassing the in-memory state.
    pub async fn get_current_user(&self) -> Option<UserProfile> {
        self.inner.gateway.current_user().await
    }

    /// Hands over the most recent detached prefetch, if one was started.
    pub fn take_prefetch(&self) -> Option<JoinHandle<PrefetchSummary>> {
        self.inner
            .prefetch_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    async fn finish_sign_in(&self, epoch: u64) -> Result<UserProfile, ClientError> {
        let lookup = self.inner.gateway.lookup_user().await;
        let Some(user) = lookup.profile().cloned() else {
            return Err(ClientError::new(
                ErrorKind::AuthenticationFailed,
                "Signed in, but the user profile could not be loaded.",
            ));
        };
        let msg = SessionMsg::SignedIn {
            user: Some(user.clone()),
            epoch,
        };
        let Some(effects) = self.apply_in_epoch(epoch, msg, lookup.uncached()) else {
            client_info!("Sign-in finished after a logout; discarding it");
            // Its credentials may have been written after the logout cleared them.
            self.inner.gateway.sign_out().await?;
            return Err(ClientError::new(
                ErrorKind::AuthenticationFailed,
                "Signed out before sign-in finished.",
            ));
        };
        self.run(effects).await?;
        Ok(user)
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn epoch(&self) -> u64 {
        self.lock_state().epoch()
    }

    fn signed_in_token(&self) -> CancellationToken {
        self.inner
            .signed_in
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn apply(&self, msg: SessionMsg) -> Vec<SessionEffect> {
        let mut guard = self.lock_state();
        self.transition(&mut guard, msg)
    }

    /// Applies `msg` unless a logout ended `epoch`, and caches `profile` if the
    /// session now holds it. Both happen under the state lock, so a logout
    /// either sees the cached profile and clears it or prevents the write.
    fn apply_in_epoch(
        &self,
        epoch: u64,
        msg: SessionMsg,
        profile: Option<&UserProfile>,
    ) -> Option<Vec<SessionEffect>> {
        let mut guard = self.lock_state();
        if guard.epoch() != epoch {
            return None;
        }
        let effects = self.transition(&mut guard, msg);
        if let Some(profile) = profile.filter(|profile| guard.user() == Some(*profile)) {
            if let Err(err) = self.inner.gateway.tokens().save_profile(profile) {
                client_warn!("Could not cache profile: {}", err);
            }
        }
        Some(effects)
    }

    fn transition(&self, state: &mut SessionState, msg: SessionMsg) -> Vec<SessionEffect> {
        let (mut next, effects) = update_session(std::mem::take(state), msg);
        if next.consume_dirty() {
            client_debug!("Session phase -> {:?}", next.phase());
            self.inner.phase_tx.send_replace(next.phase().clone());
        }
        *state = next;
        effects
    }

    async fn run(&self, effects: Vec<SessionEffect>) -> Result<(), ClientError> {
        let mut pending = VecDeque::from(effects);
        while let Some(effect) = pending.pop_front() {
            match effect {
                SessionEffect::ResolveUser => {
                    let epoch = self.epoch();
                    let lookup = self.inner.gateway.lookup_user().await;
                    let msg = SessionMsg::UserResolved(lookup.profile().cloned());
                    if let Some(more) = self.apply_in_epoch(epoch, msg, lookup.uncached()) {
                        pending.extend(more);
                    }
                }
                SessionEffect::StartPrefetch => {
                    let handle = self.inner.prefetch.spawn();
                    *self
                        .inner
                        .prefetch_task
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner) = Some(handle);
                }
                SessionEffect::ConfirmProfile { provisional, epoch } => {
                    self.spawn_confirmation(provisional, epoch);
                }
                SessionEffect::ClearLocalState => self.clear_local_state().await?,
            }
        }
        Ok(())
    }

    fn spawn_confirmation(&self, provisional: UserProfile, epoch: u64) {
        let session = self.clone();
        let signed_in = self.signed_in_token();
        tokio::spawn(async move {
            let confirmed = tokio::select! {
                _ = signed_in.cancelled() => {
                    client_debug!("Profile confirmation cancelled by logout");
                    return;
                }
                confirmed = session.inner.gateway.confirm_profile(&provisional) => confirmed,
            };
            if let Some(profile) = confirmed {
                let msg = SessionMsg::ProfileConfirmed {
                    profile: profile.clone(),
                    epoch,
                };
                session.apply_in_epoch(epoch, msg, Some(&profile));
            }
        });
    }

    async fn clear_local_state(&self) -> Result<(), ClientError> {
        let signed_in = std::mem::replace(
            &mut *self
                .inner
                .signed_in
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            CancellationToken::new(),
        );
        signed_in.cancel();
        if let Some(task) = self.take_prefetch() {
            task.abort();
        }
        let signed_out = self.inner.gateway.sign_out().await;
        let cache_cleared = self.inner.cache.clear();
        signed_out?;
        Ok(cache_cleared?)
    }
}
