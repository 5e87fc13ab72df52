use std::sync::Arc;

use client_logging::{client_debug, client_info, client_warn, redacted};
use research_core::{Credential, CredentialSource, UserProfile};
use url::Url;

use crate::backend::{Backend, BearerSource, RegisterRequest};
use crate::clock::{rfc3339, Clock};
use crate::error::{ClientError, ErrorKind};
use crate::identity::{IdentityProvider, ProviderSession};
use crate::token_store::TokenStore;

/// Picks the bearer for backend calls: provider session first, then the stored credential.
pub struct SessionBearer {
    provider: Arc<dyn IdentityProvider>,
    tokens: TokenStore,
}

impl SessionBearer {
    pub fn new(provider: Arc<dyn IdentityProvider>, tokens: TokenStore) -> Self {
        Self { provider, tokens }
    }
}

#[async_trait::async_trait]
impl BearerSource for SessionBearer {
    async fn bearer_token(&self) -> Option<String> {
        match self.provider.get_session().await {
            Ok(Some(session)) => return Some(session.access_token),
            Ok(None) => {}
            Err(err) => client_warn!("Provider session unavailable: {}", err),
        }
        match self.tokens.read() {
            Ok(credential) => credential.map(|credential| credential.access_token),
            Err(err) => {
                client_warn!("Stored credential unreadable: {}", err);
                None
            }
        }
    }
}

/// A resolved user and whether the token store already holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UserLookup {
    Cached(UserProfile),
    /// Built from the provider session or fetched from the backend; not cached yet.
    Resolved(UserProfile),
    Nobody,
}

impl UserLookup {
    pub(crate) fn profile(&self) -> Option<&UserProfile> {
        match self {
            UserLookup::Cached(profile) | UserLookup::Resolved(profile) => Some(profile),
            UserLookup::Nobody => None,
        }
    }

    pub(crate) fn uncached(&self) -> Option<&UserProfile> {
        match self {
            UserLookup::Resolved(profile) => Some(profile),
            _ => None,
        }
    }
}

/// Mirrors provider and backend credentials into the token store and resolves the user.
pub struct IdentityGateway {
    provider: Arc<dyn IdentityProvider>,
    backend: Arc<dyn Backend>,
    tokens: TokenStore,
    clock: Clock,
}

impl IdentityGateway {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        backend: Arc<dyn Backend>,
        tokens: TokenStore,
        clock: Clock,
    ) -> Self {
        Self {
            provider,
            backend,
            tokens,
            clock,
        }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// The provider's current session. Provider errors are logged and read as "no session".
    pub async fn get_session(&self) -> Option<ProviderSession> {
        match self.provider.get_session().await {
            Ok(session) => session,
            Err(err) => {
                client_warn!("Identity provider session lookup failed: {}", err);
                None
            }
        }
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(), ClientError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ClientError::validation("email", "Email is required."));
        }
        if password.is_empty() {
            return Err(ClientError::validation("password", "Password is required."));
        }

        let grant = self
            .backend
            .password_grant(email, password)
            .await
            .map_err(|err| {
                let message = if err.is_transient() {
                    "Unable to reach the server. Please try again.".to_string()
                } else {
                    err.message
                };
                ClientError::new(ErrorKind::AuthenticationFailed, message)
            })?;

        client_debug!("Password grant issued {}", redacted(&grant.access_token));
        self.tokens.save(&Credential::new(
            grant.access_token,
            CredentialSource::PasswordLogin,
        ))?;
        self.tokens.forget_profile()?;
        client_info!("Signed in with password");
        Ok(())
    }

    /// Creates the account, then signs in with the same email and password.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(), ClientError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ClientError::validation("username", "Username is required."));
        }
        let request = RegisterRequest {
            username: username.to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let created = self.backend.register(&request).await?;
        client_info!("Registered account for {}", created.username);
        self.sign_in_with_password(&request.email, password).await
    }

    pub async fn sign_in_with_external_provider(&self) -> Result<Url, ClientError> {
        self.provider.authorize_url().await.map_err(|err| match err.kind {
            ErrorKind::ProviderUnavailable => err,
            _ => ClientError::new(ErrorKind::ProviderUnavailable, err.message),
        })
    }

    /// Returns whether the redirect carried a session.
    pub async fn complete_external_sign_in(&self, callback: &Url) -> Result<bool, ClientError> {
        let Some(session) = self.provider.complete_redirect(callback).await? else {
            return Ok(false);
        };
        self.tokens.save(&Credential::new(
            session.access_token,
            CredentialSource::OAuthProvider,
        ))?;
        self.tokens.forget_profile()?;
        client_info!("External sign-in completed");
        Ok(true)
    }

    /// Clears local credentials, then asks the provider to end its session.
    pub async fn sign_out(&self) -> Result<(), ClientError> {
        let cleared = self.tokens.clear();
        if let Err(err) = self.provider.sign_out().await {
            client_warn!("Provider sign-out failed: {}", err);
        }
        Ok(cleared?)
    }

    /// Resolves the signed-in user, or `None` when nobody is signed in.
    /// A freshly resolved profile is cached in the token store.
    pub async fn current_user(&self) -> Option<UserProfile> {
        let lookup = self.lookup_user().await;
        if let Some(profile) = lookup.uncached() {
            if let Err(err) = self.tokens.save_profile(profile) {
                client_warn!("Could not cache profile: {}", err);
            }
        }
        lookup.profile().cloned()
    }

    /// Same resolution as [`current_user`](Self::current_user), without writing to the token store.
    pub(crate) async fn lookup_user(&self) -> UserLookup {
        match self.resolve_user().await {
            Ok(lookup) => lookup,
            Err(err) if err.kind == ErrorKind::AuthenticationFailed => {
                client_info!("Stored credential rejected: {}", err);
                UserLookup::Nobody
            }
            Err(err) => {
                client_warn!("User resolution failed, using cached profile: {}", err);
                match self.tokens.any_profile() {
                    Ok(Some(profile)) => UserLookup::Cached(profile),
                    Ok(None) => UserLookup::Nobody,
                    Err(err) => {
                        client_warn!("Cached profile unreadable: {}", err);
                        UserLookup::Nobody
                    }
                }
            }
        }
    }

    async fn resolve_user(&self) -> Result<UserLookup, ClientError> {
        if let Some(profile) = self.tokens.fresh_profile()? {
            client_debug!("Using cached profile");
            return Ok(UserLookup::Cached(profile));
        }

        if let Some(session) = self.get_session().await {
            let created_at = rfc3339((self.clock)());
            let provisional = UserProfile::provisional(session.email.as_deref(), created_at);
            return Ok(UserLookup::Resolved(provisional));
        }

        if self.tokens.read()?.is_some() {
            let profile = self.backend.current_user().await?;
            return Ok(UserLookup::Resolved(profile));
        }

        Ok(UserLookup::Nobody)
    }

    /// Asks the backend for the authoritative version of a provisional profile.
    /// Nothing is cached here; the session decides whether the answer still applies.
    pub async fn confirm_profile(&self, provisional: &UserProfile) -> Option<UserProfile> {
        let confirmed = match self.backend.current_user().await {
            Ok(profile) => profile,
            Err(err) => {
                client_debug!("Profile confirmation skipped: {}", err);
                return None;
            }
        };
        if !provisional.same_identity(&confirmed) {
            client_warn!(
                "Backend profile {} does not match session identity {}",
                confirmed.identity_key(),
                provisional.identity_key()
            );
            return None;
        }
        Some(confirmed)
    }
}
