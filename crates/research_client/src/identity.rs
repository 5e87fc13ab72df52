use std::sync::Arc;
use std::time::Duration;

use client_logging::{client_debug, client_trace, client_warn};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::clock::Clock;
use crate::endpoints::endpoint_url;
use crate::error::{map_reqwest_error, ClientError, ErrorKind};
use crate::store::{load_json, save_json, KeyValueStore};

const SESSION_KEY: &str = "identity_session";
/// Sessions this close to expiry are refreshed before use.
const EXPIRY_MARGIN_MS: i64 = 10_000;

/// The identity provider's own session, mirrored locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Epoch seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
}

impl ProviderSession {
    pub fn is_expired(&self, now_epoch_ms: i64) -> bool {
        self.expires_at
            .is_some_and(|at| at.saturating_mul(1000) - EXPIRY_MARGIN_MS <= now_epoch_ms)
    }
}

/// Opaque capability over a hosted identity provider.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The current session, refreshed if needed. "No session" is `Ok(None)`.
    async fn get_session(&self) -> Result<Option<ProviderSession>, ClientError>;

    /// Where to send the user to start the external sign-in handshake.
    async fn authorize_url(&self) -> Result<Url, ClientError>;

    /// Reads the redirect-back URL and establishes a session from it.
    async fn complete_redirect(
        &self,
        callback: &Url,
    ) -> Result<Option<ProviderSession>, ClientError>;

    async fn sign_out(&self) -> Result<(), ClientError>;
}

/// Used when no identity provider is configured.
pub struct DisabledProvider;

#[async_trait::async_trait]
impl IdentityProvider for DisabledProvider {
    async fn get_session(&self) -> Result<Option<ProviderSession>, ClientError> {
        Ok(None)
    }

    async fn authorize_url(&self) -> Result<Url, ClientError> {
        Err(ClientError::new(
            ErrorKind::ProviderUnavailable,
            "External sign-in is not configured.",
        ))
    }

    async fn complete_redirect(
        &self,
        _callback: &Url,
    ) -> Result<Option<ProviderSession>, ClientError> {
        Err(ClientError::new(
            ErrorKind::ProviderUnavailable,
            "External sign-in is not configured.",
        ))
    }

    async fn sign_out(&self) -> Result<(), ClientError> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct IdentitySettings {
    pub base_url: Url,
    pub anon_key: String,
    pub oauth_provider: String,
    pub scopes: String,
    pub redirect_to: Url,
    pub request_timeout: Duration,
}

impl IdentitySettings {
    pub fn new(base_url: Url, anon_key: impl Into<String>, redirect_to: Url) -> Self {
        Self {
            base_url,
            anon_key: anon_key.into(),
            oauth_provider: "google".to_string(),
            scopes: "email profile".to_string(),
            redirect_to,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Deserialize)]
struct ProviderUser {
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    user: Option<ProviderUser>,
}

/// Hosted (GoTrue-style) identity provider reached over `/auth/v1`.
pub struct HostedIdentityProvider {
    client: reqwest::Client,
    settings: IdentitySettings,
    store: Arc<dyn KeyValueStore>,
    clock: Clock,
}

impl HostedIdentityProvider {
    pub fn new(
        settings: IdentitySettings,
        store: Arc<dyn KeyValueStore>,
        clock: Clock,
    ) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ClientError::new(ErrorKind::Config, err.to_string()))?;
        Ok(Self {
            client,
            settings,
            store,
            clock,
        })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut full = vec!["auth", "v1"];
        full.extend_from_slice(segments);
        endpoint_url(&self.settings.base_url, &full)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.settings.anon_key)
    }

    fn stored_session(&self) -> Result<Option<ProviderSession>, ClientError> {
        Ok(load_json(self.store.as_ref(), SESSION_KEY)?)
    }

    fn store_session(&self, session: &ProviderSession) -> Result<(), ClientError> {
        Ok(save_json(self.store.as_ref(), SESSION_KEY, session)?)
    }

    fn forget_session(&self) -> Result<(), ClientError> {
        Ok(self.store.remove(SESSION_KEY)?)
    }

    async fn fetch_email(&self, access_token: &str) -> Result<Option<String>, ClientError> {
        let response = self
            .request(reqwest::Method::GET, self.url(&["user"]))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            return Err(provider_error(status, &body, "Authentication failed. Please try again."));
        }
        let user: ProviderUser = serde_json::from_slice(&body)
            .map_err(|err| ClientError::new(ErrorKind::Decode, err.to_string()))?;
        Ok(user.email)
    }

    async fn refresh(
        &self,
        session: &ProviderSession,
    ) -> Result<Option<ProviderSession>, ClientError> {
        let Some(refresh_token) = session.refresh_token.as_deref() else {
            return Ok(None);
        };
        let mut url = self.url(&["token"]);
        url.query_pairs_mut()
            .append_pair("grant_type", "refresh_token");
        let body = serde_json::json!({ "refresh_token": refresh_token });

        client_trace!("Refreshing provider session");
        let response = self
            .request(reqwest::Method::POST, url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            let err = provider_error(status, &bytes, "Session refresh failed.");
            client_warn!("Provider session refresh rejected: {}", err.message);
            return Ok(None);
        }

        let refreshed: RefreshResponse = serde_json::from_slice(&bytes)
            .map_err(|err| ClientError::new(ErrorKind::Decode, err.to_string()))?;
        let now_s = (self.clock)() / 1000;
        Ok(Some(ProviderSession {
            access_token: refreshed.access_token,
            refresh_token: refreshed.refresh_token.or_else(|| session.refresh_token.clone()),
            expires_at: refreshed
                .expires_at
                .or_else(|| refreshed.expires_in.map(|secs| now_s + secs)),
            email: refreshed
                .user
                .and_then(|user| user.email)
                .or_else(|| session.email.clone()),
        }))
    }
}

#[async_trait::async_trait]
impl IdentityProvider for HostedIdentityProvider {
    async fn get_session(&self) -> Result<Option<ProviderSession>, ClientError> {
        let Some(session) = self.stored_session()? else {
            return Ok(None);
        };
        if !session.is_expired((self.clock)()) {
            return Ok(Some(session));
        }

        client_debug!("Provider session expired; attempting refresh");
        match self.refresh(&session).await {
            Ok(Some(refreshed)) => {
                self.store_session(&refreshed)?;
                Ok(Some(refreshed))
            }
            Ok(None) => {
                self.forget_session()?;
                Ok(None)
            }
            Err(err) => {
                client_warn!("Provider session refresh failed: {}", err);
                self.forget_session()?;
                Ok(None)
            }
        }
    }

    async fn authorize_url(&self) -> Result<Url, ClientError> {
        let unavailable =
            |message: String| ClientError::new(ErrorKind::ProviderUnavailable, message);

        let response = self
            .request(reqwest::Method::GET, self.url(&["settings"]))
            .send()
            .await
            .map_err(|err| unavailable(format!("Identity provider unreachable: {err}")))?;
        if !response.status().is_success() {
            return Err(unavailable(format!(
                "Identity provider answered {}",
                response.status()
            )));
        }
        let body = response
            .bytes()
            .await
            .map_err(|err| unavailable(err.to_string()))?;
        let settings: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        let enabled = settings
            .get("external")
            .and_then(|external| external.get(&self.settings.oauth_provider))
            .and_then(Value::as_bool)
            .unwrap_or(true);
        if !enabled {
            return Err(unavailable(format!(
                "Sign-in with {} is not enabled.",
                self.settings.oauth_provider
            )));
        }

        let mut url = self.url(&["authorize"]);
        url.query_pairs_mut()
            .append_pair("provider", &self.settings.oauth_provider)
            .append_pair("redirect_to", self.settings.redirect_to.as_str())
            .append_pair("scopes", &self.settings.scopes)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");
        Ok(url)
    }

    async fn complete_redirect(
        &self,
        callback: &Url,
    ) -> Result<Option<ProviderSession>, ClientError> {
        let params = CallbackParams::parse(callback);
        if let Some(description) = params.error {
            return Err(ClientError::new(ErrorKind::AuthenticationFailed, description));
        }
        let Some(access_token) = params.access_token else {
            return Ok(None);
        };

        let email = self.fetch_email(&access_token).await?;
        let now_s = (self.clock)() / 1000;
        let session = ProviderSession {
            access_token,
            refresh_token: params.refresh_token,
            expires_at: params
                .expires_at
                .or_else(|| params.expires_in.map(|secs| now_s + secs)),
            email,
        };
        self.store_session(&session)?;
        Ok(Some(session))
    }

    async fn sign_out(&self) -> Result<(), ClientError> {
        let session = self.stored_session()?;
        // Local mirror goes first; the remote call is best effort.
        self.forget_session()?;
        let Some(session) = session else {
            return Ok(());
        };

        let response = self
            .request(reqwest::Method::POST, self.url(&["logout"]))
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            return Ok(());
        }
        let body = response.bytes().await.unwrap_or_default();
        Err(provider_error(status, &body, "Sign-out failed."))
    }
}

/// Values the provider puts on the redirect-back URL, in the fragment or the query.
#[derive(Debug, Default, PartialEq, Eq)]
struct CallbackParams {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    error: Option<String>,
}

impl CallbackParams {
    fn parse(callback: &Url) -> Self {
        let fragment = callback.fragment().unwrap_or_default();
        let pairs = callback
            .query_pairs()
            .chain(url::form_urlencoded::parse(fragment.as_bytes()));

        let mut params = Self::default();
        let mut error_code = None;
        for (key, value) in pairs {
            let value = value.into_owned();
            match &*key {
                "access_token" => params.access_token = Some(value),
                "refresh_token" => params.refresh_token = Some(value),
                "expires_in" => params.expires_in = value.parse().ok(),
                "expires_at" => params.expires_at = value.parse().ok(),
                "error_description" => params.error = Some(value),
                "error" => error_code = Some(value),
                _ => {}
            }
        }
        if params.error.is_none() {
            params.error = error_code;
        }
        params
    }
}

fn provider_error(status: StatusCode, body: &[u8], fallback: &str) -> ClientError {
    let message = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| {
            ["error_description", "msg", "message"]
                .iter()
                .find_map(|field| value.get(*field).and_then(Value::as_str).map(ToOwned::to_owned))
        })
        .unwrap_or_else(|| fallback.to_string());
    let kind = match status.as_u16() {
        400 | 401 | 403 | 422 => ErrorKind::AuthenticationFailed,
        408 | 429 | 500..=599 => ErrorKind::TransientFetch,
        other => ErrorKind::UnexpectedStatus(other),
    };
    ClientError::new(kind, message)
}
