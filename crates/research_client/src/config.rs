//! Client configuration, read from environment variables.
//!
//! A `.env` file in the working directory is honoured outside of tests.

use std::path::PathBuf;
use std::time::Duration;

use log::LevelFilter;
use url::Url;

use crate::backend::BackendSettings;
use crate::identity::IdentitySettings;
use crate::poller::PollSettings;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Candidate backend base URLs, in the order they are tried.
    pub api_urls: Vec<Url>,
    pub api_key: Option<String>,
    /// `None` disables external sign-in.
    pub identity: Option<IdentitySettings>,
    pub storage_dir: PathBuf,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub log_level: LevelFilter,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let raw_urls = var("RESEARCH_API_URLS")
            .ok_or_else(|| ConfigError::MissingVar("RESEARCH_API_URLS".to_string()))?;
        let api_urls = raw_urls
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| parse_url("RESEARCH_API_URLS", part))
            .collect::<Result<Vec<_>, _>>()?;
        if api_urls.is_empty() {
            return Err(ConfigError::MissingVar("RESEARCH_API_URLS".to_string()));
        }

        let request_timeout = Duration::from_secs(parse_secs(&var, "REQUEST_TIMEOUT_SECS", 30)?);
        let connect_timeout = Duration::from_secs(parse_secs(&var, "CONNECT_TIMEOUT_SECS", 10)?);
        let poll_interval = Duration::from_secs(parse_secs(&var, "POLL_INTERVAL_SECS", 5)?);

        let identity = match var("IDENTITY_URL") {
            None => None,
            Some(raw) => {
                let base_url = parse_url("IDENTITY_URL", raw.trim())?;
                let anon_key = var("IDENTITY_ANON_KEY")
                    .ok_or_else(|| ConfigError::MissingVar("IDENTITY_ANON_KEY".to_string()))?;
                let redirect = var("IDENTITY_REDIRECT_URL")
                    .unwrap_or_else(|| "http://localhost:3000/auth/callback".to_string());
                let redirect_to = parse_url("IDENTITY_REDIRECT_URL", redirect.trim())?;
                let mut settings = IdentitySettings::new(base_url, anon_key, redirect_to);
                if let Some(provider) = var("IDENTITY_OAUTH_PROVIDER") {
                    settings.oauth_provider = provider.trim().to_string();
                }
                settings.request_timeout = request_timeout;
                Some(settings)
            }
        };

        // The backend accepts the provider's public key when no dedicated key is set.
        let api_key = var("RESEARCH_API_KEY").or_else(|| {
            identity
                .as_ref()
                .map(|settings| settings.anon_key.clone())
        });

        let storage_dir = var("RESEARCH_STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./.research_client"));

        let level = var("RESEARCH_LOG").unwrap_or_else(|| "info".to_string());
        let log_level = level.trim().parse::<LevelFilter>().map_err(|_| {
            ConfigError::InvalidValue(
                "RESEARCH_LOG".to_string(),
                format!("'{level}' is not a valid log level"),
            )
        })?;

        Ok(Self {
            api_urls,
            api_key,
            identity,
            storage_dir,
            poll_interval,
            request_timeout,
            connect_timeout,
            log_level,
        })
    }

    /// Defaults around the given backend URLs, with no identity provider.
    pub fn for_backend(api_urls: Vec<Url>) -> Self {
        Self {
            api_urls,
            api_key: None,
            identity: None,
            storage_dir: PathBuf::from("./.research_client"),
            poll_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            log_level: LevelFilter::Info,
        }
    }

    pub fn backend_settings(&self) -> BackendSettings {
        BackendSettings {
            connect_timeout: self.connect_timeout,
            request_timeout: self.request_timeout,
            api_key: self.api_key.clone(),
        }
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: self.poll_interval,
        }
    }
}

fn parse_url(name: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw)
        .map_err(|err| ConfigError::InvalidValue(name.to_string(), format!("{raw}: {err}")))
}

fn parse_secs<F>(var: &F, name: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
            ConfigError::InvalidValue(
                name.to_string(),
                format!("'{raw}' is not a number of seconds"),
            )
        }),
    }
}
