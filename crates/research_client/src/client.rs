use std::sync::Arc;

use client_logging::client_info;

use crate::backend::{Backend, HttpBackend};
use crate::clock::{system_clock, Clock};
use crate::config::ClientConfig;
use crate::endpoints::EndpointSet;
use crate::error::ClientError;
use crate::gateway::{IdentityGateway, SessionBearer};
use crate::identity::{DisabledProvider, HostedIdentityProvider, IdentityProvider};
use crate::poller::StatusPoller;
use crate::prefetch::PrefetchCoordinator;
use crate::research::ResearchService;
use crate::result_cache::ResultCache;
use crate::session::SessionContext;
use crate::store::{FileStore, KeyValueStore};
use crate::token_store::TokenStore;

/// Every component wired over one store and one backend.
#[derive(Clone)]
pub struct ResearchClient {
    pub session: SessionContext,
    pub research: ResearchService,
    pub poller: StatusPoller,
    pub prefetch: PrefetchCoordinator,
}

impl ResearchClient {
    /// Uses a file store under `config.storage_dir` and the system clock.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let store = FileStore::open(&config.storage_dir)?;
        client_info!("Client storage at {}", store.dir().display());
        Self::with_store(config, Arc::new(store), system_clock())
    }

    pub fn with_store(
        config: &ClientConfig,
        store: Arc<dyn KeyValueStore>,
        clock: Clock,
    ) -> Result<Self, ClientError> {
        let tokens = TokenStore::new(store.clone(), clock.clone());
        let cache = ResultCache::new(store.clone(), clock.clone());

        let provider: Arc<dyn IdentityProvider> = match &config.identity {
            Some(settings) => Arc::new(HostedIdentityProvider::new(
                settings.clone(),
                store,
                clock.clone(),
            )?),
            None => Arc::new(DisabledProvider),
        };

        let endpoints = EndpointSet::new(config.api_urls.clone())?;
        let bearer = Arc::new(SessionBearer::new(provider.clone(), tokens.clone()));
        let backend: Arc<dyn Backend> =
            Arc::new(HttpBackend::new(endpoints, config.backend_settings(), bearer)?);

        let gateway = IdentityGateway::new(provider, backend.clone(), tokens, clock);
        let research = ResearchService::new(backend.clone(), cache.clone());
        let prefetch = PrefetchCoordinator::new(backend, cache.clone());
        let session = SessionContext::new(gateway, cache, prefetch.clone());
        let poller = StatusPoller::new(research.clone(), config.poll_settings());

        Ok(Self {
            session,
            research,
            poller,
            prefetch,
        })
    }
}
