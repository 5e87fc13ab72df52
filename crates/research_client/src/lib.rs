//! Session and result synchronization for the research report service.
//!
//! Persistent state lives behind a [`KeyValueStore`]. The [`SessionContext`]
//! drives sign-in and sign-out, the [`PrefetchCoordinator`] warms the
//! [`ResultCache`], and the [`StatusPoller`] watches submitted jobs.
mod backend;
mod client;
mod clock;
mod config;
mod endpoints;
mod error;
mod gateway;
mod identity;
mod poller;
mod prefetch;
mod research;
mod result_cache;
mod session;
mod store;
mod token_store;

pub use backend::{
    Backend, BackendSettings, BearerSource, HttpBackend, PdfDocument, RegisterRequest, TokenGrant,
};
pub use client::ResearchClient;
pub use clock::{system_clock, Clock};
pub use config::{ClientConfig, ConfigError};
pub use endpoints::{endpoint_url, EndpointSet};
pub use error::{ClientError, EndpointFailure, ErrorKind, FieldError};
pub use gateway::{IdentityGateway, SessionBearer};
pub use identity::{
    DisabledProvider, HostedIdentityProvider, IdentityProvider, IdentitySettings, ProviderSession,
};
pub use poller::{PollEvent, PollOutcome, PollSettings, PollSink, StatusPoller};
pub use prefetch::{PrefetchCoordinator, PrefetchSummary};
pub use research::ResearchService;
pub use result_cache::ResultCache;
pub use session::SessionContext;
pub use store::{
    ensure_store_dir, AtomicFileWriter, FileStore, KeyValueStore, MemoryStore, StoreError,
};
pub use token_store::TokenStore;

pub use research_core;
pub use tokio_util::sync::CancellationToken;
