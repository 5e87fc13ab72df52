use std::sync::Arc;

use client_logging::{client_info, client_warn};
use futures_util::future::join_all;
use research_core::ResearchId;
use tokio::task::JoinHandle;

use crate::backend::Backend;
use crate::error::ClientError;
use crate::result_cache::ResultCache;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefetchSummary {
    pub history_len: usize,
    pub cached: usize,
    pub failed: Vec<ResearchId>,
}

/// Warms the result cache after sign-in.
#[derive(Clone)]
pub struct PrefetchCoordinator {
    backend: Arc<dyn Backend>,
    cache: ResultCache,
}

impl PrefetchCoordinator {
    pub fn new(backend: Arc<dyn Backend>, cache: ResultCache) -> Self {
        Self { backend, cache }
    }

    /// Fetches history, then every listed report concurrently. Never fails:
    /// a missing history or a failed report is logged and left out.
    pub async fn prefetch_all(&self) -> PrefetchSummary {
        let history = match self.backend.research_history().await {
            Ok(history) => history,
            Err(err) => {
                client_warn!("Prefetch: history unavailable: {}", err);
                return PrefetchSummary::default();
            }
        };
        if let Err(err) = self.cache.put_history(&history) {
            client_warn!("Prefetch: could not cache history: {}", err);
        }

        let fetches = history.ids().map(|id| {
            let id = id.to_string();
            async move {
                let result = self.backend.research_report(&id).await;
                (id, result)
            }
        });
        let results: Vec<(ResearchId, Result<_, ClientError>)> = join_all(fetches).await;

        let mut reports = Vec::new();
        let mut failed = Vec::new();
        for (id, result) in results {
            match result {
                Ok(report) => reports.push(report),
                Err(err) => {
                    client_warn!("Prefetch: report {} skipped: {}", id, err);
                    failed.push(id);
                }
            }
        }

        let cached = match self.cache.replace_reports(reports) {
            Ok(count) => count,
            Err(err) => {
                client_warn!("Prefetch: could not cache reports: {}", err);
                0
            }
        };
        client_info!(
            "Prefetch cached {} of {} reports",
            cached,
            history.len()
        );
        PrefetchSummary {
            history_len: history.len(),
            cached,
            failed,
        }
    }

    /// Runs `prefetch_all` detached from the caller.
    pub fn spawn(&self) -> JoinHandle<PrefetchSummary> {
        let coordinator = self.clone();
        tokio::spawn(async move { coordinator.prefetch_all().await })
    }
}
