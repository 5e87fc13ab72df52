use std::sync::Arc;

use client_logging::{client_debug, client_warn};
use research_core::{JobStatus, ResearchHistory, ResearchJob, ResearchReport, ResearchRequest};

use crate::backend::{Backend, PdfDocument};
use crate::error::ClientError;
use crate::result_cache::ResultCache;

/// Research operations, reading through the result cache where it applies.
#[derive(Clone)]
pub struct ResearchService {
    backend: Arc<dyn Backend>,
    cache: ResultCache,
}

impl ResearchService {
    pub fn new(backend: Arc<dyn Backend>, cache: ResultCache) -> Self {
        Self { backend, cache }
    }

    pub async fn submit(
        &self,
        topic: &str,
        additional_context: Option<&str>,
    ) -> Result<ResearchJob, ClientError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ClientError::validation("topic", "Please enter a research topic."));
        }
        let request = ResearchRequest {
            topic: topic.to_string(),
            additional_context: additional_context
                .map(str::trim)
                .filter(|context| !context.is_empty())
                .map(ToOwned::to_owned),
        };
        let submitted = self.backend.start_research(&request).await?;
        client_debug!(
            "Research {} accepted, estimated {:?}s",
            submitted.research_id,
            submitted.estimated_time
        );
        Ok(ResearchJob {
            id: submitted.research_id,
            status: submitted.status,
            topic: request.topic,
        })
    }

    pub async fn status(&self, research_id: &str) -> Result<JobStatus, ClientError> {
        self.backend.research_status(research_id).await
    }

    pub async fn report(&self, research_id: &str) -> Result<ResearchReport, ClientError> {
        match self.cache.get_report(research_id) {
            Ok(Some(report)) => {
                client_debug!("Report {} served from cache", research_id);
                return Ok(report);
            }
            Ok(None) => {}
            Err(err) => client_warn!("Report cache unreadable: {}", err),
        }

        let report = self.backend.research_report(research_id).await?;
        if let Err(err) = self.cache.put_report(&report) {
            client_warn!("Could not cache report {}: {}", research_id, err);
        }
        Ok(report)
    }

    pub async fn history(&self) -> Result<ResearchHistory, ClientError> {
        match self.cache.get_history() {
            Ok(Some(history)) => {
                client_debug!("History served from cache");
                return Ok(history);
            }
            Ok(None) => {}
            Err(err) => client_warn!("History cache unreadable: {}", err),
        }

        let history = self.backend.research_history().await?;
        if let Err(err) = self.cache.put_history(&history) {
            client_warn!("Could not cache history: {}", err);
        }
        Ok(history)
    }

    pub async fn download_pdf(&self, research_id: &str) -> Result<PdfDocument, ClientError> {
        self.backend.research_pdf(research_id).await
    }
}
