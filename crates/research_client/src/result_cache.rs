use std::collections::BTreeMap;
use std::sync::Arc;

use client_logging::client_debug;
use research_core::{CacheEntry, ResearchHistory, ResearchId, ResearchReport, RESULT_TTL_MS};

use crate::clock::Clock;
use crate::store::{load_json, save_json, KeyValueStore, StoreError};

const HISTORY_KEY: &str = "cached_history";
const REPORTS_KEY: &str = "cached_reports";

type ReportPartition = BTreeMap<ResearchId, CacheEntry<ResearchReport>>;

/// Time-boxed local copy of the history list and report bodies.
///
/// Expired entries are evicted on read and are indistinguishable from entries
/// that were never cached.
#[derive(Clone)]
pub struct ResultCache {
    store: Arc<dyn KeyValueStore>,
    clock: Clock,
    ttl_ms: i64,
}

impl ResultCache {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Clock) -> Self {
        Self::with_ttl(store, clock, RESULT_TTL_MS)
    }

    pub fn with_ttl(store: Arc<dyn KeyValueStore>, clock: Clock, ttl_ms: i64) -> Self {
        Self {
            store,
            clock,
            ttl_ms,
        }
    }

    pub fn get_history(&self) -> Result<Option<ResearchHistory>, StoreError> {
        let Some(entry) =
            load_json::<CacheEntry<ResearchHistory>>(self.store.as_ref(), HISTORY_KEY)?
        else {
            return Ok(None);
        };
        let now = (self.clock)();
        if entry.is_fresh(now, self.ttl_ms) {
            return Ok(Some(entry.payload));
        }
        client_debug!("Evicting expired history cache");
        self.store.remove(HISTORY_KEY)?;
        Ok(None)
    }

    pub fn put_history(&self, history: &ResearchHistory) -> Result<(), StoreError> {
        let entry = CacheEntry::new(history, (self.clock)());
        save_json(self.store.as_ref(), HISTORY_KEY, &entry)
    }

    pub fn get_report(&self, id: &str) -> Result<Option<ResearchReport>, StoreError> {
        let mut partition = self.load_reports()?;
        let now = (self.clock)();
        let fresh = match partition.get(id) {
            None => return Ok(None),
            Some(entry) => entry.is_fresh(now, self.ttl_ms),
        };
        if fresh {
            return Ok(partition.remove(id).map(|entry| entry.payload));
        }
        client_debug!("Evicting expired report {} from cache", id);
        partition.remove(id);
        self.save_reports(&partition)?;
        Ok(None)
    }

    pub fn put_report(&self, report: &ResearchReport) -> Result<(), StoreError> {
        let mut partition = self.load_reports()?;
        let now = (self.clock)();
        partition.retain(|_, entry| entry.is_fresh(now, self.ttl_ms));
        partition.insert(report.id.clone(), CacheEntry::new(report.clone(), now));
        self.save_reports(&partition)
    }

    /// Replaces the whole report partition with `reports` in one write.
    pub fn replace_reports(&self, reports: Vec<ResearchReport>) -> Result<usize, StoreError> {
        let now = (self.clock)();
        let partition: ReportPartition = reports
            .into_iter()
            .map(|report| (report.id.clone(), CacheEntry::new(report, now)))
            .collect();
        self.save_reports(&partition)?;
        Ok(partition.len())
    }

    /// Ids of reports that would currently be served from cache.
    pub fn cached_report_ids(&self) -> Result<Vec<ResearchId>, StoreError> {
        let now = (self.clock)();
        Ok(self
            .load_reports()?
            .into_iter()
            .filter(|(_, entry)| entry.is_fresh(now, self.ttl_ms))
            .map(|(id, _)| id)
            .collect())
    }

    /// Wipes both partitions.
    pub fn clear(&self) -> Result<(), StoreError> {
        let reports = self.store.remove(REPORTS_KEY);
        let history = self.store.remove(HISTORY_KEY);
        reports.and(history)
    }

    fn load_reports(&self) -> Result<ReportPartition, StoreError> {
        Ok(load_json(self.store.as_ref(), REPORTS_KEY)?.unwrap_or_default())
    }

    fn save_reports(&self, partition: &ReportPartition) -> Result<(), StoreError> {
        if partition.is_empty() {
            self.store.remove(REPORTS_KEY)
        } else {
            save_json(self.store.as_ref(), REPORTS_KEY, partition)
        }
    }
}
