#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use research_client::{
    ClientConfig, Clock, MemoryStore, PollEvent, PollSink, ResearchClient,
};
use serde_json::{json, Value};
use url::Url;
use wiremock::MockServer;

pub const NOW_MS: i64 = 1_700_000_000_000;

/// A clock tests can move by hand.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(AtomicI64::new(NOW_MS)),
        }
    }

    pub fn advance_ms(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn clock(&self) -> Clock {
        let now = self.now.clone();
        Arc::new(move || now.load(Ordering::SeqCst))
    }
}

pub fn config_for(server: &MockServer) -> ClientConfig {
    let mut config = ClientConfig::for_backend(vec![Url::parse(&server.uri()).unwrap()]);
    config.poll_interval = Duration::from_millis(10);
    config
}

pub fn client_for(server: &MockServer) -> (ResearchClient, Arc<MemoryStore>, ManualClock) {
    client_logging::initialize_for_tests();
    let store = Arc::new(MemoryStore::new());
    let clock = ManualClock::new();
    let client = ResearchClient::with_store(&config_for(server), store.clone(), clock.clock())
        .expect("client");
    (client, store, clock)
}

pub fn user_json(id: i64, email: &str) -> Value {
    json!({
        "id": id,
        "email": email,
        "username": email.split('@').next().unwrap(),
        "created_at": "2024-05-01T10:00:00"
    })
}

pub fn report_json(id: &str, topic: &str) -> Value {
    json!({
        "id": id,
        "topic": topic,
        "summary": format!("Summary of {topic}"),
        "sections": [
            {"title": "Background", "content": "Some background."},
            {"title": "Findings", "content": "Some findings."}
        ],
        "sources": [
            {"title": "A paper", "url": "https://example.org/paper", "snippet": "An excerpt."},
            {"title": "A site", "url": "https://example.org/site"}
        ],
        "created_at": "2024-05-01T10:00:00"
    })
}

pub fn history_json(ids: &[&str]) -> Value {
    let researches: Vec<Value> = ids
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "user_id": 1,
                "topic": format!("Topic {id}"),
                "created_at": "2024-05-01T10:00:00"
            })
        })
        .collect();
    json!({ "researches": researches })
}

#[derive(Default)]
pub struct TestSink {
    events: Mutex<Vec<PollEvent>>,
}

impl TestSink {
    pub fn take(&self) -> Vec<PollEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl PollSink for TestSink {
    fn emit(&self, event: PollEvent) {
        self.events.lock().unwrap().push(event);
    }
}
