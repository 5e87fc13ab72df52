mod common;

use common::{client_for, history_json, report_json};
use pretty_assertions::assert_eq;
use research_client::PrefetchSummary;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn failed_reports_are_left_out_of_the_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/research/history"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(history_json(&["r1", "r2", "r3", "r4"])),
        )
        .expect(1)
        .mount(&server)
        .await;
    for id in ["r1", "r3"] {
        Mock::given(method("GET"))
            .and(path(format!("/research/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(report_json(id, "Topic")))
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/research/r2"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/research/r4"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _store, _clock) = client_for(&server);
    let summary = client.prefetch.prefetch_all().await;

    assert_eq!(summary.history_len, 4);
    assert_eq!(summary.cached, 2);
    let mut failed = summary.failed.clone();
    failed.sort();
    assert_eq!(failed, vec!["r2".to_string(), "r4".to_string()]);

    // Served from cache from here on: each mock above expects a single hit.
    let history = client.research.history().await.unwrap();
    assert_eq!(history.len(), 4);
    let report = client.research.report("r3").await.unwrap();
    assert_eq!(report.id, "r3");
}

#[tokio::test]
async fn missing_history_yields_an_empty_summary() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/research/history"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let (client, store, _clock) = client_for(&server);
    let summary = client.prefetch.spawn().await.unwrap();
    assert_eq!(summary, PrefetchSummary::default());
    assert!(store.keys().is_empty());
}

#[tokio::test]
async fn repeated_prefetch_overwrites_the_report_partition() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/research/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_json(&["r1"])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/research/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_json(&["r2"])))
        .mount(&server)
        .await;
    for id in ["r1", "r2"] {
        Mock::given(method("GET"))
            .and(path(format!("/research/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(report_json(id, "Topic")))
            .mount(&server)
            .await;
    }

    let (client, _store, _clock) = client_for(&server);
    client.prefetch.prefetch_all().await;
    let second = client.prefetch.prefetch_all().await;

    assert_eq!(second.cached, 1);
    let history = client.research.history().await.unwrap();
    assert_eq!(history.ids().collect::<Vec<_>>(), vec!["r2"]);
}
