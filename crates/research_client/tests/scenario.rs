mod common;

use common::{client_for, report_json, TestSink};
use pretty_assertions::assert_eq;
use research_client::research_core::JobStatus;
use research_client::{CancellationToken, ErrorKind, PollOutcome};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn quantum_computing_report_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/research"))
        .and(body_json(json!({"topic": "Quantum Computing"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "research_id": "qc-1",
            "status": "pending",
            "estimated_time": 60
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/research/qc-1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "in_progress"})))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/research/qc-1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "completed"})))
        .mount(&server)
        .await;
    let report_body = report_json("qc-1", "Quantum Computing");
    Mock::given(method("GET"))
        .and(path("/research/qc-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(report_body.clone()))
        .expect(1)
        .mount(&server)
        .await;
    let pdf = b"%PDF-1.7\nquantum".to_vec();
    Mock::given(method("GET"))
        .and(path("/research/qc-1/pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(pdf.clone(), "application/pdf"))
        .mount(&server)
        .await;

    let (client, _store, _clock) = client_for(&server);

    let job = client.research.submit("  Quantum Computing ", None).await.unwrap();
    assert_eq!(job.id, "qc-1");
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.topic, "Quantum Computing");

    let outcome = client
        .poller
        .watch(&job.id, &CancellationToken::new(), &TestSink::default())
        .await
        .unwrap();
    let PollOutcome::Completed(report) = outcome else {
        panic!("expected a report, got {outcome:?}");
    };
    assert_eq!(report.topic, "Quantum Computing");
    assert_eq!(report.sections.len(), 2);
    assert_eq!(report.sources[1].snippet, None);

    // Second read comes from the cache.
    let again = client.research.report("qc-1").await.unwrap();
    assert_eq!(again, report);

    let document = client.research.download_pdf("qc-1").await.unwrap();
    assert!(document.bytes.starts_with(b"%PDF"));
    assert_ne!(
        document.bytes.as_ref(),
        serde_json::to_vec(&report_body).unwrap().as_slice()
    );
}

#[tokio::test]
async fn blank_topic_is_rejected_locally() {
    let server = MockServer::start().await;
    let (client, _store, _clock) = client_for(&server);

    let err = client.research.submit(" \t ", Some("context")).await.unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Validation { ref fields } if fields[0].field == "topic"));
    assert!(server.received_requests().await.unwrap().is_empty());
}
