mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use research_client::research_core::{JobStatus, ResearchRequest};
use research_client::{
    Backend, BackendSettings, BearerSource, EndpointSet, ErrorKind, HttpBackend, PdfDocument,
};
use url::Url;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct FixedBearer(Option<&'static str>);

#[async_trait::async_trait]
impl BearerSource for FixedBearer {
    async fn bearer_token(&self) -> Option<String> {
        self.0.map(ToOwned::to_owned)
    }
}

fn backend(urls: Vec<String>, bearer: Option<&'static str>, api_key: Option<&str>) -> HttpBackend {
    client_logging::initialize_for_tests();
    let endpoints =
        EndpointSet::new(urls.iter().map(|url| Url::parse(url).unwrap()).collect()).unwrap();
    let settings = BackendSettings {
        api_key: api_key.map(ToOwned::to_owned),
        ..BackendSettings::default()
    };
    HttpBackend::new(endpoints, settings, Arc::new(FixedBearer(bearer))).unwrap()
}

#[tokio::test]
async fn password_grant_is_form_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("username=ada%40example.com&password=p%26ss+word"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"access_token": "tok", "token_type": "bearer"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let grant = backend(vec![server.uri()], None, None)
        .password_grant("ada@example.com", "p&ss word")
        .await
        .unwrap();
    assert_eq!(grant.access_token, "tok");
}

#[tokio::test]
async fn authenticated_calls_carry_bearer_and_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/research/r1/status"))
        .and(header("authorization", "Bearer tok-9"))
        .and(header("apikey", "anon-key"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "processing"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let status = backend(vec![server.uri()], Some("tok-9"), Some("anon-key"))
        .research_status("r1")
        .await
        .unwrap();
    assert_eq!(status, JobStatus::InProgress);
}

#[tokio::test]
async fn backend_detail_becomes_the_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(serde_json::json!({"detail": "Incorrect email or password"})),
        )
        .mount(&server)
        .await;

    let err = backend(vec![server.uri()], None, None)
        .password_grant("ada@example.com", "wrong")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::AuthenticationFailed);
    assert_eq!(err.message, "Incorrect email or password");
}

#[tokio::test]
async fn validation_errors_list_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/research"))
        .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
            "detail": [{"loc": ["body", "topic"], "msg": "field required", "type": "value_error.missing"}]
        })))
        .mount(&server)
        .await;

    let err = backend(vec![server.uri()], Some("tok"), None)
        .start_research(&ResearchRequest {
            topic: "x".into(),
            additional_context: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.message, "field required");
    match err.kind {
        ErrorKind::Validation { fields } => {
            assert_eq!(fields.len(), 1);
            assert_eq!(fields[0].field, "topic");
        }
        other => panic!("unexpected kind {other:?}"),
    }
}

#[tokio::test]
async fn missing_report_uses_generic_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/research/nope"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = backend(vec![server.uri()], Some("tok"), None)
        .research_report("nope")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ResourceNotFound);
    assert_eq!(err.message, "Failed to load research. Please try again.");
}

#[tokio::test]
async fn unreachable_candidate_falls_through_to_next() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/research/history"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(common::history_json(&["a", "b"])),
        )
        .expect(2)
        .mount(&server)
        .await;

    let backend = backend(
        vec!["http://127.0.0.1:9".to_string(), server.uri()],
        Some("tok"),
        None,
    );
    let history = backend.research_history().await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(
        backend.endpoints().preferred().as_str(),
        Url::parse(&server.uri()).unwrap().as_str()
    );

    // The answering candidate is tried first from now on.
    backend.research_history().await.unwrap();
}

#[tokio::test]
async fn exhausted_candidates_report_every_attempt() {
    let backend = backend(
        vec![
            "http://127.0.0.1:9".to_string(),
            "http://127.0.0.1:10".to_string(),
        ],
        None,
        None,
    );
    let err = backend.research_history().await.unwrap_err();
    assert!(err.is_transient());
    match err.kind {
        ErrorKind::EndpointsExhausted { attempts } => {
            let bases: Vec<_> = attempts.iter().map(|a| a.base.as_str()).collect();
            assert_eq!(bases, vec!["http://127.0.0.1:9/", "http://127.0.0.1:10/"]);
        }
        other => panic!("unexpected kind {other:?}"),
    }
}

#[tokio::test]
async fn http_errors_do_not_advance_candidates() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/research/history"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&first)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&second)
        .await;

    let err = backend(vec![first.uri(), second.uri()], None, None)
        .research_history()
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::TransientFetch);
}

#[tokio::test]
async fn pdf_download_returns_raw_bytes() {
    let server = MockServer::start().await;
    let pdf = b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n1 0 obj\n".to_vec();
    Mock::given(method("GET"))
        .and(path("/research/r1/pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(pdf.clone(), "application/pdf"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/research/r2/pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "r2"})))
        .mount(&server)
        .await;

    let backend = backend(vec![server.uri()], Some("tok"), None);
    let document = backend.research_pdf("r1").await.unwrap();
    assert_eq!(document.bytes.as_ref(), pdf.as_slice());
    assert_eq!(document.content_type.as_deref(), Some("application/pdf"));
    assert_eq!(PdfDocument::suggested_filename("r1"), "Research_Report_r1.pdf");

    let err = backend.research_pdf("r2").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Decode);
}
