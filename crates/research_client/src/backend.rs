use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use research_core::{
    JobStatus, ResearchHistory, ResearchReport, ResearchRequest, SubmittedResearch, UserProfile,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::endpoints::EndpointSet;
use crate::error::{map_reqwest_error, ClientError, ErrorKind};

#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Sent as an `apikey` header on every request.
    pub api_key: Option<String>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            api_key: None,
        }
    }
}

/// Supplies the bearer token for authenticated calls, if any.
#[async_trait::async_trait]
pub trait BearerSource: Send + Sync {
    async fn bearer_token(&self) -> Option<String>;
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: JobStatus,
}

/// A downloaded report PDF. Always binary, never a JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfDocument {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

impl PdfDocument {
    pub fn suggested_filename(research_id: &str) -> String {
        format!("Research_Report_{research_id}.pdf")
    }

    fn looks_like_pdf(bytes: &[u8], content_type: Option<&str>) -> bool {
        let declared = content_type
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim())
            .is_some_and(|ct| ct.eq_ignore_ascii_case("application/pdf"));
        declared || bytes.starts_with(b"%PDF")
    }
}

/// The backend REST surface this client consumes.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    async fn register(&self, request: &RegisterRequest) -> Result<UserProfile, ClientError>;
    async fn password_grant(
        &self,
        username: &str,
        password: &str,
    ) -> Result<TokenGrant, ClientError>;
    async fn current_user(&self) -> Result<UserProfile, ClientError>;
    async fn start_research(
        &self,
        request: &ResearchRequest,
    ) -> Result<SubmittedResearch, ClientError>;
    async fn research_status(&self, research_id: &str) -> Result<JobStatus, ClientError>;
    async fn research_report(&self, research_id: &str) -> Result<ResearchReport, ClientError>;
    async fn research_history(&self) -> Result<ResearchHistory, ClientError>;
    async fn research_pdf(&self, research_id: &str) -> Result<PdfDocument, ClientError>;
}

enum Body {
    Empty,
    Json(Vec<u8>),
    Form(String),
}

pub struct HttpBackend {
    client: reqwest::Client,
    endpoints: EndpointSet,
    settings: BackendSettings,
    bearer: Arc<dyn BearerSource>,
}

impl HttpBackend {
    pub fn new(
        endpoints: EndpointSet,
        settings: BackendSettings,
        bearer: Arc<dyn BearerSource>,
    ) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ClientError::new(ErrorKind::Config, err.to_string()))?;
        Ok(Self {
            client,
            endpoints,
            settings,
            bearer,
        })
    }

    pub fn endpoints(&self) -> &EndpointSet {
        &self.endpoints
    }

    async fn execute(
        &self,
        method: Method,
        segments: &[&str],
        body: Body,
        authenticated: bool,
        fallback: &str,
    ) -> Result<reqwest::Response, ClientError> {
        let token = if authenticated {
            self.bearer.bearer_token().await
        } else {
            None
        };

        let response = self
            .endpoints
            .send(segments, |url| {
                let mut request = self.client.request(method.clone(), url);
                if let Some(key) = &self.settings.api_key {
                    request = request.header("apikey", key);
                }
                if let Some(token) = &token {
                    request = request.bearer_auth(token);
                }
                match &body {
                    Body::Empty => request,
                    Body::Json(bytes) => request
                        .header(CONTENT_TYPE, "application/json")
                        .body(bytes.clone()),
                    Body::Form(encoded) => request
                        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                        .body(encoded.clone()),
                }
            })
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.bytes().await.unwrap_or_default();
        Err(ClientError::from_status(status.as_u16(), &body, fallback))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        fallback: &str,
    ) -> Result<T, ClientError> {
        let response = self
            .execute(Method::GET, segments, Body::Empty, true, fallback)
            .await?;
        decode(response).await
    }
}

fn json_body<T: Serialize>(value: &T) -> Result<Body, ClientError> {
    serde_json::to_vec(value)
        .map(Body::Json)
        .map_err(|err| ClientError::new(ErrorKind::Decode, err.to_string()))
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let bytes = response.bytes().await.map_err(map_reqwest_error)?;
    serde_json::from_slice(&bytes).map_err(|err| {
        ClientError::new(
            ErrorKind::Decode,
            format!("The server sent an unexpected response: {err}"),
        )
    })
}

#[async_trait::async_trait]
impl Backend for HttpBackend {
    async fn register(&self, request: &RegisterRequest) -> Result<UserProfile, ClientError> {
        let response = self
            .execute(
                Method::POST,
                &["auth", "register"],
                json_body(request)?,
                false,
                "Registration failed. Please try again.",
            )
            .await?;
        decode(response).await
    }

    async fn password_grant(
        &self,
        username: &str,
        password: &str,
    ) -> Result<TokenGrant, ClientError> {
        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("username", username)
            .append_pair("password", password)
            .finish();
        let response = self
            .execute(
                Method::POST,
                &["auth", "token"],
                Body::Form(form),
                false,
                "Login failed. Please check your credentials and try again.",
            )
            .await?;
        decode(response).await
    }

    async fn current_user(&self) -> Result<UserProfile, ClientError> {
        self.get_json(&["users", "me"], "Failed to load user profile.").await
    }

    async fn start_research(
        &self,
        request: &ResearchRequest,
    ) -> Result<SubmittedResearch, ClientError> {
        let response = self
            .execute(
                Method::POST,
                &["research"],
                json_body(request)?,
                true,
                "Failed to generate research report. Please try again.",
            )
            .await?;
        decode(response).await
    }

    async fn research_status(&self, research_id: &str) -> Result<JobStatus, ClientError> {
        let status: StatusResponse = self
            .get_json(
                &["research", research_id, "status"],
                "Failed to load research. Please try again.",
            )
            .await?;
        Ok(status.status)
    }

    async fn research_report(&self, research_id: &str) -> Result<ResearchReport, ClientError> {
        self.get_json(
            &["research", research_id],
            "Failed to load research. Please try again.",
        )
        .await
    }

    async fn research_history(&self) -> Result<ResearchHistory, ClientError> {
        self.get_json(&["research", "history"], "Failed to load research history.")
            .await
    }

    async fn research_pdf(&self, research_id: &str) -> Result<PdfDocument, ClientError> {
        let response = self
            .execute(
                Method::GET,
                &["research", research_id, "pdf"],
                Body::Empty,
                true,
                "Failed to download PDF. Please try again later.",
            )
            .await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned);
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        if !PdfDocument::looks_like_pdf(&bytes, content_type.as_deref()) {
            return Err(ClientError::new(
                ErrorKind::Decode,
                "The server did not return a PDF document.",
            ));
        }
        Ok(PdfDocument {
            bytes,
            content_type,
        })
    }
}
