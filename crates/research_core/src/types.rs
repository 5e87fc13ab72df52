use serde::{Deserialize, Serialize};

pub type ResearchId = String;

/// How a bearer credential was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialSource {
    #[serde(rename = "password_login")]
    PasswordLogin,
    #[serde(rename = "oauth_provider")]
    OAuthProvider,
}

/// Bearer credential as persisted by the token store.
///
/// Expiry is managed by whoever issued the token and is not tracked here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub obtained_from: CredentialSource,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, obtained_from: CredentialSource) -> Self {
        Self {
            access_token: access_token.into(),
            obtained_from,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub id: Option<i64>,
    pub email: String,
    pub username: String,
    pub created_at: String,
    /// Synthesized locally from a provider session, not yet confirmed by the backend.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub provisional: bool,
}

impl UserProfile {
    const UNKNOWN_EMAIL: &'static str = "unknown@example.com";

    /// Builds a placeholder profile from the email a provider session carries.
    pub fn provisional(email: Option<&str>, created_at: impl Into<String>) -> Self {
        let email = email
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .unwrap_or(Self::UNKNOWN_EMAIL);
        let username = email.split('@').next().unwrap_or(email).to_string();
        Self {
            id: None,
            email: email.to_string(),
            username,
            created_at: created_at.into(),
            provisional: true,
        }
    }

    /// The key a user is recognized by across provisional and authoritative profiles.
    pub fn identity_key(&self) -> &str {
        &self.email
    }

    /// True if `other` describes the same person: emails match, and ids match when both are known.
    pub fn same_identity(&self, other: &UserProfile) -> bool {
        let ids_agree = match (self.id, other.id) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        ids_agree && self.email.eq_ignore_ascii_case(&other.email)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    #[serde(alias = "processing")]
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchJob {
    pub id: ResearchId,
    pub status: JobStatus,
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
}

/// Backend acknowledgement of a research submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedResearch {
    pub research_id: ResearchId,
    pub status: JobStatus,
    #[serde(default)]
    pub estimated_time: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSection {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchReport {
    pub id: ResearchId,
    pub topic: String,
    pub summary: String,
    #[serde(default)]
    pub sections: Vec<ReportSection>,
    #[serde(default)]
    pub sources: Vec<Source>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: ResearchId,
    #[serde(default)]
    pub user_id: Option<i64>,
    pub topic: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResearchHistory {
    #[serde(default)]
    pub researches: Vec<HistoryEntry>,
}

impl ResearchHistory {
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.researches.iter().map(|entry| entry.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.researches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.researches.is_empty()
    }
}
