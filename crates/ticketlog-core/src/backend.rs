//! The contract this crate calls out through, not one it implements.
//!
//! The HTTP client to the ticketing backend is an external collaborator: the
//! real implementation (auth, retries, request pacing, response caching)
//! lives outside this crate's scope. What belongs here is the shape of that
//! collaborator as seen by [`crate::events::provider::LogProvider`] — a
//! paginated issue search and a per-project name registry fetch — plus the
//! wire DTOs the transformer consumes.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Dynamic "flagged" payload. Real backends have shipped this as `null`, a
/// bare string, or an array of `{"value": ...}` objects across API versions;
/// we model all three rather than pick one and panic on the others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlaggedValue {
    Null(Option<()>),
    Str(String),
    List(Vec<FlaggedObject>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedObject {
    pub value: String,
}

impl Default for FlaggedValue {
    fn default() -> Self {
        FlaggedValue::Null(None)
    }
}

impl FlaggedValue {
    /// The first non-empty string this payload carries, or `None` — never a
    /// panic, regardless of which of the three shapes arrived.
    pub fn first_non_empty(&self) -> Option<String> {
        match self {
            FlaggedValue::Null(_) => None,
            FlaggedValue::Str(s) if !s.is_empty() => Some(s.clone()),
            FlaggedValue::Str(_) => None,
            FlaggedValue::List(items) => items
                .iter()
                .map(|i| i.value.clone())
                .find(|v| !v.is_empty()),
        }
    }
}

/// One raw `{field, from, to, fromString, toString}` changelog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub field: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default, rename = "fromString")]
    pub from_string: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default, rename = "toString")]
    pub to_string: Option<String>,
}

/// One changelog entry: a timestamp plus every item that changed atomically
/// at that instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub created: String,
    #[serde(default)]
    pub items: Vec<HistoryItem>,
}

/// The raw per-issue payload the transformer consumes: current snapshot
/// fields plus the ordered (possibly unordered on the wire) changelog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueDto {
    pub key: String,
    #[serde(rename = "issueType")]
    pub issue_type: String,
    pub created: String,
    /// Last-modified time, as reported by the backend. Distinct from any
    /// event timestamp derived from history — this is the field ingestion
    /// pagination and freshness cursors are built on.
    pub updated: String,
    pub status: String,
    #[serde(rename = "statusId")]
    pub status_id: String,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default, rename = "resolutionId")]
    pub resolution_id: Option<String>,
    #[serde(default, rename = "resolutionDate")]
    pub resolution_date: Option<String>,
    #[serde(default)]
    pub flagged: FlaggedValue,
    #[serde(default)]
    pub histories: Vec<HistoryEntry>,
}

impl IssueDto {
    /// The project key prefix of this issue's own key, e.g. `"ABC"` out of
    /// `"ABC-123"`. Used to tell a project-boundary move apart from a plain
    /// renumbering.
    pub fn project_key(&self) -> &str {
        project_prefix(&self.key)
    }
}

/// Extract the project prefix out of an issue key (`"ABC-123"` -> `"ABC"`).
/// Falls back to the whole string when there's no separator to split on.
pub fn project_prefix(issue_key: &str) -> &str {
    issue_key.rsplit_once('-').map(|(prefix, _)| prefix).unwrap_or(issue_key)
}

/// One page of a backend search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    pub total: usize,
    pub issues: Vec<IssueDto>,
}

/// A project's status/resolution ID-to-name tables, as returned by the
/// backend's name-resolution registry endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryPayload {
    pub statuses: HashMap<String, String>,
    pub resolutions: HashMap<String, String>,
}

#[derive(Debug, Error, Clone)]
pub enum BackendError {
    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("backend returned a server error: {message}")]
    Server { message: String },

    #[error("backend rejected credentials")]
    Forbidden,

    #[error("backend rate limited this request{}", retry_after_secs.map(|s| format!(", retry after {s}s")).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },
}

pub type BackendResult<T> = Result<T, BackendError>;

/// What [`crate::events::provider::LogProvider`] needs from the ticketing
/// backend. A concrete, network-talking implementation is the caller's
/// responsibility; this crate ships only [`crate::testing::MockBackendClient`]
/// for tests.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn search_issues(
        &self,
        query: &str,
        offset: usize,
        page_size: usize,
    ) -> BackendResult<SearchPage>;

    async fn get_registry(&self, project_key: &str) -> BackendResult<RegistryPayload>;
}
