//! The on-disk and in-memory shape of one event, plus the freshness markers
//! that drive forward/backward ingestion.

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// Discriminates what happened. Ordering matters: `Created` sorts before
/// every other variant at an identical timestamp, so a
/// dedup pass or a downstream reconstruction never observes a transition
/// before the issue it belongs to exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventType {
    Created,
    Change,
    Flagged,
}

/// One atomic signal in the event-sourced log.
///
/// `IssueEvent`s are immutable once appended to a partition; every mutation
/// of an issue's state is a brand new event, never an edit of an existing
/// one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueEvent {
    #[serde(rename = "issueKey")]
    pub issue_key: String,
    #[serde(rename = "issueType")]
    pub issue_type: String,
    #[serde(rename = "eventType")]
    pub event_type: EventType,
    pub ts: Timestamp,

    #[serde(default, skip_serializing_if = "Option::is_none", rename = "fromStatus")]
    pub from_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "fromStatusId")]
    pub from_status_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "toStatus")]
    pub to_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "toStatusId")]
    pub to_status_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "resolutionId")]
    pub resolution_id: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_unresolved: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flagged: Option<String>,

    /// Only meaningful on a `Created` event. See the healing policy in
    /// [`crate::events::transform`].
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_healed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl IssueEvent {
    /// The dedup identity tuple: two events with an equal identity
    /// are the same event, regardless of any other field.
    pub fn identity(&self) -> EventIdentity<'_> {
        EventIdentity {
            issue_key: &self.issue_key,
            ts: self.ts,
            event_type: self.event_type,
            to_status_id: self.to_status_id.as_deref(),
            resolution_id: self.resolution_id.as_deref(),
            is_unresolved: self.is_unresolved,
            flagged: self.flagged.as_deref(),
        }
    }

    pub fn new_created(issue_key: impl Into<String>, issue_type: impl Into<String>, ts: Timestamp) -> Self {
        IssueEvent {
            issue_key: issue_key.into(),
            issue_type: issue_type.into(),
            event_type: EventType::Created,
            ts,
            from_status: None,
            from_status_id: None,
            to_status: None,
            to_status_id: None,
            resolution: None,
            resolution_id: None,
            is_unresolved: false,
            flagged: None,
            is_healed: false,
            metadata: None,
        }
    }
}

/// Borrowed view of [`IssueEvent::identity`] used for dedup lookups without
/// cloning strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventIdentity<'a> {
    pub issue_key: &'a str,
    pub ts: Timestamp,
    pub event_type: EventType,
    pub to_status_id: Option<&'a str>,
    pub resolution_id: Option<&'a str>,
    pub is_unresolved: bool,
    pub flagged: Option<&'a str>,
}

/// Per-source forward/backward sync boundaries.
///
/// `nmrc` ("newest most-recent change") is the timestamp of the latest event
/// the store holds; `omrc` ("oldest most-recent change") is the minimum,
/// across all issues, of each issue's own most recent event — the point past
/// which `ExpandHistory` knows it hasn't reconciled an issue yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FreshnessMarkers {
    pub nmrc: Option<Timestamp>,
    pub omrc: Option<Timestamp>,
}
