//! Dataset extent discovery, used by discovery UIs to pick sensible windows
//! before running a scoped projection.

use crate::events::model::IssueEvent;
use crate::time::Timestamp;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetBoundaries {
    pub earliest: Option<Timestamp>,
    pub latest: Option<Timestamp>,
    pub distinct_issue_count: usize,
}

pub fn discover_dataset_boundaries(events: &[IssueEvent]) -> DatasetBoundaries {
    let earliest = events.iter().map(|e| e.ts).min();
    let latest = events.iter().map(|e| e.ts).max();
    let distinct_issue_count = events.iter().map(|e| e.issue_key.as_str()).collect::<HashSet<_>>().len();
    DatasetBoundaries { earliest, latest, distinct_issue_count }
}
