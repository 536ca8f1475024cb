//! Work-in-progress snapshot with time-travel semantics.

use std::collections::HashMap;

use crate::events::model::{EventType, IssueEvent};
use crate::projections::mapping::{StatusMappings, Tier};
use crate::time::Timestamp;

const MICROS_PER_DAY: i64 = 86_400 * 1_000_000;

/// One still-in-progress item as of a `BuildWIPProjection` call's reference
/// date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WipEntry {
    pub key: String,
    pub issue_type: String,
    pub status: Option<String>,
    pub commitment_date: Timestamp,
    pub age_days: i64,
}

/// Fold `events` per issue up to `reference_date` and emit one record per
/// issue that has crossed `commitment_point` but not yet reached a
/// `Finished`-tier or `terminal`-role status.
pub fn build_wip_projection(
    events: &[IssueEvent],
    commitment_point: &str,
    mappings: &StatusMappings,
    reference_date: Timestamp,
) -> Vec<WipEntry> {
    let mut by_key: HashMap<&str, Vec<&IssueEvent>> = HashMap::new();
    for event in events {
        if event.ts <= reference_date {
            by_key.entry(event.issue_key.as_str()).or_default().push(event);
        }
    }

    let mut out = Vec::new();
    for (key, mut issue_events) in by_key {
        issue_events.sort_by_key(|e| (e.ts, e.event_type));

        let issue_type = issue_events.first().map(|e| e.issue_type.clone()).unwrap_or_default();
        let mut current_status: Option<String> = None;
        let mut commitment_date: Option<Timestamp> = None;

        for event in &issue_events {
            if event.event_type != EventType::Created && event.event_type != EventType::Change {
                continue;
            }
            if let Some(to_status) = &event.to_status {
                current_status = Some(to_status.clone());
                if commitment_date.is_none() && to_status.eq_ignore_ascii_case(commitment_point) {
                    commitment_date = Some(event.ts);
                }
            }
        }

        let Some(commitment_date) = commitment_date else { continue };

        let has_left_wip = current_status
            .as_deref()
            .and_then(|s| mappings.get(s))
            .map(|m| m.tier == Some(Tier::Finished) || m.is_terminal_role())
            .unwrap_or(false);
        if has_left_wip {
            continue;
        }

        let age_days = (reference_date.as_micros() - commitment_date.as_micros()) / MICROS_PER_DAY;
        out.push(WipEntry {
            key: key.to_string(),
            issue_type,
            status: current_status,
            commitment_date,
            age_days,
        });
    }

    out.sort_by(|a, b| a.key.cmp(&b.key));
    out
}
