//! Cohort classification for a discovery/scoping window.

use std::collections::{HashMap, HashSet};

use crate::events::model::IssueEvent;
use crate::projections::mapping::{FinishedStatuses, StatusMappings, Tier};
use crate::projections::reconstruct::{reconstruct, Issue};
use crate::time::Timestamp;

/// A half-open-by-convention time window; both ends are inclusive here
/// since the backend's own range queries are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: Timestamp,
    pub end: Timestamp,
}

/// The four cohorts every non-subtask issue is classified into as of
/// `window.end`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeResult {
    pub finished: Vec<Issue>,
    pub downstream: Vec<Issue>,
    pub upstream: Vec<Issue>,
    pub demand: Vec<Issue>,
}

fn is_subtask(issue_type: &str) -> bool {
    issue_type.eq_ignore_ascii_case("sub-task") || issue_type.eq_ignore_ascii_case("subtask")
}

/// Group events by key (filtered by `issue_types` and `event.ts <=
/// window.end`), reconstruct each, and sort each issue into `Finished` (a
/// resolution landed in `[window.start, window.end]`, further gated by
/// `resolutions` when non-empty) or one of `Downstream`/`Upstream`/`Demand`
/// by its current status's confirmed tier.
///
/// `commitment_point` is accepted for interface parity with the WIP
/// projection but does not affect classification here; see Open Question 2
/// in `SPEC_FULL.md` for why that boundary is still open.
pub fn project_scope(
    events: &[IssueEvent],
    window: Window,
    _commitment_point: &str,
    mappings: &StatusMappings,
    finished: &FinishedStatuses,
    resolutions: &HashSet<String>,
    issue_types: Option<&[String]>,
) -> ScopeResult {
    let mut by_key: HashMap<&str, Vec<&IssueEvent>> = HashMap::new();
    for event in events {
        if event.ts > window.end {
            continue;
        }
        if let Some(types) = issue_types {
            if !types.iter().any(|t| t.eq_ignore_ascii_case(&event.issue_type)) {
                continue;
            }
        }
        by_key.entry(event.issue_key.as_str()).or_default().push(event);
    }

    let resolutions_lower: HashSet<String> = resolutions.iter().map(|r| r.to_lowercase()).collect();

    let mut result = ScopeResult::default();
    for (_key, mut issue_events) in by_key {
        issue_events.sort_by_key(|e| (e.ts, e.event_type));
        if is_subtask(&issue_events[0].issue_type) {
            continue;
        }

        let owned: Vec<IssueEvent> = issue_events.into_iter().cloned().collect();
        let issue = reconstruct(&owned, Some(finished), Some(window.end));

        let resolved_in_window = issue.resolution_date.map(|d| d >= window.start && d <= window.end).unwrap_or(false);
        let resolution_allowed = resolutions_lower.is_empty()
            || issue.resolution.as_deref().map(|r| resolutions_lower.contains(&r.to_lowercase())).unwrap_or(false);

        if resolved_in_window && resolution_allowed {
            result.finished.push(issue);
            continue;
        }

        match issue.status.as_deref().map(|s| mappings.tier_of(s)).unwrap_or(Tier::Demand) {
            Tier::Downstream => result.downstream.push(issue),
            Tier::Upstream => result.upstream.push(issue),
            Tier::Demand | Tier::Finished => result.demand.push(issue),
        }
    }

    let sort_key = |issue: &Issue| issue.resolution_date.unwrap_or(issue.updated);
    result.finished.sort_by_key(sort_key);
    result.downstream.sort_by_key(sort_key);
    result.upstream.sort_by_key(sort_key);
    result.demand.sort_by_key(sort_key);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::model::EventType;
    use crate::projections::mapping::StatusMapping;

    fn created(key: &str, ts: i64, status: &str) -> IssueEvent {
        let mut e = IssueEvent::new_created(key, "Story", Timestamp(ts));
        e.to_status = Some(status.to_string());
        e
    }

    fn resolved(key: &str, ts: i64) -> IssueEvent {
        let mut e = IssueEvent {
            event_type: EventType::Change,
            to_status: Some("Done".to_string()),
            ..IssueEvent::new_created(key, "Story", Timestamp(ts))
        };
        e.resolution = Some("Done".to_string());
        e.resolution_id = Some("10".to_string());
        e
    }

    #[test]
    fn classifies_finished_downstream_upstream_and_demand() {
        let events = vec![
            created("ABC-1", 0, "Backlog"),
            resolved("ABC-1", 10),
            created("ABC-2", 0, "In Review"),
            created("ABC-3", 0, "Backlog"),
            created("ABC-4", 0, "Unmapped"),
        ];

        let finished = FinishedStatuses::new(vec!["Done".to_string()], vec![]);
        let mappings = StatusMappings::new([
            ("In Review".to_string(), StatusMapping::new(Tier::Downstream)),
            ("Backlog".to_string(), StatusMapping::new(Tier::Upstream)),
        ]);

        let result = project_scope(
            &events,
            Window { start: Timestamp(0), end: Timestamp(1_000) },
            "Dev",
            &mappings,
            &finished,
            &HashSet::new(),
            None,
        );

        assert_eq!(result.finished.len(), 1);
        assert_eq!(result.finished[0].key, "ABC-1");
        assert_eq!(result.downstream.len(), 1);
        assert_eq!(result.downstream[0].key, "ABC-2");
        assert_eq!(result.upstream.len(), 1);
        assert_eq!(result.upstream[0].key, "ABC-3");
        assert_eq!(result.demand.len(), 1);
        assert_eq!(result.demand[0].key, "ABC-4");
    }

    #[test]
    fn subtasks_are_excluded() {
        let mut sub = created("ABC-5", 0, "Backlog");
        sub.issue_type = "Sub-task".to_string();
        let result = project_scope(
            &[sub],
            Window { start: Timestamp(0), end: Timestamp(100) },
            "Dev",
            &StatusMappings::default(),
            &FinishedStatuses::default(),
            &HashSet::new(),
            None,
        );
        assert!(result.finished.is_empty() && result.downstream.is_empty() && result.upstream.is_empty() && result.demand.is_empty());
    }
}
