//! Reconstructs full item state from an event sub-stream.
//!
//! `reconstruct` is the foundation every other projection in this module
//! builds on: WIP, throughput, and scope views all group raw events by
//! issue key and hand each group's slice through here before classifying
//! the result.

use std::collections::HashMap;

use crate::events::model::{EventType, IssueEvent};
use crate::projections::mapping::FinishedStatuses;
use crate::time::Timestamp;

/// One status change, already resolved to names/ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from_status: Option<String>,
    pub from_status_id: Option<String>,
    pub to_status: Option<String>,
    pub to_status_id: Option<String>,
    pub ts: Timestamp,
}

/// A fully reconstructed item, valid as of whatever `reference_date` the
/// caller reconstructed it at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub key: String,
    pub issue_type: String,
    pub created: Timestamp,
    pub updated: Timestamp,
    pub status: Option<String>,
    pub status_id: Option<String>,
    pub resolution: Option<String>,
    pub resolution_date: Option<Timestamp>,
    pub transitions: Vec<Transition>,
    /// Seconds spent in each status name, summed across every visit.
    pub status_residency: HashMap<String, i64>,
    pub is_moved: bool,
    pub has_synthetic_birth: bool,
}

/// Reconstruct one issue from its (already time-bounded) event slice.
///
/// `finished`, if given, gates the resolution-guard logic: a status not
/// confirmed finished can never carry a resolution
/// date forward, and a status confirmed finished always ends up with one,
/// synthesizing it from the start of the current finished streak if the
/// event stream never supplied one directly. `reference_date` is the
/// "as of" time for items that are still open; `None` means "now".
pub fn reconstruct(events: &[IssueEvent], finished: Option<&FinishedStatuses>, reference_date: Option<Timestamp>) -> Issue {
    let mut ordered: Vec<&IssueEvent> = events.iter().collect();
    ordered.sort_by_key(|e| (e.ts, e.event_type));

    let created_event = ordered.iter().find(|e| e.event_type == EventType::Created);
    let (key, issue_type, created_ts, mut status, mut status_id, moved) = match created_event {
        Some(e) => (
            e.issue_key.clone(),
            e.issue_type.clone(),
            e.ts,
            e.to_status.clone(),
            e.to_status_id.clone(),
            e.is_healed,
        ),
        None => {
            let first = ordered.first();
            (
                first.map(|e| e.issue_key.clone()).unwrap_or_default(),
                first.map(|e| e.issue_type.clone()).unwrap_or_default(),
                first.map(|e| e.ts).unwrap_or_else(Timestamp::now),
                None,
                None,
                false,
            )
        }
    };

    let mut updated = created_ts;
    let mut resolution: Option<String> = None;
    let mut resolution_date: Option<Timestamp> = None;
    let mut transitions: Vec<Transition> = Vec::new();

    for event in &ordered {
        if event.event_type == EventType::Created {
            continue;
        }
        updated = event.ts;

        if event.event_type != EventType::Change {
            continue;
        }

        if event.to_status.is_some() {
            transitions.push(Transition {
                from_status: event.from_status.clone(),
                from_status_id: event.from_status_id.clone(),
                to_status: event.to_status.clone(),
                to_status_id: event.to_status_id.clone(),
                ts: event.ts,
            });
            status = event.to_status.clone();
            status_id = event.to_status_id.clone();
        }

        if event.is_unresolved {
            resolution = None;
            resolution_date = None;
        } else if event.resolution.is_some() || event.resolution_id.is_some() {
            resolution = event.resolution.clone();
            resolution_date = Some(event.ts);
        }

        if let Some(finished) = finished {
            if !finished.contains(status.as_deref(), status_id.as_deref()) {
                resolution = None;
                resolution_date = None;
            } else if resolution_date.is_none() {
                resolution_date = Some(entry_into_current_streak(&transitions, created_ts, finished));
            }
        }
    }

    let currently_finished = finished.map(|f| f.contains(status.as_deref(), status_id.as_deref())).unwrap_or(false);
    let residency_end = resolution_date.unwrap_or_else(|| {
        if currently_finished {
            finished.map(|f| entry_into_current_streak(&transitions, created_ts, f)).unwrap_or(created_ts)
        } else {
            reference_date.unwrap_or_else(Timestamp::now)
        }
    });

    let status_residency = compute_residency(created_ts, status.as_deref(), &transitions, residency_end);

    Issue {
        key,
        issue_type,
        created: created_ts,
        updated,
        status,
        status_id,
        resolution,
        resolution_date,
        transitions,
        status_residency,
        is_moved: moved,
        has_synthetic_birth: moved,
    }
}

/// Walk transitions backward from the tail while each one lands in a
/// finished status; the last timestamp still inside that run is when the
/// item entered its current finished streak.
fn entry_into_current_streak(transitions: &[Transition], created_ts: Timestamp, finished: &FinishedStatuses) -> Timestamp {
    let mut entry = created_ts;
    for t in transitions.iter().rev() {
        if finished.contains(t.to_status.as_deref(), t.to_status_id.as_deref()) {
            entry = t.ts;
        } else {
            break;
        }
    }
    entry
}

/// Convert the transition list into residency segments and sum seconds per
/// status name: Created to the first transition, each consecutive
/// transition pair, then the last transition to `end`.
fn compute_residency(
    created_ts: Timestamp,
    initial_status: Option<&str>,
    transitions: &[Transition],
    end: Timestamp,
) -> HashMap<String, i64> {
    let mut residency: HashMap<String, i64> = HashMap::new();
    let mut add = |status: Option<&str>, start: Timestamp, stop: Timestamp| {
        let Some(status) = status else { return };
        if status.is_empty() {
            return;
        }
        *residency.entry(status.to_string()).or_insert(0) += start.seconds_until_clamped(stop);
    };

    if transitions.is_empty() {
        add(initial_status, created_ts, end);
        return residency;
    }

    add(initial_status, created_ts, transitions[0].ts);
    for pair in transitions.windows(2) {
        add(pair[0].to_status.as_deref(), pair[0].ts, pair[1].ts);
    }
    let last = transitions.last().expect("non-empty transitions");
    add(last.to_status.as_deref(), last.ts, end);
    residency
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::model::IssueEvent;

    fn created(key: &str, ts: i64, status: &str) -> IssueEvent {
        let mut e = IssueEvent::new_created(key, "Story", Timestamp(ts));
        e.to_status = Some(status.to_string());
        e
    }

    fn transition(key: &str, ts: i64, from: &str, to: &str) -> IssueEvent {
        IssueEvent {
            event_type: EventType::Change,
            from_status: Some(from.to_string()),
            to_status: Some(to.to_string()),
            ..IssueEvent::new_created(key, "Story", Timestamp(ts))
        }
    }

    const SECOND: i64 = 1_000_000;

    #[test]
    fn reconstructs_status_and_residency_without_finished_statuses() {
        let events = vec![
            created("ABC-1", 0, "Backlog"),
            transition("ABC-1", 10 * SECOND, "Backlog", "Dev"),
            transition("ABC-1", 30 * SECOND, "Dev", "QA"),
        ];
        let issue = reconstruct(&events, None, Some(Timestamp(50 * SECOND)));
        assert_eq!(issue.status.as_deref(), Some("QA"));
        assert_eq!(issue.status_residency.get("Backlog"), Some(&10));
        assert_eq!(issue.status_residency.get("Dev"), Some(&20));
        assert_eq!(issue.status_residency.get("QA"), Some(&20));
    }

    #[test]
    fn resolution_is_cleared_on_reopen_and_reset_on_reentering_finished() {
        let mut resolve = transition("ABC-1", 20 * SECOND, "Dev", "Done");
        resolve.resolution = Some("Done".to_string());
        resolve.resolution_id = Some("10".to_string());
        let reopen = transition("ABC-1", 30 * SECOND, "Done", "Dev");
        let redone = transition("ABC-1", 40 * SECOND, "Dev", "Done");

        let events = vec![created("ABC-1", 0, "Dev"), resolve, reopen, redone];
        let finished = FinishedStatuses::new(vec!["Done".to_string()], vec![]);
        let issue = reconstruct(&events, Some(&finished), Some(Timestamp(50 * SECOND)));

        assert_eq!(issue.status.as_deref(), Some("Done"));
        assert_eq!(issue.resolution_date, Some(Timestamp(40 * SECOND)));
    }

    #[test]
    fn missing_created_event_falls_back_to_earliest_event() {
        let events = vec![transition("ABC-1", 5 * SECOND, "Backlog", "Dev")];
        let issue = reconstruct(&events, None, None);
        assert_eq!(issue.created, Timestamp(5 * SECOND));
    }
}
