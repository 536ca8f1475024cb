//! A mapping-free sample of the most recently active issues, used by
//! workflow discovery heuristics that need representative items before any
//! tier mapping has been confirmed.

use std::collections::HashMap;

use crate::events::model::IssueEvent;
use crate::projections::reconstruct::{reconstruct, Issue};

/// Group by key, rank by most recent event timestamp descending, and
/// reconstruct the top `target_size` — no `finished`/mapping filtering, since
/// the whole point is to sample before that metadata exists.
pub fn project_neutral_sample(events: &[IssueEvent], target_size: usize) -> Vec<Issue> {
    let mut by_key: HashMap<&str, Vec<&IssueEvent>> = HashMap::new();
    for event in events {
        by_key.entry(event.issue_key.as_str()).or_default().push(event);
    }

    let mut ranked: Vec<(&str, crate::time::Timestamp)> = by_key
        .iter()
        .map(|(key, evs)| (*key, evs.iter().map(|e| e.ts).max().expect("non-empty group")))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    ranked
        .into_iter()
        .take(target_size)
        .map(|(key, _)| {
            let mut issue_events: Vec<IssueEvent> = by_key[key].iter().map(|e| (*e).clone()).collect();
            issue_events.sort_by_key(|e| (e.ts, e.event_type));
            reconstruct(&issue_events, None, None)
        })
        .collect()
}
