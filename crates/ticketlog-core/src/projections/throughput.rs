//! Delivery-date buckets per UTC day.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::events::model::{EventType, IssueEvent};
use crate::projections::mapping::StatusMappings;

/// One day's delivery count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThroughputBucket {
    pub date: NaiveDate,
    pub count: usize,
}

/// For each issue, find the first transition into a delivered state — an
/// explicit resolution, or arrival at a status mapped to `Tier::Finished`
/// with a `delivered` outcome — and bucket that date. An explicit
/// `IsUnresolved` later in the stream re-allows counting a subsequent
/// delivery, so a reopened-then-redelivered issue is still only counted
/// once, on its most recent delivery date.
pub fn build_throughput_projection(events: &[IssueEvent], mappings: &StatusMappings) -> Vec<ThroughputBucket> {
    let mut by_key: HashMap<&str, Vec<&IssueEvent>> = HashMap::new();
    for event in events {
        by_key.entry(event.issue_key.as_str()).or_default().push(event);
    }

    let mut buckets: HashMap<NaiveDate, usize> = HashMap::new();
    for (_key, mut issue_events) in by_key {
        issue_events.sort_by_key(|e| (e.ts, e.event_type));

        let mut delivered_at = None;
        for event in &issue_events {
            if event.event_type != EventType::Change {
                continue;
            }
            if event.is_unresolved {
                delivered_at = None;
                continue;
            }
            if delivered_at.is_some() {
                continue;
            }

            let explicit_resolution = event.resolution.is_some() || event.resolution_id.is_some();
            let delivered_status = event
                .to_status
                .as_deref()
                .and_then(|s| mappings.get(s))
                .map(|m| m.tier == Some(crate::projections::mapping::Tier::Finished) && m.is_delivered_outcome())
                .unwrap_or(false);

            if explicit_resolution || delivered_status {
                delivered_at = Some(event.ts);
            }
        }

        if let Some(ts) = delivered_at {
            let date = ts.to_datetime().date_naive();
            *buckets.entry(date).or_insert(0) += 1;
        }
    }

    let mut out: Vec<_> = buckets.into_iter().map(|(date, count)| ThroughputBucket { date, count }).collect();
    out.sort_by_key(|b| b.date);
    out
}
