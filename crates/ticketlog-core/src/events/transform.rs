//! The deterministic DTO -> event transformer.
//!
//! This module owns the single hardest piece of temporal reasoning in the
//! crate: turning one issue's current snapshot plus its raw, possibly
//! out-of-order changelog into a chronological [`IssueEvent`] stream,
//! including the "healing" of project-boundary moves described in the
//! module-level notes below.
//!
//! ## Healing
//!
//! An issue can cross a project boundary during its life (a rename, a
//! workflow migration). The transformer tells three move patterns apart:
//!
//! - **Same-workflow move** — a key/project rename with no accompanying
//!   `workflow` field change, and no project prefix actually crossed (e.g. a
//!   plain key renumbering within the same project). Not a boundary: history
//!   is preserved untouched.
//! - **Cross-workflow move** — either an explicit `workflow` field change
//!   alongside the key/project item, or a key/project change that genuinely
//!   arrives in the issue's current project from somewhere else. This is the
//!   healing boundary: the transformer drops everything that happened before
//!   the arrival and synthesizes a `Created` event that keeps the item's true
//!   (biological) birth timestamp but carries the status it had the moment it
//!   arrived — not the status it was born with in the old project. That
//!   synthesized event's `is_healed` flag is the only place this ever
//!   surfaces; reconstruction and residency never special-case it further.
//! - **External move** — a move between two projects, neither of which is
//!   the issue's current one. Not a boundary for this issue: ignored.

use chrono::Duration as ChronoDuration;

use crate::backend::{project_prefix, HistoryEntry, HistoryItem, IssueDto};
use crate::events::model::{EventType, IssueEvent};
use crate::registry::NameRegistry;
use crate::time::{parse_vendor_timestamp, Timestamp};

const RESOLUTION_GRACE_WINDOW_SECS: i64 = 2;

/// Convert one issue's raw snapshot and changelog into its normalized event
/// stream. Never panics: unparseable sub-records are skipped, not fatal.
pub fn transform(dto: &IssueDto, registry: &NameRegistry) -> Vec<IssueEvent> {
    let ordered = chronological_entries(dto);
    let project = dto.project_key();

    let boundary = ordered
        .iter()
        .enumerate()
        .rev()
        .find_map(|(idx, (ts, entry))| {
            find_relevant_move(entry, project).map(|move_item| (idx, *ts, move_item))
        });

    let (keep_from, healed, arrival_status) = match boundary {
        Some((boundary_idx, boundary_ts, move_item)) => {
            let _ = move_item;
            let arrival = arrival_status_at_boundary(&ordered, boundary_idx, registry);
            let mut keep_from = boundary_idx;
            while keep_from > 0 && ordered[keep_from - 1].0 == boundary_ts {
                keep_from -= 1;
            }
            (keep_from, true, arrival)
        }
        None => (0, false, None),
    };

    let mut events = Vec::new();
    for (idx, (ts, entry)) in ordered.iter().enumerate() {
        if idx < keep_from {
            continue;
        }
        let suppress_status = healed && idx == boundary.as_ref().map(|b| b.0).unwrap_or(usize::MAX);
        emit_entry_events(dto, entry, *ts, registry, suppress_status, &mut events);
    }

    let created = build_created_event(dto, &ordered, keep_from, healed, arrival_status, registry);
    let created_ts = created.ts;
    events.push(created);

    apply_resolution_fallback(dto, created_ts, registry, &mut events);

    events.sort_by_key(|e| (e.ts, e.event_type));
    events
}

/// Parse and sort history entries ascending by timestamp. An entry whose
/// timestamp doesn't parse is dropped entirely;
/// every other entry keeps its original items untouched.
fn chronological_entries(dto: &IssueDto) -> Vec<(Timestamp, &HistoryEntry)> {
    let mut entries: Vec<(Timestamp, &HistoryEntry)> = dto
        .histories
        .iter()
        .filter_map(|entry| parse_vendor_timestamp(&entry.created).ok().map(|ts| (ts, entry)))
        .collect();
    entries.sort_by_key(|(ts, _)| *ts);
    entries
}

fn item_field_is(item: &HistoryItem, name: &str) -> bool {
    item.field.eq_ignore_ascii_case(name)
}

fn find_status_item(entry: &HistoryEntry) -> Option<&HistoryItem> {
    entry.items.iter().find(|i| item_field_is(i, "status"))
}

fn find_resolution_item(entry: &HistoryEntry) -> Option<&HistoryItem> {
    entry.items.iter().find(|i| item_field_is(i, "resolution"))
}

fn find_flagged_item(entry: &HistoryEntry) -> Option<&HistoryItem> {
    entry.items.iter().find(|i| item_field_is(i, "flagged"))
}

/// Classify a key/project change against the three healing patterns: a
/// same-workflow rename (no workflow field change, no project boundary
/// actually crossed) preserves its history untouched; a cross-workflow move
/// — either an explicit `workflow` field change, or a key/project change that
/// genuinely arrives in the issue's current project from somewhere else — is
/// the arrival boundary the whole healing policy hinges on; a move between
/// two projects neither of which is the current one is external and ignored.
fn find_relevant_move<'a>(entry: &'a HistoryEntry, project: &str) -> Option<&'a HistoryItem> {
    let move_item = entry.items.iter().find(|item| item_field_is(item, "key") || item_field_is(item, "project"))?;
    let workflow_changed = entry.items.iter().any(|item| item_field_is(item, "workflow"));

    let to_project = project_prefix(move_item.to_string.as_deref().or(move_item.to.as_deref()).unwrap_or(""));
    let from_project = move_item.from_string.as_deref().or(move_item.from.as_deref()).map(project_prefix);
    let crosses_project_boundary = from_project.map(|p| !p.eq_ignore_ascii_case(to_project)).unwrap_or(true);
    let arrives_here = to_project.eq_ignore_ascii_case(project) && crosses_project_boundary;

    if arrives_here || workflow_changed {
        Some(move_item)
    } else {
        None
    }
}

/// The status the issue is judged to have arrived with: the boundary
/// entry's own status item if it has one, else the `from` of the nearest
/// later history entry that changes status.
fn arrival_status_at_boundary(
    ordered: &[(Timestamp, &HistoryEntry)],
    boundary_idx: usize,
    registry: &NameRegistry,
) -> Option<(Option<String>, Option<String>)> {
    if let Some(status_item) = find_status_item(ordered[boundary_idx].1) {
        return Some(status_name_and_id(status_item, true, registry));
    }
    ordered[boundary_idx + 1..]
        .iter()
        .find_map(|(_, entry)| find_status_item(entry))
        .map(|status_item| status_name_and_id(status_item, false, registry))
}

/// Resolve a status item's name/id pair, preferring the registry over the
/// wire-supplied name per the transformer's fallback chain.
fn status_name_and_id(
    item: &HistoryItem,
    use_to: bool,
    registry: &NameRegistry,
) -> (Option<String>, Option<String>) {
    let (id, translated) = if use_to {
        (item.to.clone(), item.to_string.clone())
    } else {
        (item.from.clone(), item.from_string.clone())
    };
    let name = registry.resolve_status_name(id.as_deref(), translated.as_deref(), None);
    let name = if name.is_empty() { None } else { Some(name) };
    (name, id)
}

fn emit_entry_events(
    dto: &IssueDto,
    entry: &HistoryEntry,
    ts: Timestamp,
    registry: &NameRegistry,
    suppress_status: bool,
    events: &mut Vec<IssueEvent>,
) {
    let status_item = if suppress_status { None } else { find_status_item(entry) };
    let resolution_item = find_resolution_item(entry);
    let flagged_item = find_flagged_item(entry);

    if status_item.is_some() || resolution_item.is_some() {
        let mut change = IssueEvent {
            event_type: EventType::Change,
            ..IssueEvent::new_created(dto.key.clone(), dto.issue_type.clone(), ts)
        };

        if let Some(status_item) = status_item {
            let (from_name, from_id) = status_name_and_id(status_item, false, registry);
            let (to_name, to_id) = status_name_and_id(status_item, true, registry);
            change.from_status = from_name;
            change.from_status_id = from_id;
            change.to_status = to_name;
            change.to_status_id = to_id;
        }

        if let Some(resolution_item) = resolution_item {
            apply_resolution_item(resolution_item, registry, &mut change);
        }

        events.push(change);
    }

    if let Some(flagged_item) = flagged_item {
        let value = flagged_item
            .to_string
            .clone()
            .filter(|v| !v.is_empty())
            .or_else(|| flagged_item.to.clone().filter(|v| !v.is_empty()));
        events.push(IssueEvent {
            event_type: EventType::Flagged,
            flagged: value,
            ..IssueEvent::new_created(dto.key.clone(), dto.issue_type.clone(), ts)
        });
    }
}

fn apply_resolution_item(item: &HistoryItem, registry: &NameRegistry, change: &mut IssueEvent) {
    let to_id = item.to.clone();
    let to_name = item.to_string.clone();
    let is_cleared = to_id.as_deref().map(str::is_empty).unwrap_or(true)
        && to_name.as_deref().map(str::is_empty).unwrap_or(true);
    let is_explicit_unresolved = to_name
        .as_deref()
        .map(|n| n.eq_ignore_ascii_case("unresolved"))
        .unwrap_or(false);

    if is_cleared || is_explicit_unresolved {
        change.is_unresolved = true;
        change.resolution = None;
        change.resolution_id = None;
    } else {
        let name = registry.resolve_resolution_name(to_id.as_deref(), to_name.as_deref(), None);
        change.resolution = if name.is_empty() { None } else { Some(name) };
        change.resolution_id = to_id;
    }
}

fn build_created_event(
    dto: &IssueDto,
    ordered: &[(Timestamp, &HistoryEntry)],
    keep_from: usize,
    healed: bool,
    arrival_status: Option<(Option<String>, Option<String>)>,
    registry: &NameRegistry,
) -> IssueEvent {
    // Missing snapshot creation time: anchor to the earliest event we do
    // have and mark this birth synthetic too, same as a healed one.
    let (synthetic_birth_ts, created_ts) = match parse_vendor_timestamp(&dto.created) {
        Ok(ts) => (false, ts),
        Err(_) => (true, earliest_event_timestamp(ordered).unwrap_or_else(Timestamp::now)),
    };

    let (to_status, to_status_id) = if healed {
        arrival_status.unwrap_or((None, None))
    } else {
        initial_status_before_history(dto, ordered, keep_from, registry)
    };

    let mut created = IssueEvent::new_created(dto.key.clone(), dto.issue_type.clone(), created_ts);
    created.to_status = to_status;
    created.to_status_id = to_status_id;
    created.flagged = initial_flagged_before_history(dto, ordered, keep_from);
    created.is_healed = healed || synthetic_birth_ts;
    created
}

/// The flagged value the issue was born with: the `from` of the earliest
/// preserved flagged change, or the snapshot's own flagged payload if none of
/// its preserved history ever touched it.
fn initial_flagged_before_history(
    dto: &IssueDto,
    ordered: &[(Timestamp, &HistoryEntry)],
    keep_from: usize,
) -> Option<String> {
    let earliest_flagged_item = ordered[keep_from..].iter().find_map(|(_, entry)| find_flagged_item(entry));
    match earliest_flagged_item {
        Some(item) => item
            .from_string
            .clone()
            .filter(|v| !v.is_empty())
            .or_else(|| item.from.clone().filter(|v| !v.is_empty())),
        None => dto.flagged.first_non_empty(),
    }
}

fn earliest_event_timestamp(ordered: &[(Timestamp, &HistoryEntry)]) -> Option<Timestamp> {
    ordered.first().map(|(ts, _)| *ts)
}

/// The status the issue was born with, absent any healing: the `from` of
/// the earliest preserved status change, or the current snapshot status if
/// none of its history ever changed status.
fn initial_status_before_history(
    dto: &IssueDto,
    ordered: &[(Timestamp, &HistoryEntry)],
    keep_from: usize,
    registry: &NameRegistry,
) -> (Option<String>, Option<String>) {
    let earliest_status_item = ordered[keep_from..].iter().find_map(|(_, entry)| find_status_item(entry));
    match earliest_status_item {
        Some(item) => status_name_and_id(item, false, registry),
        None => {
            let name = registry.resolve_status_name(Some(&dto.status_id), Some(&dto.status), None);
            let name = if name.is_empty() { Some(dto.status.clone()) } else { Some(name) };
            (name, Some(dto.status_id.clone()))
        }
    }
}

/// Closes the gap where a backend omits a resolution changelog item but
/// still reports `resolutionDate` on the snapshot: emit a synthetic
/// resolution-bearing `Change` unless one already exists within a 2-second
/// grace window carrying the same resolution id.
fn apply_resolution_fallback(
    dto: &IssueDto,
    created_ts: Timestamp,
    registry: &NameRegistry,
    events: &mut Vec<IssueEvent>,
) {
    let Some(raw_resolution_date) = dto.resolution_date.as_deref() else {
        return;
    };
    let Ok(resolution_ts) = parse_vendor_timestamp(raw_resolution_date) else {
        return;
    };

    let grace = ChronoDuration::seconds(RESOLUTION_GRACE_WINDOW_SECS).num_microseconds().unwrap_or(2_000_000);
    let already_covered = events.iter().any(|e| {
        e.resolution_id.is_some()
            && e.resolution_id == dto.resolution_id
            && (e.ts.as_micros() - resolution_ts.as_micros()).abs() <= grace
    });
    if already_covered {
        return;
    }

    let name = registry.resolve_resolution_name(dto.resolution_id.as_deref(), dto.resolution.as_deref(), None);
    let mut change = IssueEvent {
        event_type: EventType::Change,
        resolution: if name.is_empty() { dto.resolution.clone() } else { Some(name) },
        resolution_id: dto.resolution_id.clone(),
        ..IssueEvent::new_created(dto.key.clone(), dto.issue_type.clone(), resolution_ts)
    };
    if resolution_ts < created_ts {
        change.ts = created_ts;
    }
    events.push(change);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FlaggedValue, HistoryEntry, HistoryItem, IssueDto};
    use serde_json::json;

    fn empty_registry() -> NameRegistry {
        NameRegistry::from_json(&json!({"statuses": {}, "resolutions": {}}))
    }

    fn history_item(field: &str, from: Option<&str>, from_s: Option<&str>, to: Option<&str>, to_s: Option<&str>) -> HistoryItem {
        HistoryItem {
            field: field.to_string(),
            from: from.map(String::from),
            from_string: from_s.map(String::from),
            to: to.map(String::from),
            to_string: to_s.map(String::from),
        }
    }

    fn base_dto(key: &str, created: &str) -> IssueDto {
        IssueDto {
            key: key.to_string(),
            issue_type: "Story".to_string(),
            created: created.to_string(),
            updated: created.to_string(),
            status: "Done".to_string(),
            status_id: "5".to_string(),
            resolution: None,
            resolution_id: None,
            resolution_date: None,
            flagged: FlaggedValue::default(),
            histories: Vec::new(),
        }
    }

    #[test]
    fn s1_duplicate_resolution_emits_exactly_one_resolution_bearing_event() {
        let mut dto = base_dto("ABC-1", "2024-03-20T14:00:00.000+0000");
        dto.resolution = Some("Done".to_string());
        dto.resolution_id = Some("10".to_string());
        dto.resolution_date = Some("2024-03-20T14:30:00.000+0000".to_string());
        dto.histories.push(HistoryEntry {
            created: "2024-03-20T14:30:00.000+0000".to_string(),
            items: vec![
                history_item("status", Some("3"), Some("In Progress"), Some("5"), Some("Done")),
                history_item("resolution", Some(""), Some(""), Some("10"), Some("Done")),
            ],
        });

        let events = transform(&dto, &empty_registry());
        let resolution_events: Vec<_> = events.iter().filter(|e| e.resolution_id.is_some()).collect();
        assert_eq!(resolution_events.len(), 1);
    }

    #[test]
    fn s2_one_second_past_grace_window_still_dedups() {
        let mut dto = base_dto("ABC-1", "2024-03-20T14:00:00.000+0000");
        dto.resolution = Some("Done".to_string());
        dto.resolution_id = Some("10".to_string());
        dto.resolution_date = Some("2024-03-20T14:30:01.000+0000".to_string());
        dto.histories.push(HistoryEntry {
            created: "2024-03-20T14:30:00.000+0000".to_string(),
            items: vec![history_item("resolution", Some(""), Some(""), Some("10"), Some("Done"))],
        });

        let events = transform(&dto, &empty_registry());
        let resolution_events: Vec<_> = events.iter().filter(|e| e.resolution_id.is_some()).collect();
        assert_eq!(resolution_events.len(), 1);
    }

    #[test]
    fn s3_misconfigured_workflow_has_no_resolution_event() {
        let mut dto = base_dto("ABC-1", "2024-03-20T14:00:00.000+0000");
        dto.histories.push(HistoryEntry {
            created: "2024-03-20T14:30:00.000+0000".to_string(),
            items: vec![history_item("status", Some("3"), Some("In Progress"), Some("5"), Some("Done"))],
        });

        let events = transform(&dto, &empty_registry());
        assert!(events.iter().all(|e| e.resolution_id.is_none() && !e.is_unresolved));
    }

    #[test]
    fn s4_explicit_unresolved_is_flagged() {
        let mut dto = base_dto("ABC-1", "2024-03-20T14:00:00.000+0000");
        dto.histories.push(HistoryEntry {
            created: "2024-03-20T15:00:00.000+0000".to_string(),
            items: vec![history_item("resolution", Some("10"), Some("Done"), Some(""), Some(""))],
        });

        let events = transform(&dto, &empty_registry());
        assert!(events.iter().any(|e| e.is_unresolved));
    }

    #[test]
    fn s5_cross_workflow_move_heals_and_drops_pre_move_history() {
        let mut dto = base_dto("ABC-99", "2024-01-01T10:00:00.000+0000");
        dto.histories.push(HistoryEntry {
            created: "2024-01-01T11:00:00.000+0000".to_string(),
            items: vec![history_item("status", Some("1"), Some("Backlog"), Some("2"), Some("DRAFTING"))],
        });
        dto.histories.push(HistoryEntry {
            created: "2024-03-01T12:00:00.000+0000".to_string(),
            items: vec![history_item("key", None, None, Some("ABC-99"), Some("ABC-99"))],
        });
        dto.histories.push(HistoryEntry {
            created: "2024-03-01T14:00:00.000+0000".to_string(),
            items: vec![history_item("status", Some("3"), Some("To Do"), Some("4"), Some("Doing"))],
        });

        let events = transform(&dto, &empty_registry());
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, EventType::Created);
        assert!(events[0].is_healed);
        assert_eq!(events[0].to_status.as_deref(), Some("To Do"));
        assert_eq!(events[1].event_type, EventType::Change);
        assert_eq!(events[1].to_status.as_deref(), Some("Doing"));
    }

    #[test]
    fn same_workflow_key_rename_preserves_pre_move_history() {
        let mut dto = base_dto("ABC-99", "2024-01-01T10:00:00.000+0000");
        dto.histories.push(HistoryEntry {
            created: "2024-01-01T11:00:00.000+0000".to_string(),
            items: vec![history_item("status", Some("1"), Some("Backlog"), Some("2"), Some("DRAFTING"))],
        });
        // Same-project renumbering: no workflow field change, and the key
        // never actually leaves the "ABC" project prefix.
        dto.histories.push(HistoryEntry {
            created: "2024-03-01T12:00:00.000+0000".to_string(),
            items: vec![history_item("key", Some("ABC-50"), Some("ABC-50"), Some("ABC-99"), Some("ABC-99"))],
        });
        dto.histories.push(HistoryEntry {
            created: "2024-03-01T14:00:00.000+0000".to_string(),
            items: vec![history_item("status", Some("3"), Some("To Do"), Some("4"), Some("Doing"))],
        });

        let events = transform(&dto, &empty_registry());
        assert!(!events.iter().any(|e| e.event_type == EventType::Created && e.is_healed));
        let status_changes: Vec<_> = events.iter().filter(|e| e.event_type == EventType::Change).collect();
        assert_eq!(status_changes.len(), 2);
        assert!(status_changes.iter().any(|e| e.to_status.as_deref() == Some("DRAFTING")));
        assert!(status_changes.iter().any(|e| e.to_status.as_deref() == Some("Doing")));
    }

    #[test]
    fn explicit_workflow_field_change_heals_even_within_the_same_project() {
        let mut dto = base_dto("ABC-99", "2024-01-01T10:00:00.000+0000");
        dto.histories.push(HistoryEntry {
            created: "2024-01-01T11:00:00.000+0000".to_string(),
            items: vec![history_item("status", Some("1"), Some("Backlog"), Some("2"), Some("DRAFTING"))],
        });
        dto.histories.push(HistoryEntry {
            created: "2024-03-01T12:00:00.000+0000".to_string(),
            items: vec![
                history_item("key", None, None, Some("ABC-99"), Some("ABC-99")),
                history_item("workflow", Some("1"), Some("Legacy Workflow"), Some("2"), Some("New Workflow")),
                history_item("status", Some("1"), Some("Backlog"), Some("3"), Some("To Do")),
            ],
        });

        let events = transform(&dto, &empty_registry());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::Created);
        assert!(events[0].is_healed);
        assert_eq!(events[0].to_status.as_deref(), Some("To Do"));
    }

    #[test]
    fn created_event_carries_the_issue_s_initial_flagged_value() {
        let mut dto = base_dto("ABC-1", "2024-03-20T14:00:00.000+0000");
        dto.flagged = FlaggedValue::Str("At Risk".to_string());
        dto.histories.push(HistoryEntry {
            created: "2024-03-21T09:00:00.000+0000".to_string(),
            items: vec![history_item("flagged", None, Some("At Risk"), None, Some(""))],
        });

        let events = transform(&dto, &empty_registry());
        let created = events.iter().find(|e| e.event_type == EventType::Created).unwrap();
        assert_eq!(created.flagged.as_deref(), Some("At Risk"));
    }

    #[test]
    fn unparseable_history_entry_is_skipped_not_fatal() {
        let mut dto = base_dto("ABC-1", "2024-03-20T14:00:00.000+0000");
        dto.histories.push(HistoryEntry {
            created: "not-a-timestamp".to_string(),
            items: vec![history_item("status", Some("1"), Some("Backlog"), Some("2"), Some("Doing"))],
        });
        let events = transform(&dto, &empty_registry());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::Created);
    }
}
