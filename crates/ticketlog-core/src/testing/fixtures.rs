//! Builders for the raw wire shapes ([`IssueDto`], [`HistoryEntry`]) and a
//! helper for seeding the sentinel source's preseeded cache file.

use std::path::Path;

use crate::backend::{FlaggedValue, HistoryEntry, HistoryItem, IssueDto};
use crate::events::model::IssueEvent;

/// A minimal, fully-specified [`IssueDto`] with no history, ready to have
/// fields overridden by the caller.
pub fn issue_dto(key: &str, issue_type: &str, created: &str, status: &str, status_id: &str) -> IssueDto {
    IssueDto {
        key: key.to_string(),
        issue_type: issue_type.to_string(),
        created: created.to_string(),
        updated: created.to_string(),
        status: status.to_string(),
        status_id: status_id.to_string(),
        resolution: None,
        resolution_id: None,
        resolution_date: None,
        flagged: FlaggedValue::default(),
        histories: Vec::new(),
    }
}

/// One changelog entry with a single status-change item.
pub fn status_history(at: &str, from_id: &str, from_name: &str, to_id: &str, to_name: &str) -> HistoryEntry {
    HistoryEntry {
        created: at.to_string(),
        items: vec![HistoryItem {
            field: "status".to_string(),
            from: Some(from_id.to_string()),
            from_string: Some(from_name.to_string()),
            to: Some(to_id.to_string()),
            to_string: Some(to_name.to_string()),
        }],
    }
}

/// Write `events` to `<cache_dir>/<source_id>.jsonl` directly, bypassing
/// [`crate::events::store::EventStore::save`] entirely — this is what
/// "preseeded" means for the sentinel source: the file exists before any
/// `LogProvider` call, and `Hydrate` against that source id never touches
/// the backend to produce it.
pub fn seed_cache_file(cache_dir: &Path, source_id: &str, events: &[IssueEvent]) -> std::io::Result<()> {
    std::fs::create_dir_all(cache_dir)?;
    let path = cache_dir.join(format!("{source_id}.jsonl"));
    let mut lines = String::new();
    for event in events {
        lines.push_str(&serde_json::to_string(event).expect("IssueEvent always serializes"));
        lines.push('\n');
    }
    std::fs::write(path, lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::store::EventStore;
    use crate::time::Timestamp;

    #[test]
    fn seeded_cache_file_is_loadable_by_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let events = vec![IssueEvent::new_created("ABC-1", "Story", Timestamp(1_000))];
        seed_cache_file(dir.path(), "MCSTEST", &events).unwrap();

        let store = EventStore::new();
        store.load(dir.path(), "MCSTEST").unwrap();
        assert_eq!(store.count("MCSTEST"), 1);
    }
}
