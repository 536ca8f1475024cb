//! A thread-safe, per-source partitioned event log with deduplication,
//! JSON-lines persistence, and atomic cache files.
//!
//! Every partition is reachable only through this store: events are
//! immutable once appended, ordering is maintained on every mutation, and
//! readers never observe a half-written batch because all mutation happens
//! under one writer-lock critical section per source.

use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::warn;

use crate::error::{StoreError, StoreResult};
use crate::events::model::{EventType, FreshnessMarkers, IssueEvent};
use crate::time::Timestamp;

/// Owned form of [`IssueEvent::identity`] suitable for hashing. Cloning the
/// handful of `Option<String>` fields here is cheap next to the I/O this
/// store otherwise does, and it keeps the dedup set free of borrows into
/// vectors we're about to mutate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct OwnedIdentity {
    issue_key: String,
    ts: Timestamp,
    event_type: EventType,
    to_status_id: Option<String>,
    resolution_id: Option<String>,
    is_unresolved: bool,
    flagged: Option<String>,
}

impl From<&IssueEvent> for OwnedIdentity {
    fn from(e: &IssueEvent) -> Self {
        let id = e.identity();
        OwnedIdentity {
            issue_key: id.issue_key.to_string(),
            ts: id.ts,
            event_type: id.event_type,
            to_status_id: id.to_status_id.map(String::from),
            resolution_id: id.resolution_id.map(String::from),
            is_unresolved: id.is_unresolved,
            flagged: id.flagged.map(String::from),
        }
    }
}

/// A per-source partitioned event log. Cheap to share: clone an `Arc` around
/// it, never the store itself.
#[derive(Debug, Default)]
pub struct EventStore {
    partitions: RwLock<HashMap<String, Vec<IssueEvent>>>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert events not already present (by dedup identity), then re-sort
    /// the partition. `Append` and `Merge` share this implementation; the
    /// distinction in the ingestion design is about caller intent
    /// (bootstrap vs. re-fetch), not mechanics.
    pub fn append(&self, source_id: &str, new_events: Vec<IssueEvent>) -> usize {
        let mut partitions = self.partitions.write().expect("event store lock poisoned");
        let partition = partitions.entry(source_id.to_string()).or_default();

        let mut seen: std::collections::HashSet<OwnedIdentity> =
            partition.iter().map(OwnedIdentity::from).collect();

        let mut inserted = 0;
        for event in new_events {
            let identity = OwnedIdentity::from(&event);
            if seen.insert(identity) {
                partition.push(event);
                inserted += 1;
            }
        }

        partition.sort_by_key(|e| (e.ts, e.event_type));
        inserted
    }

    /// Semantically identical to [`EventStore::append`]; kept as a distinct
    /// name because callers use it specifically for freshly re-fetched
    /// batches where re-appearance of an existing event is the expected
    /// common case rather than the exception.
    pub fn merge(&self, source_id: &str, new_events: Vec<IssueEvent>) -> usize {
        self.append(source_id, new_events)
    }

    /// Read `<cacheDir>/<sourceID>.jsonl` and append its contents. A missing
    /// file is not an error; a malformed line is skipped with a warning
    /// rather than aborting the whole load.
    pub fn load(&self, cache_dir: &Path, source_id: &str) -> StoreResult<usize> {
        let path = cache_path(cache_dir, source_id);
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(source) => return Err(StoreError::Read { path, source }),
        };

        let mut parsed = Vec::new();
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| StoreError::Read { path: path.clone(), source })?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<IssueEvent>(&line) {
                Ok(event) => parsed.push(event),
                Err(err) => warn!(source_id, lineno, error = %err, "skipping malformed event log line"),
            }
        }

        Ok(self.append(source_id, parsed))
    }

    /// Write every event for `source_id` to a temp file, then atomically
    /// rename it into place. A partition with no events is skipped — there
    /// is nothing to preserve and no stale cache file is touched.
    pub fn save(&self, cache_dir: &Path, source_id: &str) -> StoreResult<()> {
        let partitions = self.partitions.read().expect("event store lock poisoned");
        let Some(events) = partitions.get(source_id) else {
            return Ok(());
        };
        if events.is_empty() {
            return Ok(());
        }

        fs::create_dir_all(cache_dir).map_err(|source| StoreError::Write {
            path: cache_dir.to_path_buf(),
            source,
        })?;

        let final_path = cache_path(cache_dir, source_id);
        let tmp_path = final_path.with_extension("jsonl.tmp");

        let write_result = (|| -> StoreResult<()> {
            let mut file = fs::File::create(&tmp_path).map_err(|source| StoreError::Write {
                path: tmp_path.clone(),
                source,
            })?;
            for event in events.iter() {
                let line = serde_json::to_string(event).map_err(StoreError::Serialize)?;
                writeln!(file, "{line}").map_err(|source| StoreError::Write {
                    path: tmp_path.clone(),
                    source,
                })?;
            }
            file.sync_all().map_err(|source| StoreError::Write {
                path: tmp_path.clone(),
                source,
            })
        })();

        if let Err(err) = write_result {
            let _ = fs::remove_file(&tmp_path);
            return Err(err);
        }

        fs::rename(&tmp_path, &final_path).map_err(|source| StoreError::Rename {
            from: tmp_path,
            to: final_path,
            source,
        })
    }

    /// Remove a source's on-disk cache file, used when a stale cache is
    /// evicted during `Hydrate`. Absent file is not an error.
    pub fn delete_cache_file(&self, cache_dir: &Path, source_id: &str) -> StoreResult<()> {
        let path = cache_path(cache_dir, source_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Write { path, source }),
        }
    }

    /// Events with `ts` in `[start, end]`. `end = None` means unbounded.
    pub fn get_events_in_range(&self, source_id: &str, start: Timestamp, end: Option<Timestamp>) -> Vec<IssueEvent> {
        let partitions = self.partitions.read().expect("event store lock poisoned");
        partitions
            .get(source_id)
            .map(|events| {
                events
                    .iter()
                    .filter(|e| e.ts >= start && end.map(|end| e.ts <= end).unwrap_or(true))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_events_for_issue(&self, source_id: &str, issue_key: &str) -> Vec<IssueEvent> {
        let partitions = self.partitions.read().expect("event store lock poisoned");
        partitions
            .get(source_id)
            .map(|events| events.iter().filter(|e| e.issue_key == issue_key).cloned().collect())
            .unwrap_or_default()
    }

    pub fn get_latest_timestamp(&self, source_id: &str) -> Option<Timestamp> {
        let partitions = self.partitions.read().expect("event store lock poisoned");
        partitions.get(source_id).and_then(|events| events.last()).map(|e| e.ts)
    }

    /// `(OMRC, NMRC)`: the minimum, across issues, of each issue's own
    /// latest event, and the overall latest event.
    pub fn get_most_recent_updates(&self, source_id: &str) -> FreshnessMarkers {
        let partitions = self.partitions.read().expect("event store lock poisoned");
        let Some(events) = partitions.get(source_id) else {
            return FreshnessMarkers::default();
        };
        if events.is_empty() {
            return FreshnessMarkers::default();
        }

        let mut per_issue_latest: HashMap<&str, Timestamp> = HashMap::new();
        for event in events {
            per_issue_latest
                .entry(event.issue_key.as_str())
                .and_modify(|ts| *ts = (*ts).max(event.ts))
                .or_insert(event.ts);
        }

        let nmrc = events.last().map(|e| e.ts);
        let omrc = per_issue_latest.values().copied().min();
        FreshnessMarkers { nmrc, omrc }
    }

    pub fn count(&self, source_id: &str) -> usize {
        let partitions = self.partitions.read().expect("event store lock poisoned");
        partitions.get(source_id).map(Vec::len).unwrap_or(0)
    }

    pub fn clear(&self, source_id: &str) {
        let mut partitions = self.partitions.write().expect("event store lock poisoned");
        partitions.remove(source_id);
    }

    /// Drop every partition whose source id isn't in `keep`.
    pub fn prune_except(&self, keep: &[String]) {
        let mut partitions = self.partitions.write().expect("event store lock poisoned");
        partitions.retain(|source_id, _| keep.iter().any(|k| k == source_id));
    }

    /// Every `(sourceID, event)` pair across all partitions for one issue
    /// key — used when a consumer knows a key but not which source it lives
    /// under.
    pub fn find_issue_in_all_sources(&self, issue_key: &str) -> Vec<(String, IssueEvent)> {
        let partitions = self.partitions.read().expect("event store lock poisoned");
        partitions
            .iter()
            .flat_map(|(source_id, events)| {
                events
                    .iter()
                    .filter(|e| e.issue_key == issue_key)
                    .map(move |e| (source_id.clone(), e.clone()))
            })
            .collect()
    }
}

fn cache_path(cache_dir: &Path, source_id: &str) -> PathBuf {
    cache_dir.join(format!("{source_id}.jsonl"))
}
