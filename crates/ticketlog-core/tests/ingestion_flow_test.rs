//! End-to-end coverage across the ingestion orchestrator, the event store,
//! and the projection layer — exercised the way a consumer would, through
//! the crate's public API rather than its internals.

use std::sync::Arc;

use ticketlog_core::backend::{IssueDto, MockBackendClient, RegistryPayload, SearchPage};
use ticketlog_core::config::IngestionConfig;
use ticketlog_core::events::model::EventType;
use ticketlog_core::events::store::EventStore;
use ticketlog_core::projections::{discover_dataset_boundaries, reconstruct};
use ticketlog_core::testing::fixtures::{issue_dto, seed_cache_file, status_history};
use ticketlog_core::time::parse_vendor_timestamp;
use ticketlog_core::{LogProvider, Timestamp};

fn dto_at(key: &str, created: &str) -> IssueDto {
    let mut dto = issue_dto(key, "Story", created, "Backlog", "1");
    dto.resolution = None;
    dto
}

#[tokio::test]
async fn s8_expand_history_extends_omrc_backward() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(EventStore::new());

    // Seed the cache with a single, already-hydrated event at T.
    let seeded_ts = parse_vendor_timestamp("2024-01-10T00:00:00.000+0000").unwrap();
    let seeded = ticketlog_core::IssueEvent::new_created("ABC-1", "Story", seeded_ts);
    seed_cache_file(dir.path(), "ABC", std::slice::from_ref(&seeded)).unwrap();

    let mut backend = MockBackendClient::new();
    backend.expect_get_registry().returning(|_| Ok(RegistryPayload::default()));
    backend.expect_search_issues().returning(move |query, offset, _page_size| {
        if query.contains("updated <=") {
            if offset == 0 {
                Ok(SearchPage { total: 1, issues: vec![dto_at("ABC-2", "2024-01-09T00:00:00.000+0000")] })
            } else {
                Ok(SearchPage { total: 1, issues: vec![] })
            }
        } else {
            // The automatic catch-up that follows ExpandHistory: nothing new forward.
            Ok(SearchPage { total: 0, issues: vec![] })
        }
    });

    let provider = LogProvider::new(store.clone(), Arc::new(backend), IngestionConfig::default(), dir.path().to_path_buf());

    // Load the preseeded cache into the provider's store first.
    store.load(dir.path(), "ABC").unwrap();
    let before = store.count("ABC");
    assert_eq!(before, 1);

    let outcome = provider.expand_history("ABC", "ABC", "project = ABC", 1, None).await.unwrap();

    assert_eq!(store.count("ABC"), 2);
    assert!(outcome.omrc.unwrap() < seeded_ts);
}

#[tokio::test]
async fn sentinel_source_never_calls_the_backend() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(EventStore::new());
    let preseeded = vec![ticketlog_core::IssueEvent::new_created("SENT-1", "Story", Timestamp(1_000))];
    seed_cache_file(dir.path(), "MCSTEST", &preseeded).unwrap();

    let mut backend = MockBackendClient::new();
    backend.expect_search_issues().never();
    backend.expect_get_registry().returning(|_| Ok(RegistryPayload::default()));

    let provider = LogProvider::new(store.clone(), Arc::new(backend), IngestionConfig::default(), dir.path().to_path_buf());
    provider.hydrate("MCSTEST", "SENT", "", None).await.unwrap();

    assert_eq!(store.count("MCSTEST"), 1);
}

#[tokio::test]
async fn transform_through_store_through_projection_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(EventStore::new());

    let mut backend = MockBackendClient::new();
    backend.expect_get_registry().returning(|_| Ok(RegistryPayload::default()));
    backend.expect_search_issues().returning(move |_query, offset, _page_size| {
        if offset == 0 {
            let mut dto = dto_at("ABC-1", "2024-01-01T00:00:00.000+0000");
            dto.status = "Done".to_string();
            dto.status_id = "5".to_string();
            dto.resolution = Some("Done".to_string());
            dto.resolution_id = Some("10".to_string());
            dto.resolution_date = Some("2024-01-02T00:00:00.000+0000".to_string());
            dto.histories.push(status_history(
                "2024-01-01T12:00:00.000+0000",
                "1",
                "Backlog",
                "3",
                "In Progress",
            ));
            Ok(SearchPage { total: 1, issues: vec![dto] })
        } else {
            Ok(SearchPage { total: 1, issues: vec![] })
        }
    });

    let provider = LogProvider::new(store.clone(), Arc::new(backend), IngestionConfig::default(), dir.path().to_path_buf());
    provider.hydrate("ABC", "ABC", "project = ABC", None).await.unwrap();

    let events = store.get_events_for_issue("ABC", "ABC-1");
    assert!(events.iter().any(|e| e.event_type == EventType::Created));

    let boundaries = discover_dataset_boundaries(&events);
    assert_eq!(boundaries.distinct_issue_count, 1);

    let issue = reconstruct(&events, None, None);
    assert_eq!(issue.key, "ABC-1");
    assert_eq!(issue.resolution.as_deref(), Some("Done"));
}
