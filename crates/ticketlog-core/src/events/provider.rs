//! Progressive ingestion against a paginated backend search.
//!
//! [`LogProvider`] is the only thing in this crate that talks to the
//! backend collaborator. It keeps three operations — `hydrate`, `catch_up`,
//! `expand_history` — cooperating on the same freshness markers so that a
//! caller can bootstrap a source, keep it current, and widen its history
//! without ever losing or duplicating an event.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::backend::{BackendClient, RegistryPayload};
use crate::config::IngestionConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::events::store::EventStore;
use crate::events::transform::transform;
use crate::registry::NameRegistry;
use crate::time::Timestamp;

/// Classifies a `Hydrate` run once the prior cache state is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HydrateMode {
    /// No usable prior cache: reach back `initial_lookback_months` and pull
    /// until the minimum coverage thresholds (or the hard limit) are met.
    Initial,
    /// A fresh-enough cache exists: pull forward from its newest event.
    Incremental,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HydrateOutcome {
    pub registry: NameRegistry,
    pub events_fetched: usize,
    pub mode_was_initial: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchUpOutcome {
    pub events_fetched: usize,
    pub nmrc: Option<Timestamp>,
    pub registry: NameRegistry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandHistoryOutcome {
    pub events_fetched: usize,
    pub omrc: Option<Timestamp>,
    pub registry: NameRegistry,
}

/// The ingestion orchestrator. One instance is shared (via `Arc`, same as
/// the store it wraps) across every source being hydrated; it serializes
/// its own per-source pipeline but places no lock across sources, so
/// multiple sources may hydrate concurrently through the same provider.
pub struct LogProvider {
    store: Arc<EventStore>,
    backend: Arc<dyn BackendClient>,
    config: IngestionConfig,
    cache_dir: PathBuf,
}

impl LogProvider {
    pub fn new(
        store: Arc<EventStore>,
        backend: Arc<dyn BackendClient>,
        config: IngestionConfig,
        cache_dir: PathBuf,
    ) -> Self {
        Self { store, backend, config, cache_dir }
    }

    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    async fn resolve_registry(
        &self,
        project_key: &str,
        provided: Option<NameRegistry>,
    ) -> NameRegistry {
        if let Some(registry) = provided {
            return registry;
        }
        match self.backend.get_registry(project_key).await {
            Ok(RegistryPayload { statuses, resolutions }) => NameRegistry::new(statuses, resolutions),
            Err(err) => {
                warn!(project_key, error = %err, "registry fetch failed; continuing without stable labels");
                NameRegistry::default()
            }
        }
    }

    /// Bootstrap or refresh `source_id`'s cache. See module docs and the
    /// ingestion design's five-phase description for the full algorithm.
    pub async fn hydrate(
        &self,
        source_id: &str,
        project_key: &str,
        query: &str,
        registry: Option<NameRegistry>,
    ) -> ProviderResult<HydrateOutcome> {
        if source_id == self.config.sentinel_source_id {
            // The sentinel bypasses the backend (and the staleness check
            // below) entirely; whatever the preseeded cache file held (or
            // didn't) is the final answer.
            self.store.load(&self.cache_dir, source_id)?;
            let registry = self.resolve_registry(project_key, registry).await;
            return Ok(HydrateOutcome { registry, events_fetched: 0, mode_was_initial: false });
        }

        // Phase A: load existing cache, evicting it if it's gone stale.
        self.store.load(&self.cache_dir, source_id)?;
        if let Some(latest) = self.store.get_latest_timestamp(source_id) {
            let age_days = (Timestamp::now().as_micros() - latest.as_micros()) / MICROS_PER_DAY;
            if age_days > self.config.staleness_threshold_days {
                info!(source_id, age_days, "cache is stale; evicting and re-bootstrapping");
                self.store.clear(source_id);
                self.store.delete_cache_file(&self.cache_dir, source_id)?;
            }
        }

        let registry = self.resolve_registry(project_key, registry).await;

        let latest = self.store.get_latest_timestamp(source_id);
        let mode = if latest.is_some() { HydrateMode::Incremental } else { HydrateMode::Initial };

        let hydrate_query = match mode {
            HydrateMode::Initial => {
                let lookback = Timestamp::now()
                    .checked_add_days(-30 * self.config.initial_lookback_months)
                    .unwrap_or_else(Timestamp::now);
                build_query(query, &format!("updated >= \"{}\"", vendor_format(lookback)), "updated DESC")
            }
            HydrateMode::Incremental => {
                let latest = latest.expect("incremental hydrate always has a latest timestamp");
                build_query(query, &format!("updated >= \"{}\"", vendor_format(latest)), "updated ASC")
            }
        };

        let mut run = PageRun::default();
        self.run_pages(source_id, &hydrate_query, &registry, &mut run, |run| match mode {
            HydrateMode::Incremental => false,
            HydrateMode::Initial => {
                run.total_fetched >= self.config.hard_limit
                    || (run.total_fetched >= self.config.min_total_items
                        && run.resolved_fetched >= self.config.min_resolved_items)
            }
        })
        .await?;

        if mode == HydrateMode::Initial
            && run.resolved_fetched < self.config.min_resolved_items
            && run.total_fetched < self.config.hard_limit
        {
            let baseline_query = build_query(query, "resolution IS NOT EMPTY", "resolutiondate DESC");
            self.run_pages(source_id, &baseline_query, &registry, &mut run, |run| {
                run.total_fetched >= self.config.hard_limit
            })
            .await?;
        }

        self.store.save(&self.cache_dir, source_id)?;
        Ok(HydrateOutcome {
            registry,
            events_fetched: run.total_fetched,
            mode_was_initial: mode == HydrateMode::Initial,
        })
    }

    /// Pull everything newer than the current NMRC. Requires a prior cache.
    pub async fn catch_up(
        &self,
        source_id: &str,
        project_key: &str,
        query: &str,
        registry: Option<NameRegistry>,
    ) -> ProviderResult<CatchUpOutcome> {
        if self.store.count(source_id) == 0 {
            return Err(ProviderError::MissingPrecondition {
                source_id: source_id.to_string(),
                operation: "CatchUp",
            });
        }

        let registry = self.resolve_registry(project_key, registry).await;
        let nmrc = self
            .store
            .get_latest_timestamp(source_id)
            .expect("non-empty partition has a latest timestamp");
        let catch_up_query = build_query(query, &format!("updated > \"{}\"", vendor_format(nmrc)), "updated ASC");

        let mut run = PageRun::default();
        self.run_pages(source_id, &catch_up_query, &registry, &mut run, |_| false).await?;

        self.store.save(&self.cache_dir, source_id)?;
        Ok(CatchUpOutcome {
            events_fetched: run.total_fetched,
            nmrc: self.store.get_latest_timestamp(source_id),
            registry,
        })
    }

    /// Pull up to `chunks * batch_size` issues older than the current OMRC,
    /// then always run a `catch_up` afterward to preserve the freshness
    /// invariant. Requires a prior cache.
    pub async fn expand_history(
        &self,
        source_id: &str,
        project_key: &str,
        query: &str,
        chunks: usize,
        registry: Option<NameRegistry>,
    ) -> ProviderResult<ExpandHistoryOutcome> {
        if self.store.count(source_id) == 0 {
            return Err(ProviderError::MissingPrecondition {
                source_id: source_id.to_string(),
                operation: "ExpandHistory",
            });
        }

        let registry = self.resolve_registry(project_key, registry.clone()).await;
        let omrc = self
            .store
            .get_most_recent_updates(source_id)
            .omrc
            .ok_or_else(|| ProviderError::MissingPrecondition {
                source_id: source_id.to_string(),
                operation: "ExpandHistory",
            })?;
        let expand_query = build_query(query, &format!("updated <= \"{}\"", vendor_format(omrc)), "updated DESC");

        let target = chunks.saturating_mul(self.config.batch_size);
        let mut run = PageRun::default();
        self.run_pages(source_id, &expand_query, &registry, &mut run, |run| run.total_fetched >= target)
            .await?;

        self.catch_up(source_id, project_key, query, Some(registry.clone())).await?;

        self.store.save(&self.cache_dir, source_id)?;
        Ok(ExpandHistoryOutcome {
            events_fetched: run.total_fetched,
            omrc: self.store.get_most_recent_updates(source_id).omrc,
            registry,
        })
    }

    /// Page through `query` until a short page arrives or `should_stop`
    /// says to quit early, transforming and appending each DTO as it comes
    /// in. On a page-fetch error, the operation aborts immediately and the
    /// error propagates without saving — whatever was already appended to
    /// the in-memory store stays there, but the cache file is not touched.
    async fn run_pages(
        &self,
        source_id: &str,
        query: &str,
        registry: &NameRegistry,
        run: &mut PageRun,
        should_stop: impl Fn(&PageRun) -> bool,
    ) -> ProviderResult<()> {
        loop {
            let page = self
                .backend
                .search_issues(query, run.offset, self.config.batch_size)
                .await?;
            let page_len = page.issues.len();
            if page_len == 0 {
                break;
            }

            for dto in &page.issues {
                let events = transform(dto, registry);
                self.store.append(source_id, events);
                if dto.resolution_date.is_some() {
                    run.resolved_fetched += 1;
                }
            }

            run.offset += page_len;
            run.total_fetched += page_len;

            let short_page = page_len < self.config.batch_size;
            if short_page || should_stop(run) {
                break;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct PageRun {
    offset: usize,
    total_fetched: usize,
    resolved_fetched: usize,
}

const MICROS_PER_DAY: i64 = 86_400 * 1_000_000;

fn build_query(base: &str, clause: &str, order_by: &str) -> String {
    if base.trim().is_empty() {
        format!("{clause} ORDER BY {order_by}")
    } else {
        format!("({base}) AND {clause} ORDER BY {order_by}")
    }
}

fn vendor_format(ts: Timestamp) -> String {
    ts.to_datetime().format("%Y-%m-%dT%H:%M:%S%.3f%z").to_string()
}
