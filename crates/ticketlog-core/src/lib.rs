//! # Ticketlog Core
//!
//! This crate is the event-sourcing engine behind a ticketing-history analytics
//! pipeline. It owns the part of the system every downstream forecast and
//! stability metric ultimately depends on:
//!
//! - [`time`] and [`registry`] - vendor timestamp parsing and ID-to-name resolution.
//! - [`transform`] - converts one raw issue snapshot + changelog into a normalized,
//!   chronologically ordered [`events::IssueEvent`] stream, healing project-boundary
//!   moves along the way.
//! - [`store`] - a thread-safe, per-source partitioned event log with
//!   deduplication, JSON-lines persistence, and atomic cache files.
//! - [`provider`] - a progressive ingestion orchestrator (`Hydrate`, `CatchUp`,
//!   `ExpandHistory`) that keeps freshness markers moving forward without ever
//!   losing history.
//! - [`projections`] - reconstructs full issues from their event sub-stream and
//!   computes residency, WIP, throughput, and scope-cohort views with
//!   time-travel semantics.
//!
//! ## What this crate does *not* do
//!
//! It does not talk to the ticketing backend over the network, does not
//! interpret process semantics (tiers, commitment points, outcomes beyond what
//! callers hand it), and does not forecast anything. Those are the caller's
//! job; this crate only owns the append-only log and its projections. See
//! [`backend::BackendClient`] for the seam where a real HTTP-backed
//! implementation plugs in.

pub mod backend;
pub mod config;
pub mod error;
pub mod events;
pub mod projections;
pub mod registry;
pub mod time;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{ProviderError, StoreError};
pub use events::model::{EventType, FreshnessMarkers, IssueEvent};
pub use events::provider::LogProvider;
pub use events::store::EventStore;
pub use events::transform as transformer;
pub use projections::reconstruct::Issue;
pub use registry::NameRegistry;
pub use time::Timestamp;

/// Current version of the ticket log engine.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports for consumers wiring up ingestion and projections.
pub mod prelude {
    pub use crate::backend::{BackendClient, BackendError, IssueDto, RegistryPayload, SearchPage};
    pub use crate::config::IngestionConfig;
    pub use crate::error::{ProviderError, StoreError};
    pub use crate::events::model::{EventType, FreshnessMarkers, IssueEvent};
    pub use crate::events::provider::{HydrateOutcome, LogProvider};
    pub use crate::events::store::EventStore;
    pub use crate::projections;
    pub use crate::projections::{FinishedStatuses, Issue, StatusMapping, StatusMappings, Tier};
    pub use crate::registry::NameRegistry;
    pub use crate::time::Timestamp;
}
