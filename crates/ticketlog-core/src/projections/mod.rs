//! Reconstructs full items from event sub-streams and folds them into the
//! aggregate analytic views: residency, WIP, throughput, scope cohorts,
//! dataset discovery, and neutral sampling.
//!
//! Every projection here is a pure function of a time-bounded event slice
//! plus whatever user-confirmed workflow metadata it needs — tier mappings,
//! finished statuses, a commitment point. None of that metadata is inferred;
//! it is supplied by the caller, which is also where forecasting and
//! stability analysis live — outside this crate's scope.

pub mod boundaries;
pub mod mapping;
pub mod reconstruct;
pub mod sample;
pub mod scope;
pub mod throughput;
pub mod wip;

pub use boundaries::{discover_dataset_boundaries, DatasetBoundaries};
pub use mapping::{FinishedStatuses, StatusMapping, StatusMappings, Tier};
pub use reconstruct::{reconstruct, Issue, Transition};
pub use sample::project_neutral_sample;
pub use scope::{project_scope, ScopeResult, Window};
pub use throughput::{build_throughput_projection, ThroughputBucket};
pub use wip::{build_wip_projection, WipEntry};
