//! Error types for the event-sourcing engine.
//!
//! Every fallible operation in this crate returns one of the enums below
//! rather than a single catch-all error, so callers can match on the failure
//! mode described in the ingestion and persistence contracts: parse errors are
//! swallowed close to the source, cache I/O errors distinguish "not found"
//! from "fatal", and backend errors carry enough shape for a caller to decide
//! whether to retry.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by [`crate::events::store::EventStore`] persistence operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("reading event log {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("writing event log {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("renaming {from} into place as {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serializing event: {0}")]
    Serialize(#[source] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the ingestion orchestrator ([`crate::events::provider::LogProvider`]).
///
/// These map directly onto the recovery table in the ingestion design: a
/// backend error aborts the in-flight multi-page operation without saving,
/// rate limiting is surfaced verbatim so the caller can decide when to retry,
/// and a missing precondition (e.g. `ExpandHistory` with no prior cache) is
/// refused rather than guessed at.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("backend search failed: {message}")]
    Backend { message: String },

    #[error("backend rejected credentials for this session")]
    Forbidden,

    #[error("backend rate limit hit{}", retry_after_secs.map(|s| format!(", retry after {s}s")).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("no cached log for source {source_id}; {operation} requires a prior Hydrate")]
    MissingPrecondition {
        source_id: String,
        operation: &'static str,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

impl From<crate::backend::BackendError> for ProviderError {
    fn from(err: crate::backend::BackendError) -> Self {
        use crate::backend::BackendError;
        match err {
            BackendError::Forbidden => ProviderError::Forbidden,
            BackendError::RateLimited { retry_after_secs } => {
                ProviderError::RateLimited { retry_after_secs }
            }
            BackendError::Transport { message } | BackendError::Server { message } => {
                ProviderError::Backend { message }
            }
        }
    }
}
