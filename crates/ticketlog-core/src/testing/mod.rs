//! Test-only fixtures shared across this crate's unit and integration
//! tests. Gated behind `cfg(test)` or the `testing` feature so consumers
//! that want to exercise [`crate::backend::MockBackendClient`] or seed a
//! sentinel cache from their own integration tests can opt in without
//! pulling `mockall`/`tempfile` into a release build.

pub mod fixtures;
