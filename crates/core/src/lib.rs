//! triage-core
//!
//! Core library for triaging the output of parallel fuzzing campaigns.
//!
//! This crate holds the sample index, fuzzer directory discovery, the verification
//! worker pool, the sharded debugger classification pipeline, fault-hash
//! deduplication, and the SQLite persistence gateway.
//!
//! All substantive logic lives here so it is fully testable and reusable from
//! multiple frontends; the `crash-triage` CLI is a thin wrapper.

pub mod db;
pub mod discovery;
pub mod index;
pub mod model;
pub mod services;

/// Returns the library version as encoded at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
