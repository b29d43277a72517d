//! Pipeline stages built on top of the index and the persistence gateway.

pub mod classify;
pub mod dedup;
pub mod error;
pub mod materialize;
pub mod process;
pub mod triage;
pub mod verify;

pub use error::TriageError;
