use std::path::PathBuf;

use thiserror::Error;

use crate::db::DbError;
use crate::discovery::DiscoveryError;

/// Fatal and per-unit errors raised by the triage services.
///
/// Per-sample and per-shard failures are normally recorded in outcome structs and
/// logged; only errors that must stop the run before any destructive filesystem work
/// are returned to the caller.
#[derive(Debug, Error)]
pub enum TriageError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("Target binary not found: {0}")]
    MissingTarget(PathBuf),

    #[error("Debugger not found: {0}")]
    MissingDebugger(PathBuf),

    #[error("Invalid target command: {0}")]
    InvalidCommand(String),

    #[error("Failed to write debugger script {path}: {source}")]
    ScriptIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Persistence error: {0}")]
    Persistence(#[from] DbError),

    #[error("Failed to copy sample to {path}: {source}")]
    Materialize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
