//! Persistence and on-disk layout.
//!
//! - `PersistenceGateway`: the `exists`/`insert` surface the pipeline depends on.
//! - `TriageDb`: SQLite implementation with versioned migrations.
//! - `TriageConfig`: serializable run configuration (JSON or YAML).
//! - `CollectionLayout`: computed paths inside a collection directory.

pub mod config;
pub mod layout;
pub mod models;
pub mod triage_db;
pub mod util;

pub use config::*;
pub use layout::*;
pub use models::*;
pub use triage_db::*;
pub use util::*;
