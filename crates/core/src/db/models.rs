use serde::{Deserialize, Serialize};

use crate::model::{ClassificationResult, SessionRecord};

/// Tables known to the persistence gateway.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    /// One row per classified sample, keyed by output name.
    Classifications,
    /// One row per triage session, keyed by session id.
    Sessions,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Table::Classifications => "classifications",
            Table::Sessions => "sessions",
        }
    }
}

/// A keyed row handed to `PersistenceGateway::insert`.
///
/// The pipeline only ever deals with domain types; conversion to columns happens
/// inside the gateway implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Classification(ClassificationResult),
    Session(SessionRecord),
}

impl Record {
    pub fn table(&self) -> Table {
        match self {
            Record::Classification(_) => Table::Classifications,
            Record::Session(_) => Table::Sessions,
        }
    }

    /// Identity used for idempotent inserts.
    pub fn key(&self) -> &str {
        match self {
            Record::Classification(c) => &c.sample_output_name,
            Record::Session(s) => &s.session_id,
        }
    }
}

/// A persisted classification row as read back from the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassificationRow {
    pub sample: String,
    pub classification: String,
    pub description: String,
    pub hash: String,
    pub user_comment: String,
    pub recorded_at: String,
}
