//! Core data model for crash samples and their classifications.
//!
//! - `SampleRecord`: one discovered sample and the name it will be materialized under.
//! - `Classification`: the exploitability verdict vocabulary, including the two
//!   verification-only outcomes (`INVALID`, `TIMEOUT`).
//! - `ClassificationResult`: one parsed debugger verdict for one sample.
//! - `SessionRecord`: an explicit session handle persisted through the gateway.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A single sample tracked by a `SampleIndex`.
///
/// `input` is `None` for records reconstructed from files that already live in the
/// output directory (see `SampleIndex::add_output`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub input: Option<PathBuf>,
    pub origin: Option<String>,
    pub output_name: String,
}

/// Exploitability verdict attached to a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    Exploitable,
    ProbablyExploitable,
    ProbablyNotExploitable,
    NotExploitable,
    Unknown,
    Invalid,
    Timeout,
}

impl Classification {
    /// All variants, in severity order.
    pub const ALL: [Classification; 7] = [
        Classification::Exploitable,
        Classification::ProbablyExploitable,
        Classification::ProbablyNotExploitable,
        Classification::NotExploitable,
        Classification::Unknown,
        Classification::Invalid,
        Classification::Timeout,
    ];

    /// Label as printed by the exploitability extension and stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Classification::Exploitable => "EXPLOITABLE",
            Classification::ProbablyExploitable => "PROBABLY_EXPLOITABLE",
            Classification::ProbablyNotExploitable => "PROBABLY_NOT_EXPLOITABLE",
            Classification::NotExploitable => "NOT_EXPLOITABLE",
            Classification::Unknown => "UNKNOWN",
            Classification::Invalid => "INVALID",
            Classification::Timeout => "TIMEOUT",
        }
    }

    /// Lenient conversion used when reading debugger output: anything unrecognized
    /// becomes `Unknown` instead of failing the whole shard.
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or(Classification::Unknown)
    }

    /// Default set of verdicts dropped by `--remove-unexploitable`.
    pub fn default_uninteresting() -> Vec<Classification> {
        vec![
            Classification::NotExploitable,
            Classification::ProbablyNotExploitable,
            Classification::Unknown,
        ]
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a classification label is not part of the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown classification label: {0}")]
pub struct UnknownClassification(pub String);

impl FromStr for Classification {
    type Err = UnknownClassification;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        Classification::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| UnknownClassification(s.to_string()))
    }
}

/// One classified sample. Created once by the pipeline and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub sample_output_name: String,
    pub classification: Classification,
    pub description: String,
    pub fault_hash: String,
    #[serde(default)]
    pub comment: String,
}

/// Explicit session handle; replaces ambient global session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub process_group_id: i64,
}
