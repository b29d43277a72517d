use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::Classification;

/// Tunables for a triage run.
///
/// Loaded from JSON or YAML (chosen by file extension). Every field has a default, so
/// an empty file (or no file at all) is a valid configuration. CLI flags override
/// whatever is loaded here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TriageConfig {
    /// Debugger executable.
    pub gdb_binary: PathBuf,
    /// Exploitability extension sourced at the top of every debugger script.
    pub exploitable_path: Option<PathBuf>,
    /// Script sourced after the extension so the debugger quits when a sample exits cleanly.
    pub exit_handler_path: Option<PathBuf>,
    /// Worker threads for verification and classification shards.
    pub threads: usize,
    /// Per-sample wall-clock limit during verification.
    pub verify_timeout_secs: u64,
    /// Wall-clock limit for one debugger shard. `None` waits forever.
    pub classify_timeout_secs: Option<u64>,
    /// Signals that do not count as a reproduced fault.
    pub uninteresting_signals: Vec<i32>,
    /// Classifications dropped by `--remove-unexploitable`.
    pub uninteresting_classifications: Vec<Classification>,
    /// File names never collected as samples.
    pub exclude_files: Vec<String>,
    /// Marker file identifying a single fuzzer output directory.
    pub stats_file: String,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            gdb_binary: PathBuf::from("gdb"),
            exploitable_path: None,
            exit_handler_path: None,
            threads: default_threads(),
            verify_timeout_secs: 60,
            classify_timeout_secs: None,
            uninteresting_signals: vec![1],
            uninteresting_classifications: Classification::default_uninteresting(),
            exclude_files: vec!["README.txt".to_string()],
            stats_file: "fuzzer_stats".to_string(),
        }
    }
}

fn default_threads() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

impl TriageConfig {
    /// Load a config file, picking the format from its extension (`.yaml`/`.yml` or JSON).
    pub fn load(path: &Path) -> Result<Self> {
        let body = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref(),
            Some("yaml") | Some("yml")
        );
        let config = if is_yaml {
            serde_yaml::from_str(&body)
                .with_context(|| format!("Failed to parse YAML config {}", path.display()))?
        } else {
            serde_json::from_str(&body)
                .with_context(|| format!("Failed to parse JSON config {}", path.display()))?
        };
        Ok(config)
    }

    /// Load `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}
