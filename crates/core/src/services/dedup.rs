//! Collapse verdicts that share a fault hash.

use std::collections::HashSet;

use serde::Serialize;

use crate::model::{Classification, ClassificationResult};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DedupOutcome {
    /// First-seen verdict for every distinct hash, in scan order.
    pub kept: Vec<ClassificationResult>,
    /// Output names of the collapsed samples; feed to `SampleIndex::remove_outputs`.
    pub duplicates: Vec<String>,
}

/// Keep the first verdict per fault hash. Empty hashes never collapse.
pub fn deduplicate(results: Vec<ClassificationResult>) -> DedupOutcome {
    let mut seen = HashSet::new();
    let mut outcome = DedupOutcome::default();
    for result in results {
        if result.fault_hash.is_empty() || seen.insert(result.fault_hash.clone()) {
            outcome.kept.push(result);
        } else {
            outcome.duplicates.push(result.sample_output_name);
        }
    }
    outcome
}

/// Split `results` into (kept, output names of dropped) by classification.
pub fn filter_uninteresting(
    results: Vec<ClassificationResult>,
    uninteresting: &[Classification],
) -> (Vec<ClassificationResult>, Vec<String>) {
    let mut kept = Vec::with_capacity(results.len());
    let mut dropped = Vec::new();
    for result in results {
        if uninteresting.contains(&result.classification) {
            dropped.push(result.sample_output_name);
        } else {
            kept.push(result);
        }
    }
    (kept, dropped)
}
