//! End-to-end orchestration: discovery, verification, classification, dedup and
//! materialization.

use std::fs;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

use crate::db::{CollectionLayout, PersistenceGateway, Record};
use crate::discovery::{discover, index_collection, DiscoveryOptions};
use crate::index::SampleIndex;
use crate::model::{Classification, ClassificationResult, SessionRecord};
use crate::services::classify::{classify_index, generate_script, ClassifyOptions, ScriptOptions};
use crate::services::dedup::{deduplicate, filter_uninteresting};
use crate::services::materialize::{copy_samples, write_manifest};
use crate::services::process::{find_executable, TargetCommand};
use crate::services::verify::{verify_samples, VerifyOptions};
use crate::services::TriageError;

/// Everything a `collect` run needs.
#[derive(Debug, Clone)]
pub struct CollectRequest {
    pub sync_dir: PathBuf,
    pub collection_dir: PathBuf,
    /// Required when verifying, classifying or generating a script.
    pub target: Option<TargetCommand>,
    pub discovery: DiscoveryOptions,
    /// Replay samples and drop the ones that do not crash.
    pub verify: Option<VerifyOptions>,
    /// Run the sharded debugger classification.
    pub classify: Option<ClassifyOptions>,
    /// Drop verdicts in this set after classification.
    pub remove_uninteresting: Option<Vec<Classification>>,
    /// Write one unsharded debugger script with this file name without running it.
    pub generate_script: Option<(String, ScriptOptions)>,
    /// Write a manifest with this file name into the collection.
    pub manifest: Option<String>,
}

impl CollectRequest {
    pub fn new(sync_dir: impl Into<PathBuf>, collection_dir: impl Into<PathBuf>) -> Self {
        Self {
            sync_dir: sync_dir.into(),
            collection_dir: collection_dir.into(),
            target: None,
            discovery: DiscoveryOptions::default(),
            verify: None,
            classify: None,
            remove_uninteresting: None,
            generate_script: None,
            manifest: None,
        }
    }
}

/// Counts and artifacts of a `collect` run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TriageSummary {
    pub session_id: Option<String>,
    pub fuzzers: usize,
    pub discovered: usize,
    pub invalid: usize,
    pub timed_out: usize,
    pub verify_errors: usize,
    pub classified: usize,
    pub duplicates: usize,
    pub uninteresting: usize,
    pub unclassified: Vec<String>,
    pub failed_shards: usize,
    pub copied: usize,
    pub script: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
    pub results: Vec<ClassificationResult>,
}

/// Result of verifying an existing collection directory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectionCheck {
    pub checked: usize,
    pub valid: usize,
    pub invalid: Vec<PathBuf>,
    pub timeout: Vec<PathBuf>,
    pub errors: Vec<PathBuf>,
    pub removed: usize,
    pub list: Option<PathBuf>,
}

/// Coordinator tying the pipeline stages to an optional persistence gateway.
pub struct TriageRunner<'a> {
    pub gateway: Option<&'a dyn PersistenceGateway>,
}

impl<'a> TriageRunner<'a> {
    pub fn new(gateway: Option<&'a dyn PersistenceGateway>) -> Self {
        Self { gateway }
    }

    /// Run the collection pipeline.
    ///
    /// Missing directories, target or debugger are reported before anything is
    /// copied or written. With a gateway attached, every verified or classified
    /// sample is recorded so later runs only process new samples.
    pub fn collect(&self, request: &CollectRequest) -> Result<TriageSummary, TriageError> {
        let needs_target = request.verify.is_some()
            || request.classify.is_some()
            || request.generate_script.is_some();
        let target = match (&request.target, needs_target) {
            (Some(t), _) => {
                if needs_target {
                    t.resolve()?;
                }
                Some(t)
            }
            (None, true) => {
                return Err(TriageError::InvalidCommand(
                    "a target command is required to verify or classify samples".to_string(),
                ))
            }
            (None, false) => None,
        };
        if let Some(classify) = &request.classify {
            if find_executable(&classify.gdb).is_none() {
                return Err(TriageError::MissingDebugger(classify.gdb.clone()));
            }
        }

        let layout = CollectionLayout::new(&request.collection_dir);
        let (instances, mut index) =
            discover(&request.sync_dir, &request.collection_dir, &request.discovery, self.gateway)?;
        let mut summary = TriageSummary { session_id: self.open_session()?, ..Default::default() };
        summary.fuzzers = instances.len();
        summary.discovered = index.size();
        info!(fuzzers = summary.fuzzers, samples = summary.discovered, "collected samples");

        if let (Some(opts), Some(target)) = (&request.verify, target) {
            let outcome = verify_samples(target, &index.inputs(), opts);
            if let Some(store) = self.gateway {
                persist_rejected(store, &index, &outcome.invalid, Classification::Invalid)?;
                persist_rejected(store, &index, &outcome.timeout, Classification::Timeout)?;
            }
            index.remove_inputs(&outcome.rejected());
            summary.invalid = outcome.invalid.len();
            summary.timed_out = outcome.timeout.len();
            summary.verify_errors = outcome.errors.len();
            info!(
                valid = outcome.valid,
                invalid = summary.invalid,
                timed_out = summary.timed_out,
                errors = summary.verify_errors,
                "verified samples"
            );
        }

        if let (Some(opts), Some(target)) = (&request.classify, target) {
            fs::create_dir_all(&layout.root).map_err(|source| TriageError::ScriptIo {
                path: layout.root.clone(),
                source,
            })?;
            let outcome = classify_index(&index, target, &layout, opts)?;
            summary.failed_shards = outcome.failed_shards.len();
            summary.classified = outcome.results.len();
            if let Some(truncation) = outcome.truncation {
                summary.unclassified = truncation.missing;
            }

            if let Some(store) = self.gateway {
                for result in &outcome.results {
                    store.insert(&Record::Classification(result.clone()))?;
                }
            }

            let dedup = deduplicate(outcome.results);
            index.remove_outputs(&dedup.duplicates);
            summary.duplicates = dedup.duplicates.len();

            let mut kept = dedup.kept;
            if let Some(uninteresting) = &request.remove_uninteresting {
                let (interesting, dropped) = filter_uninteresting(kept, uninteresting);
                index.remove_outputs(&dropped);
                summary.uninteresting = dropped.len();
                kept = interesting;
            }
            summary.results = kept;
        }

        let copied = copy_samples(&index)?;
        summary.copied = copied.len();

        if let (Some((name, opts)), Some(target)) = (&request.generate_script, target) {
            let path = layout.single_script_path(name);
            summary.script = Some(generate_script(&index, target, &path, opts)?);
        }

        if let Some(name) = &request.manifest {
            let path = layout.manifest_path(name);
            write_manifest(&path, &copied)?;
            summary.manifest = Some(path);
        }

        Ok(summary)
    }

    /// Replay every sample already in `collection_dir`; optionally delete the ones that
    /// do not crash and list them in `list_file`.
    pub fn verify_collection(
        &self,
        collection_dir: &std::path::Path,
        target: &TargetCommand,
        opts: &VerifyOptions,
        exclude: &[String],
        remove: bool,
        list_file: Option<&std::path::Path>,
    ) -> Result<CollectionCheck, TriageError> {
        target.resolve()?;
        let index = index_collection(collection_dir, exclude)?;
        let samples: Vec<PathBuf> = index.records().iter().map(|r| index.source_path(r)).collect();
        let outcome = verify_samples(target, &samples, opts);

        let mut check = CollectionCheck {
            checked: samples.len(),
            valid: outcome.valid,
            ..Default::default()
        };

        if remove {
            for sample in outcome.rejected() {
                match fs::remove_file(&sample) {
                    Ok(()) => check.removed += 1,
                    Err(err) => warn!(sample = %sample.display(), error = %err, "failed to remove sample"),
                }
            }
        }

        if let Some(list) = list_file {
            write_manifest(list, &outcome.rejected())?;
            check.list = Some(list.to_path_buf());
        }

        check.invalid = outcome.invalid;
        check.timeout = outcome.timeout;
        check.errors = outcome.errors;
        Ok(check)
    }

    /// Record this run as a session when a gateway is attached.
    fn open_session(&self) -> Result<Option<String>, TriageError> {
        let Some(store) = self.gateway else { return Ok(None) };
        // SAFETY: getpgrp(2) takes no arguments and cannot fail.
        let process_group_id = i64::from(unsafe { libc::getpgrp() });
        let session = SessionRecord {
            session_id: format!(
                "{}-{}",
                chrono::Utc::now().format("%Y%m%dT%H%M%S%.6fZ"),
                std::process::id()
            ),
            process_group_id,
        };
        store.insert(&Record::Session(session.clone()))?;
        Ok(Some(session.session_id))
    }
}

/// Record verification rejects so later runs skip them during discovery.
fn persist_rejected(
    store: &dyn PersistenceGateway,
    index: &SampleIndex,
    samples: &[PathBuf],
    classification: Classification,
) -> Result<(), TriageError> {
    for sample in samples {
        for name in index.outputs_matching(None, Some(sample.as_path())).unwrap_or_default() {
            store.insert(&Record::Classification(ClassificationResult {
                sample_output_name: name,
                classification,
                description: String::new(),
                fault_hash: String::new(),
                comment: String::new(),
            }))?;
        }
    }
    Ok(())
}
