//! Walks fuzzer output trees and turns them into a `SampleIndex`.
//!
//! A sync directory either *is* one fuzzer's output directory (it contains the stats
//! file) or holds one subdirectory per fuzzer instance. Inside an instance, every
//! subdirectory whose name contains the requested kind (`crashes` or `queue`) is
//! scanned for sample files.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::db::{DbError, PersistenceGateway, Table};
use crate::index::{absolutize, NamingOptions, SampleIndex};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Directory does not exist: {0}")]
    MissingDirectory(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to query known samples: {0}")]
    Persistence(#[from] DbError),
}

/// Which sample directories to collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    Crashes,
    Queue,
}

impl SampleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SampleKind::Crashes => "crashes",
            SampleKind::Queue => "queue",
        }
    }
}

/// One fuzzer instance and the matching sample directories inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuzzerInstance {
    /// Instance name, used as the sample origin.
    pub name: String,
    /// Absolute path of the instance directory.
    pub path: PathBuf,
    /// Names of matching subdirectories, sorted.
    pub dirs: Vec<String>,
}

/// Options controlling how discovered files become index records.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub kind: SampleKind,
    pub naming: NamingOptions,
    /// File names that are never samples (`README.txt`).
    pub exclude: Vec<String>,
    /// Marker file of a single fuzzer output directory (`fuzzer_stats`).
    pub stats_file: String,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            kind: SampleKind::Crashes,
            naming: NamingOptions::default(),
            exclude: vec!["README.txt".to_string()],
            stats_file: "fuzzer_stats".to_string(),
        }
    }
}

/// List fuzzer instances below `root`, sorted by name.
pub fn get_fuzzer_instances(
    root: &Path,
    kind: SampleKind,
    stats_file: &str,
) -> Result<Vec<FuzzerInstance>, DiscoveryError> {
    if !root.is_dir() {
        return Err(DiscoveryError::MissingDirectory(root.to_path_buf()));
    }
    let root = absolutize(root);

    if root.join(stats_file).exists() {
        let dirs = matching_subdirs(&root, kind)?;
        return Ok(vec![FuzzerInstance {
            name: root.to_string_lossy().into_owned(),
            path: root,
            dirs,
        }]);
    }

    let mut instances = Vec::new();
    for entry in read_dir_sorted(&root)? {
        if !entry.is_dir() {
            continue;
        }
        let name = match entry.file_name() {
            Some(n) => n.to_string_lossy().into_owned(),
            None => continue,
        };
        let dirs = matching_subdirs(&entry, kind)?;
        instances.push(FuzzerInstance { name, path: entry, dirs });
    }
    Ok(instances)
}

/// Regular files directly inside `dir`, sorted, minus excluded names.
pub fn samples_from_dir(dir: &Path, exclude: &[String]) -> Result<Vec<PathBuf>, DiscoveryError> {
    let mut out = Vec::new();
    for path in read_dir_sorted(dir)? {
        if !path.is_file() {
            continue;
        }
        let excluded = path
            .file_name()
            .map(|n| exclude.iter().any(|e| n.to_string_lossy() == e.as_str()))
            .unwrap_or(false);
        if !excluded {
            out.push(path);
        }
    }
    Ok(out)
}

/// Build an index over every sample of every instance.
///
/// When a gateway is given, samples whose output name is already persisted are skipped.
pub fn build_sample_index(
    output_dir: &Path,
    instances: &[FuzzerInstance],
    options: &DiscoveryOptions,
    gateway: Option<&dyn PersistenceGateway>,
) -> Result<SampleIndex, DiscoveryError> {
    let mut index = SampleIndex::with_naming(output_dir, options.naming);
    let mut skipped = 0usize;

    for instance in instances {
        for dir in &instance.dirs {
            let dir_path = instance.path.join(dir);
            for sample in samples_from_dir(&dir_path, &options.exclude)? {
                if let Some(store) = gateway {
                    let name = index.output_name(&instance.name, &sample);
                    if store.exists(Table::Classifications, &name)? {
                        skipped += 1;
                        continue;
                    }
                }
                index.add(&instance.name, &sample);
            }
        }
    }

    debug!(samples = index.size(), skipped = skipped, "built sample index");
    Ok(index)
}

/// Convenience wrapper: find instances below `root` and index their samples.
pub fn discover(
    root: &Path,
    output_dir: &Path,
    options: &DiscoveryOptions,
    gateway: Option<&dyn PersistenceGateway>,
) -> Result<(Vec<FuzzerInstance>, SampleIndex), DiscoveryError> {
    let instances = get_fuzzer_instances(root, options.kind, &options.stats_file)?;
    let index = build_sample_index(output_dir, &instances, options, gateway)?;
    Ok((instances, index))
}

/// Index the files already materialized in a collection directory.
pub fn index_collection(dir: &Path, exclude: &[String]) -> Result<SampleIndex, DiscoveryError> {
    if !dir.is_dir() {
        return Err(DiscoveryError::MissingDirectory(dir.to_path_buf()));
    }
    let mut index = SampleIndex::new(dir);
    for sample in samples_from_dir(dir, exclude)? {
        index.add_output(&sample);
    }
    Ok(index)
}

fn matching_subdirs(instance: &Path, kind: SampleKind) -> Result<Vec<String>, DiscoveryError> {
    let mut dirs = Vec::new();
    for path in read_dir_sorted(instance)? {
        if !path.is_dir() {
            continue;
        }
        if let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) {
            if name.contains(kind.as_str()) {
                dirs.push(name);
            }
        }
    }
    Ok(dirs)
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    let unreadable = |source| DiscoveryError::Unreadable { path: dir.to_path_buf(), source };
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(unreadable)? {
        entries.push(entry.map_err(unreadable)?.path());
    }
    entries.sort();
    Ok(entries)
}
