//! In-memory registry of discovered samples.
//!
//! A `SampleIndex` keeps records in insertion order and guarantees that output names
//! are unique: adding a sample whose derived name already exists is a no-op. The
//! orchestrating thread is the only writer; worker pools receive snapshots
//! (`divide`, `inputs`) and hand back results to be applied after they join.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use crate::model::SampleRecord;

/// How output names are derived from `(origin, input)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NamingOptions {
    /// Shorten `id:000001,sig:11,...` style names to the bare sample id.
    pub min_filename: bool,
    /// Drop the `<origin>:` prefix.
    pub omit_origin: bool,
}

/// Ordered, name-unique collection of `SampleRecord`s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleIndex {
    output_dir: PathBuf,
    naming: NamingOptions,
    records: Vec<SampleRecord>,
}

impl SampleIndex {
    /// Create an empty index whose samples will be materialized below `output_dir`.
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self::with_naming(output_dir, NamingOptions::default())
    }

    pub fn with_naming(output_dir: impl AsRef<Path>, naming: NamingOptions) -> Self {
        Self { output_dir: absolutize(output_dir.as_ref()), naming, records: Vec::new() }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn naming(&self) -> NamingOptions {
        self.naming
    }

    pub fn records(&self) -> &[SampleRecord] {
        &self.records
    }

    /// Derive the output name for a sample found in `input` by fuzzer `origin`.
    ///
    /// `origin` may be a path; only its last component is used.
    pub fn output_name(&self, origin: &str, input: &Path) -> String {
        let origin = Path::new(origin)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| origin.to_string());
        let base = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| input.to_string_lossy().into_owned());
        let base = if self.naming.min_filename { minimal_filename(&base) } else { base };

        if self.naming.omit_origin {
            base
        } else {
            format!("{origin}:{base}")
        }
    }

    /// Register a sample. No-op when its derived output name is already present.
    pub fn add(&mut self, origin: &str, input: impl AsRef<Path>) -> &[SampleRecord] {
        let input = input.as_ref();
        let output_name = self.output_name(origin, input);
        if !self.contains_output(&output_name) {
            self.records.push(SampleRecord {
                input: Some(absolutize(&expand_home(input))),
                origin: Some(origin.to_string()),
                output_name,
            });
        }
        &self.records
    }

    /// Register an already materialized file. Its absolute path becomes the output name.
    pub fn add_output(&mut self, output: impl AsRef<Path>) -> &[SampleRecord] {
        let output_name = absolutize(&expand_home(output.as_ref())).to_string_lossy().into_owned();
        if !self.contains_output(&output_name) {
            self.records.push(SampleRecord { input: None, origin: None, output_name });
        }
        &self.records
    }

    pub fn remove_inputs<P: AsRef<Path>>(&mut self, inputs: &[P]) -> &[SampleRecord] {
        let drop: HashSet<&Path> = inputs.iter().map(|p| p.as_ref()).collect();
        self.records.retain(|r| r.input.as_deref().map_or(true, |i| !drop.contains(i)));
        &self.records
    }

    pub fn remove_fuzzers<S: AsRef<str>>(&mut self, origins: &[S]) -> &[SampleRecord] {
        let drop: HashSet<&str> = origins.iter().map(|s| s.as_ref()).collect();
        self.records.retain(|r| r.origin.as_deref().map_or(true, |o| !drop.contains(o)));
        &self.records
    }

    pub fn remove_outputs<S: AsRef<str>>(&mut self, names: &[S]) -> &[SampleRecord] {
        let drop: HashSet<&str> = names.iter().map(|s| s.as_ref()).collect();
        self.records.retain(|r| !drop.contains(r.output_name.as_str()));
        &self.records
    }

    /// Round-robin split into `k` sub-indexes (at least one). Part sizes differ by at most one.
    pub fn divide(&self, k: usize) -> Vec<SampleIndex> {
        let k = k.max(1);
        let mut parts: Vec<SampleIndex> = (0..k)
            .map(|_| SampleIndex {
                output_dir: self.output_dir.clone(),
                naming: self.naming,
                records: Vec::with_capacity(self.records.len() / k + 1),
            })
            .collect();
        for (i, record) in self.records.iter().enumerate() {
            parts[i % k].records.push(record.clone());
        }
        parts
    }

    /// Input paths of every record that has one.
    pub fn inputs(&self) -> Vec<PathBuf> {
        self.records.iter().filter_map(|r| r.input.clone()).collect()
    }

    /// All output names, in index order.
    pub fn outputs(&self) -> Vec<String> {
        self.records.iter().map(|r| r.output_name.clone()).collect()
    }

    /// Output names filtered by origin and/or input path.
    ///
    /// Without filters this is `Some(outputs())`. With any filter set, `None` means no
    /// record matched.
    pub fn outputs_matching(&self, origin: Option<&str>, input: Option<&Path>) -> Option<Vec<String>> {
        if origin.is_none() && input.is_none() {
            return Some(self.outputs());
        }
        let matched: Vec<String> = self
            .records
            .iter()
            .filter(|r| origin.map_or(true, |o| r.origin.as_deref() == Some(o)))
            .filter(|r| input.map_or(true, |i| r.input.as_deref() == Some(i)))
            .map(|r| r.output_name.clone())
            .collect();
        if matched.is_empty() {
            None
        } else {
            Some(matched)
        }
    }

    /// Origin of every record that has one, one entry per record.
    pub fn fuzzers(&self) -> Vec<String> {
        self.records.iter().filter_map(|r| r.origin.clone()).collect()
    }

    pub fn size(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains_output(&self, name: &str) -> bool {
        self.records.iter().any(|r| r.output_name == name)
    }

    /// Position of the record with the given output name.
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.records.iter().position(|r| r.output_name == name)
    }

    /// Where this record's bytes can be read right now: the original input, or the
    /// materialized copy for records added through `add_output`.
    pub fn source_path(&self, record: &SampleRecord) -> PathBuf {
        match &record.input {
            Some(input) => input.clone(),
            None => self.destination_path(record),
        }
    }

    /// Where this record is materialized.
    pub fn destination_path(&self, record: &SampleRecord) -> PathBuf {
        self.output_dir.join(&record.output_name)
    }
}

/// Recover the fuzzer's short sample id from names like `id:000001,sig:11,src:0`.
///
/// Falls back to the raw name when the delimiters are missing.
pub fn minimal_filename(name: &str) -> String {
    match name.split_once(':') {
        Some((_, rest)) => match rest.split(',').next() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => name.to_string(),
        },
        None => name.to_string(),
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => match dirs::home_dir() {
            Some(home) => home.join(components.as_path()),
            None => path.to_path_buf(),
        },
        _ => path.to_path_buf(),
    }
}

/// Make `path` absolute without touching the filesystem; leaves it unchanged if the
/// working directory cannot be determined.
pub fn absolutize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
