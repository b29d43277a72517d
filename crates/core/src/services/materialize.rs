//! Copy surviving samples into the collection directory and write manifests.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::index::SampleIndex;
use crate::services::TriageError;

/// Copy every record's input to `<output_dir>/<output_name>`, overwriting.
///
/// Records without an input already live in the output directory and are returned
/// as-is. Returns the destination paths in index order.
pub fn copy_samples(index: &SampleIndex) -> Result<Vec<PathBuf>, TriageError> {
    fs::create_dir_all(index.output_dir()).map_err(|source| TriageError::Materialize {
        path: index.output_dir().to_path_buf(),
        source,
    })?;

    let mut copied = Vec::with_capacity(index.size());
    for record in index.records() {
        let dest = index.destination_path(record);
        if let Some(input) = &record.input {
            fs::copy(input, &dest)
                .map_err(|source| TriageError::Materialize { path: dest.clone(), source })?;
            debug!(from = %input.display(), to = %dest.display(), "copied sample");
        }
        copied.push(dest);
    }
    Ok(copied)
}

/// Write one path per line (UTF-8, newline terminated).
pub fn write_manifest(path: &Path, files: &[PathBuf]) -> Result<(), TriageError> {
    let io_err = |source| TriageError::Materialize { path: path.to_path_buf(), source };
    let mut out = fs::File::create(path).map_err(io_err)?;
    for file in files {
        writeln!(out, "{}", file.display()).map_err(io_err)?;
    }
    out.flush().map_err(io_err)
}
