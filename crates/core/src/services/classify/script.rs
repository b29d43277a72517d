use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::index::SampleIndex;
use crate::services::classify::parse::SAMPLE_MARKER;
use crate::services::process::TargetCommand;
use crate::services::TriageError;

/// Extensions sourced in the script header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptOptions {
    /// Exploitability extension providing the `exploitable` command.
    pub exploitable: Option<PathBuf>,
    /// Handler that quits the debugger when the inferior exits normally.
    pub exit_handler: Option<PathBuf>,
}

/// Render the debugger script classifying every sample of `index`.
///
/// Layout: optional `source` lines, `file <target>`, then one
/// `echo` / `run` / `exploitable` triple per sample, and a final `quit`.
pub fn render_script(
    index: &SampleIndex,
    target_program: &Path,
    target: &TargetCommand,
    opts: &ScriptOptions,
) -> String {
    let mut script = String::new();
    if let Some(ext) = &opts.exploitable {
        let _ = writeln!(script, "source {}", ext.display());
    }
    if let Some(handler) = &opts.exit_handler {
        let _ = writeln!(script, "source {}", handler.display());
    }
    let _ = writeln!(script, "file {}", target_program.display());

    for record in index.records() {
        let sample = index.source_path(record);
        let _ = writeln!(script, "echo {SAMPLE_MARKER}{}'\\n", record.output_name);
        let _ = writeln!(script, "{}", target.gdb_run_line(&sample));
        script.push_str("exploitable\n");
    }

    script.push_str("quit\n");
    script
}

/// Render and write a script to `path`.
pub fn write_script(
    path: &Path,
    index: &SampleIndex,
    target_program: &Path,
    target: &TargetCommand,
    opts: &ScriptOptions,
) -> Result<(), TriageError> {
    let body = render_script(index, target_program, target, opts);
    fs::write(path, body)
        .map_err(|source| TriageError::ScriptIo { path: path.to_path_buf(), source })
}
