use crate::model::{Classification, ClassificationResult};

pub const SAMPLE_MARKER: &str = "Crash sample: '";
pub const CLASSIFICATION_MARKER: &str = "Exploitability Classification: ";
pub const DESCRIPTION_MARKER: &str = "Short description: ";
pub const HASH_MARKER: &str = "Hash: ";

/// Parsed output of one debugger run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedOutput {
    /// Groups that carried all four markers, in emission order.
    pub results: Vec<ClassificationResult>,
    /// Samples announced by the sample marker but missing at least one other marker.
    pub incomplete: Vec<String>,
}

#[derive(Debug, Default)]
struct Group {
    sample: String,
    classification: Option<String>,
    description: Option<String>,
    hash: Option<String>,
}

impl Group {
    fn finish(self, out: &mut ParsedOutput) {
        match (self.classification, self.description, self.hash) {
            (Some(classification), Some(description), Some(hash)) => {
                out.results.push(ClassificationResult {
                    sample_output_name: self.sample,
                    classification: Classification::from_label(&classification),
                    description,
                    fault_hash: hash,
                    comment: String::new(),
                })
            }
            _ => out.incomplete.push(self.sample),
        }
    }
}

/// Group debugger output by sample marker.
///
/// A group opens at every `Crash sample: '...'` line and collects the classification,
/// short description and hash markers in whatever order they appear; the last value
/// of each marker wins, since target output precedes the verdict. A group missing
/// any of them is reported as incomplete instead of being paired with a neighbour's
/// markers. Lines before the first sample marker are ignored.
pub fn parse_debugger_output(stdout: &str) -> ParsedOutput {
    let mut out = ParsedOutput::default();
    let mut current: Option<Group> = None;

    for line in stdout.lines() {
        if let Some(at) = line.find(SAMPLE_MARKER) {
            let rest = &line[at + SAMPLE_MARKER.len()..];
            let sample = rest.trim_end().strip_suffix('\'').unwrap_or(rest.trim_end());
            if let Some(done) = current.take() {
                done.finish(&mut out);
            }
            current = Some(Group { sample: sample.to_string(), ..Group::default() });
            continue;
        }

        let Some(group) = current.as_mut() else { continue };
        let line = line.trim();
        let line = line.strip_prefix("(gdb) ").unwrap_or(line);
        if let Some(value) = line.strip_prefix(CLASSIFICATION_MARKER) {
            group.classification = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix(DESCRIPTION_MARKER) {
            group.description = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix(HASH_MARKER) {
            group.hash = Some(value.trim().to_string());
        }
    }

    if let Some(done) = current {
        done.finish(&mut out);
    }
    out
}
