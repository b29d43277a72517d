//! Target command templates and timed child-process execution.

use std::fs::File;
use std::io::{self, Read};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::services::TriageError;

/// Placeholder replaced by the sample path in a target command template.
pub const SAMPLE_PLACEHOLDER: &str = "@@";

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A target invocation such as `./app -f @@`.
///
/// Without a placeholder the sample is fed on standard input ("stdin mode").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl TargetCommand {
    /// Parse a whitespace separated template.
    pub fn parse(template: &str) -> Result<Self, TriageError> {
        Self::from_args(template.split_whitespace().map(str::to_string))
    }

    /// Build from an already split argv (e.g. everything after `--` on the command line).
    pub fn from_args<I, S>(argv: I) -> Result<Self, TriageError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut argv = argv.into_iter().map(Into::into);
        let program = match argv.next() {
            Some(p) if !p.trim().is_empty() => PathBuf::from(p),
            _ => return Err(TriageError::InvalidCommand("empty target command".to_string())),
        };
        Ok(Self { program, args: argv.collect() })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn stdin_mode(&self) -> bool {
        !self.args.iter().any(|a| a.contains(SAMPLE_PLACEHOLDER))
    }

    /// Check that the target program can be executed; returns its resolved path.
    pub fn resolve(&self) -> Result<PathBuf, TriageError> {
        find_executable(&self.program).ok_or_else(|| TriageError::MissingTarget(self.program.clone()))
    }

    /// Arguments with the placeholder replaced by `sample`.
    pub fn args_for(&self, sample: &Path) -> Vec<String> {
        let sample = sample.to_string_lossy();
        self.args.iter().map(|a| a.replace(SAMPLE_PLACEHOLDER, &sample)).collect()
    }

    /// A ready-to-spawn command replaying `sample`. Output streams are discarded.
    pub fn command_for(&self, sample: &Path) -> io::Result<Command> {
        let mut cmd = Command::new(&self.program);
        cmd.stdout(Stdio::null()).stderr(Stdio::null());
        if self.stdin_mode() {
            cmd.args(&self.args).stdin(Stdio::from(File::open(sample)?));
        } else {
            cmd.args(self.args_for(sample)).stdin(Stdio::null());
        }
        Ok(cmd)
    }

    /// The debugger `run` line replaying `sample`. The sample path is single-quoted.
    pub fn gdb_run_line(&self, sample: &Path) -> String {
        if self.stdin_mode() {
            let redirect = format!("< '{}'", sample.display());
            if self.args.is_empty() {
                format!("run {redirect}")
            } else {
                format!("run {} {redirect}", self.args.join(" "))
            }
        } else {
            let quoted = format!("'{}'", sample.display());
            let args: Vec<String> =
                self.args.iter().map(|a| a.replace(SAMPLE_PLACEHOLDER, &quoted)).collect();
            format!("run {}", args.join(" "))
        }
    }
}

/// Result of `run_with_timeout`.
#[derive(Debug)]
pub struct RunOutput {
    pub status: ExitStatus,
    pub timed_out: bool,
    /// Captured standard output (empty unless capture was requested).
    pub stdout: String,
}

/// Spawn `cmd` in its own process group and wait for it, hard-killing the whole
/// group once `timeout` elapses.
pub fn run_with_timeout(
    cmd: &mut Command,
    timeout: Option<Duration>,
    capture_stdout: bool,
) -> io::Result<RunOutput> {
    cmd.process_group(0);
    if capture_stdout {
        cmd.stdout(Stdio::piped());
    }
    let mut child = cmd.spawn()?;

    let reader = child.stdout.take().map(|mut out| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = out.read_to_end(&mut buf);
            buf
        })
    });

    let started = Instant::now();
    let (status, timed_out) = loop {
        if let Some(status) = child.try_wait()? {
            break (status, false);
        }
        if timeout.is_some_and(|limit| started.elapsed() >= limit) {
            kill_process_group(&mut child);
            break (child.wait()?, true);
        }
        thread::sleep(POLL_INTERVAL);
    };

    let stdout = match reader {
        Some(handle) => String::from_utf8_lossy(&handle.join().unwrap_or_default()).into_owned(),
        None => String::new(),
    };
    Ok(RunOutput { status, timed_out, stdout })
}

fn kill_process_group(child: &mut Child) {
    let pgid = child.id() as libc::pid_t;
    // SAFETY: kill(2) with a negative pid only sends a signal; the group was created
    // for this child by `process_group(0)`.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        let _ = child.kill();
    }
}

/// Locate an executable: paths containing a separator are checked directly, bare
/// names are searched on `PATH`.
pub fn find_executable(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        return program.is_file().then(|| program.to_path_buf());
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// Signal that terminated a process, if any.
pub fn terminating_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}
