//! Process execution primitives.
//!
//! Everything hy2build does to the outside world goes through the
//! [`ToolRunner`] trait: probing `PATH` for a tool and running a blocking
//! external command. [`SystemRunner`] is the real implementation; tests supply
//! scripted runners.
//!
//! An [`Invocation`] always carries the complete environment for the child
//! process. The child is started with a cleared environment and exactly those
//! variables, so nothing from the parent process leaks in implicitly.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::env::Environment;
use crate::types::BuildError;

/// A fully specified external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Environment,
    pub cwd: PathBuf,
}

impl Invocation {
    /// Creates an invocation of `program` running in `cwd` with `env`.
    pub fn new(program: impl Into<String>, env: Environment, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env,
            cwd: cwd.into(),
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Renders the command line for logs and error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, or `None` if the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Access to external tools.
///
/// Implementations must be shareable across threads; the matrix runner may
/// call [`ToolRunner::exec`] from several workers at once.
pub trait ToolRunner: Send + Sync {
    /// Returns `true` if `tool` can be found on `PATH`.
    fn probe(&self, tool: &str) -> bool;

    /// Runs `invocation` to completion and captures its output.
    ///
    /// A non-zero exit is *not* an error here; it is reported through
    /// [`ProcessOutput::exit_code`]. `Err` means the process could not be run
    /// at all.
    fn exec(&self, invocation: &Invocation) -> Result<ProcessOutput, BuildError>;
}

/// [`ToolRunner`] backed by the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl ToolRunner for SystemRunner {
    fn probe(&self, tool: &str) -> bool {
        find_executable(tool).is_some()
    }

    fn exec(&self, invocation: &Invocation) -> Result<ProcessOutput, BuildError> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .env_clear()
            .envs(invocation.env.iter())
            .current_dir(&invocation.cwd);

        let output = cmd.output().map_err(|e| {
            BuildError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to start `{}` in {}: {}. \
                     Ensure the tool is installed and available on PATH",
                    invocation.display_command(),
                    invocation.cwd.display(),
                    e
                ),
            ))
        })?;

        Ok(ProcessOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Finds an executable on `PATH`, or checks an explicit path.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    which::which(name).ok()
}
