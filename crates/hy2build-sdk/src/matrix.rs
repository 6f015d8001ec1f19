//! Build matrix execution.
//!
//! [`MatrixRunner::run`] executes one build step per [`TargetDescriptor`] and
//! returns one [`BuildResult`] per executed descriptor, always in declaration
//! order. A build step never fails; it records failures in its result.
//!
//! Two knobs control execution:
//!
//! - **Policy** - [`FailurePolicy::FailFast`] stops after the first failing
//!   target (the failing result is the last one returned).
//!   [`FailurePolicy::FailSoft`] runs every target.
//! - **Jobs** - `1` runs targets one after another on the calling thread.
//!   More than one runs them on a dedicated rayon pool. Results are still
//!   returned in declaration order. Under fail-fast, targets that have not
//!   started when a failure is seen are skipped and produce no result.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::process::ProcessOutput;
use crate::targets::TargetDescriptor;
use crate::types::{BuildError, FailurePolicy};

/// Outcome of building one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult<'a> {
    pub descriptor: &'a TargetDescriptor,
    pub succeeded: bool,
    pub stdout: String,
    pub stderr: String,
    /// `None` if the process never ran or was killed by a signal.
    pub exit_code: Option<i32>,
}

impl<'a> BuildResult<'a> {
    /// Result for a finished process; success follows the exit code.
    pub fn from_output(descriptor: &'a TargetDescriptor, output: ProcessOutput) -> Self {
        Self {
            descriptor,
            succeeded: output.success(),
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.exit_code,
        }
    }

    /// Result for a target whose build could not be started or verified.
    pub fn failed(descriptor: &'a TargetDescriptor, message: impl Into<String>) -> Self {
        Self {
            descriptor,
            succeeded: false,
            stdout: String::new(),
            stderr: message.into(),
            exit_code: None,
        }
    }

    /// Converts a failed result into the error that surfaces its stderr.
    pub fn to_error(&self) -> BuildError {
        BuildError::BuildToolFailure {
            target: self.descriptor.label(),
            exit_code: self.exit_code,
            stderr: self.stderr.clone(),
        }
    }
}

/// Aggregate view of a run, see [`summarize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary<'a> {
    pub all_succeeded: bool,
    /// Failing descriptors in declaration order.
    pub failed: Vec<&'a TargetDescriptor>,
}

/// Summarizes results: success iff every result succeeded.
pub fn summarize<'a>(results: &[BuildResult<'a>]) -> Summary<'a> {
    let failed: Vec<_> = results
        .iter()
        .filter(|r| !r.succeeded)
        .map(|r| r.descriptor)
        .collect();
    Summary {
        all_succeeded: failed.is_empty(),
        failed,
    }
}

/// Runs build steps over a matrix.
///
/// # Example
///
/// ```
/// use hy2build_sdk::targets::plan;
/// use hy2build_sdk::{BuildResult, BuildSettings, MatrixRunner, Platform, TargetDescriptor, summarize};
///
/// let descriptors: Vec<TargetDescriptor> = plan(Platform::Linux, &BuildSettings::default())
///     .iter()
///     .map(|p| TargetDescriptor::new(p.os, p.arch, p.kind.clone(), p.env.clone(), &p.output))
///     .collect();
///
/// let results = MatrixRunner::new()
///     .run(&descriptors, |d| BuildResult {
///         descriptor: d,
///         succeeded: true,
///         stdout: String::new(),
///         stderr: String::new(),
///         exit_code: Some(0),
///     })
///     .unwrap();
/// assert!(summarize(&results).all_succeeded);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct MatrixRunner {
    policy: FailurePolicy,
    jobs: usize,
}

impl Default for MatrixRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MatrixRunner {
    /// Sequential, fail-fast runner.
    pub fn new() -> Self {
        Self {
            policy: FailurePolicy::FailFast,
            jobs: 1,
        }
    }

    pub fn policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Number of targets built concurrently. `0` is treated as `1`.
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Executes `step` for each descriptor.
    ///
    /// Returns [`BuildError::InvalidArgument`] for an empty matrix and
    /// [`BuildError::Config`] if the worker pool cannot be created; build
    /// failures are never errors here.
    pub fn run<'a, F>(
        &self,
        descriptors: &'a [TargetDescriptor],
        step: F,
    ) -> Result<Vec<BuildResult<'a>>, BuildError>
    where
        F: Fn(&'a TargetDescriptor) -> BuildResult<'a> + Send + Sync,
    {
        if descriptors.is_empty() {
            return Err(BuildError::InvalidArgument(
                "build matrix is empty; nothing to build".to_string(),
            ));
        }

        if self.jobs == 1 || descriptors.len() == 1 {
            return Ok(self.run_sequential(descriptors, step));
        }
        self.run_parallel(descriptors, step)
    }

    fn run_sequential<'a, F>(&self, descriptors: &'a [TargetDescriptor], step: F) -> Vec<BuildResult<'a>>
    where
        F: Fn(&'a TargetDescriptor) -> BuildResult<'a>,
    {
        let mut results = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let result = step(descriptor);
            let failed = !result.succeeded;
            results.push(result);

            if failed && self.policy == FailurePolicy::FailFast {
                let skipped = descriptors.len() - results.len();
                if skipped > 0 {
                    warn!(
                        "{} failed; skipping {} remaining target(s)",
                        descriptor.label(),
                        skipped
                    );
                }
                break;
            }
        }
        results
    }

    fn run_parallel<'a, F>(
        &self,
        descriptors: &'a [TargetDescriptor],
        step: F,
    ) -> Result<Vec<BuildResult<'a>>, BuildError>
    where
        F: Fn(&'a TargetDescriptor) -> BuildResult<'a> + Send + Sync,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .map_err(|e| BuildError::Config(format!("failed to start {} build workers: {}", self.jobs, e)))?;
        debug!("Running {} targets on {} workers", descriptors.len(), self.jobs);

        let halted = AtomicBool::new(false);
        let fail_fast = self.policy == FailurePolicy::FailFast;

        let slots: Vec<Option<BuildResult<'a>>> = pool.install(|| {
            descriptors
                .par_iter()
                .map(|descriptor| {
                    if fail_fast && halted.load(Ordering::SeqCst) {
                        warn!("Skipping {} after an earlier failure", descriptor.label());
                        return None;
                    }
                    let result = step(descriptor);
                    if !result.succeeded {
                        halted.store(true, Ordering::SeqCst);
                    }
                    Some(result)
                })
                .collect()
        });

        Ok(slots.into_iter().flatten().collect())
    }
}
