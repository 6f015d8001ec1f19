//! End-to-end platform builds.
//!
//! [`Pipeline::run`] performs one `hy2build <platform>` run:
//!
//! 1. Pre-flight: every required tool must be on `PATH` and answer its
//!    version query. Nothing is built if any check fails.
//! 2. The package directory must contain a Go module.
//! 3. The matrix rows are resolved into [`TargetDescriptor`]s (this is where
//!    Xcode SDK paths are looked up).
//! 4. Output directories are created.
//! 5. The matrix runs under the configured policy and job count.
//!
//! The outcome is a serializable [`MatrixReport`]; [`MatrixReport::check`]
//! turns it into the error the CLI reports.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info};

use crate::builders::{TargetBuilder, ensure_dir, find_go_mod, read_module_path, validate_package_dir};
use crate::env::Environment;
use crate::matrix::{BuildResult, MatrixRunner};
use crate::process::ToolRunner;
use crate::targets::{TargetDescriptor, TargetPlan, output_dirs, plan};
use crate::toolchain::{preflight, required_tools};
use crate::types::{Arch, BuildError, BuildSettings, FailurePolicy, Os, Platform};

/// Result of one target in a [`MatrixReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetReport {
    pub label: String,
    pub os: Os,
    pub arch: Arch,
    pub output: PathBuf,
    pub succeeded: bool,
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
    pub duration_ms: u64,
}

/// Outcome of a platform build, written by `--report`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatrixReport {
    /// Platform as typed on the command line, e.g. `apple cgo`.
    pub platform: String,
    pub generated_at: String,
    pub dry_run: bool,
    pub policy: FailurePolicy,
    /// Executed targets in declaration order.
    pub targets: Vec<TargetReport>,
    /// Targets never started because an earlier one failed.
    pub skipped: Vec<String>,
}

impl MatrixReport {
    pub fn all_succeeded(&self) -> bool {
        self.skipped.is_empty() && self.targets.iter().all(|t| t.succeeded)
    }

    pub fn failed(&self) -> impl Iterator<Item = &TargetReport> {
        self.targets.iter().filter(|t| !t.succeeded)
    }

    /// `Ok` when every target succeeded.
    ///
    /// Under fail-fast the single failing target is reported with its stderr
    /// as [`BuildError::BuildToolFailure`]. Under fail-soft all failing labels
    /// are reported together as [`BuildError::TargetsFailed`]; their stderr
    /// has already been logged.
    pub fn check(&self) -> Result<(), BuildError> {
        let failed: Vec<&TargetReport> = self.failed().collect();
        match (self.policy, failed.as_slice()) {
            (_, []) => Ok(()),
            (FailurePolicy::FailFast, [first, ..]) | (FailurePolicy::FailSoft, [first]) => {
                Err(BuildError::BuildToolFailure {
                    target: first.label.clone(),
                    exit_code: first.exit_code,
                    stderr: first.stderr.clone(),
                })
            }
            (FailurePolicy::FailSoft, many) => Err(BuildError::TargetsFailed(
                many.iter().map(|t| t.label.clone()).collect(),
            )),
        }
    }
}

/// Runs platform builds against one package directory.
pub struct Pipeline<'r> {
    runner: &'r dyn ToolRunner,
    ambient: Environment,
    settings: BuildSettings,
}

impl<'r> Pipeline<'r> {
    /// `ambient` is the base environment for every tool the pipeline runs.
    pub fn new(runner: &'r dyn ToolRunner, ambient: Environment, settings: BuildSettings) -> Self {
        Self {
            runner,
            ambient,
            settings,
        }
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// The unresolved matrix for `platform`. Runs nothing.
    pub fn plan(&self, platform: Platform) -> Vec<TargetPlan> {
        plan(platform, &self.settings)
    }

    /// Builds every target of `platform`.
    ///
    /// Returns `Err` for problems that stop the run before any target is
    /// built (missing tools, bad configuration). Target failures are in the
    /// returned report.
    pub fn run(&self, platform: Platform) -> Result<MatrixReport, BuildError> {
        let package_dir = &self.settings.package_dir;

        preflight(
            &required_tools(platform, &self.settings),
            self.runner,
            &self.ambient,
            package_dir,
        )?;
        validate_package_dir(package_dir)?;
        if let Some(module) = find_go_mod(package_dir).and_then(|m| read_module_path(&m)) {
            debug!("Go module: {}", module);
        }

        let plans = self.plan(platform);
        for p in &plans {
            p.toolchain.validate()?;
        }
        let descriptors = plans
            .iter()
            .map(|p| p.resolve(self.runner, &self.ambient, package_dir))
            .collect::<Result<Vec<TargetDescriptor>, BuildError>>()?;

        for dir in output_dirs(&plans) {
            let dir = package_dir.join(dir);
            if self.settings.dry_run {
                info!("Would create directory {}", dir.display());
            } else {
                ensure_dir(&dir)?;
            }
        }

        info!("Building {} ({} target(s))", platform, descriptors.len());
        let builder = TargetBuilder::new(self.runner, self.ambient.clone(), &self.settings);
        let durations: Mutex<BTreeMap<String, u64>> = Mutex::new(BTreeMap::new());

        let results = MatrixRunner::new()
            .policy(self.settings.policy)
            .jobs(self.settings.jobs)
            .run(&descriptors, |descriptor| {
                let start = Instant::now();
                let result = builder.execute(descriptor);
                let elapsed = start.elapsed().as_millis() as u64;
                if let Ok(mut map) = durations.lock() {
                    map.insert(descriptor.label(), elapsed);
                }
                log_result(&result);
                result
            })?;

        let durations = durations.into_inner().unwrap_or_default();
        Ok(self.report(platform, &descriptors, &results, &durations))
    }

    fn report(
        &self,
        platform: Platform,
        descriptors: &[TargetDescriptor],
        results: &[BuildResult<'_>],
        durations: &BTreeMap<String, u64>,
    ) -> MatrixReport {
        let targets: Vec<TargetReport> = results
            .iter()
            .map(|r| {
                let label = r.descriptor.label();
                TargetReport {
                    os: r.descriptor.os(),
                    arch: r.descriptor.arch(),
                    output: r.descriptor.output_path().to_path_buf(),
                    succeeded: r.succeeded,
                    exit_code: r.exit_code,
                    stderr: r.stderr.clone(),
                    duration_ms: durations.get(&label).copied().unwrap_or(0),
                    label,
                }
            })
            .collect();

        let skipped = descriptors
            .iter()
            .filter(|d| !results.iter().any(|r| std::ptr::eq(r.descriptor, *d)))
            .map(TargetDescriptor::label)
            .collect();

        MatrixReport {
            platform: platform.to_string(),
            generated_at: timestamp(),
            dry_run: self.settings.dry_run,
            policy: self.settings.policy,
            targets,
            skipped,
        }
    }
}

fn log_result(result: &BuildResult<'_>) {
    let label = result.descriptor.label();
    if result.succeeded {
        info!("{} built: {}", label, result.descriptor.output_path().display());
        if !result.stdout.trim().is_empty() {
            debug!("{} stdout:\n{}", label, result.stdout.trim_end());
        }
    } else {
        tracing::error!(
            "{} failed (exit code {}):\n{}",
            label,
            result
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "none".to_string()),
            result.stderr.trim_end()
        );
    }
}

fn timestamp() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs().to_string())
            .unwrap_or_default()
    })
}
