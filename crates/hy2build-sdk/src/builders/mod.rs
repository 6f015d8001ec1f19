//! Build steps for the libHysteria2 artifacts.
//!
//! This module turns a resolved [`TargetDescriptor`] into the external build
//! that produces its artifact and runs it.
//!
//! ## Builders
//!
//! | Builder | Tool | Output |
//! |---------|------|--------|
//! | [`GomobileBuilder`] | `gomobile bind` | Android AAR, Apple xcframework |
//! | [`CArchiveBuilder`] | `go build -buildmode=c-archive` | `.a` static archive plus header |
//!
//! [`TargetBuilder`] picks the right one from the descriptor's
//! [`BuildKind`] and is what the matrix runner calls for every target.
//!
//! ## Common Utilities
//!
//! The [`common`] module validates the Go package directory, creates output
//! directories and checks that artifacts exist after a build.
//!
//! ## Example
//!
//! ```ignore
//! use hy2build_sdk::builders::TargetBuilder;
//! use hy2build_sdk::{BuildSettings, Environment, SystemRunner};
//!
//! let runner = SystemRunner::new();
//! let builder = TargetBuilder::new(&runner, Environment::capture(), &BuildSettings::default())
//!     .dry_run(true); // Log only
//!
//! let result = builder.execute(&descriptor);
//! assert!(result.succeeded);
//! ```

pub mod cgo;
pub mod common;
pub mod gomobile;

pub use cgo::{CArchiveBuilder, archive_header};
pub use common::{ensure_dir, find_go_mod, read_module_path, validate_package_dir, verify_artifact};
pub use gomobile::GomobileBuilder;

use tracing::{debug, info};

use crate::env::Environment;
use crate::matrix::BuildResult;
use crate::process::{Invocation, ProcessOutput, ToolRunner};
use crate::targets::{BuildKind, TargetDescriptor};
use crate::types::BuildSettings;

/// Runs the build for one target.
pub struct TargetBuilder<'r> {
    runner: &'r dyn ToolRunner,
    ambient: Environment,
    gomobile: GomobileBuilder,
    cgo: CArchiveBuilder,
    dry_run: bool,
}

impl<'r> TargetBuilder<'r> {
    /// Creates a builder that runs in `settings.package_dir` with `ambient`
    /// as the base environment of every build.
    pub fn new(runner: &'r dyn ToolRunner, ambient: Environment, settings: &BuildSettings) -> Self {
        Self {
            runner,
            ambient,
            gomobile: GomobileBuilder::new(&settings.gomobile, &settings.package_dir),
            cgo: CArchiveBuilder::new(&settings.go, &settings.package_dir),
            dry_run: settings.dry_run,
        }
    }

    /// Log invocations instead of running them.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// The invocation that builds `descriptor`.
    pub fn invocation(&self, descriptor: &TargetDescriptor) -> Invocation {
        let env = descriptor.environment(&self.ambient);
        match descriptor.kind() {
            BuildKind::GomobileBind { target, android_api } => {
                self.gomobile
                    .bind(target, *android_api, descriptor.output_path(), env)
            }
            BuildKind::CArchive => self.cgo.archive(descriptor.output_path(), env),
        }
    }

    /// Builds one target. Never returns an error; failures are recorded in
    /// the result.
    pub fn execute<'a>(&self, descriptor: &'a TargetDescriptor) -> BuildResult<'a> {
        let invocation = self.invocation(descriptor);
        for (key, value) in descriptor.toolchain_overrides() {
            debug!("{}: {}={}", descriptor.label(), key, value);
        }
        info!("Running: {}", invocation.display_command());

        if self.dry_run {
            return BuildResult::from_output(
                descriptor,
                ProcessOutput {
                    exit_code: Some(0),
                    ..ProcessOutput::default()
                },
            );
        }

        let output = match self.runner.exec(&invocation) {
            Ok(output) => output,
            Err(e) => return BuildResult::failed(descriptor, e.to_string()),
        };

        let result = BuildResult::from_output(descriptor, output);
        if !result.succeeded {
            return result;
        }

        if let Err(message) = verify_artifact(descriptor.output_path()) {
            return BuildResult::failed(descriptor, message);
        }
        if matches!(descriptor.kind(), BuildKind::CArchive) {
            debug!(
                "{}: header {}",
                descriptor.label(),
                archive_header(descriptor.output_path()).display()
            );
        }
        result
    }
}
