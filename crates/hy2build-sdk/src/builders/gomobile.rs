//! gomobile binding generation
//!
//! Produces the Android AAR and the Apple xcframework with `gomobile bind`.
//! gomobile cross-compiles every architecture of the platform on its own, so
//! these targets use [`crate::Arch::Universal`] and set no environment
//! overrides.

use std::path::{Path, PathBuf};

use crate::env::Environment;
use crate::process::Invocation;

/// Builds `gomobile bind` invocations for one Go package.
#[derive(Debug, Clone)]
pub struct GomobileBuilder {
    /// gomobile program name or path
    program: String,
    /// Directory of the Go package being bound
    package_dir: PathBuf,
}

impl GomobileBuilder {
    /// Creates a builder that binds the package in `package_dir`.
    pub fn new(program: impl Into<String>, package_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            package_dir: package_dir.into(),
        }
    }

    /// `gomobile bind -target <target> [-androidapi <api>] -o <output> .`
    ///
    /// The argument order matches what the project has always run, so logs
    /// stay comparable.
    pub fn bind(
        &self,
        target: &str,
        android_api: Option<u32>,
        output: &Path,
        env: Environment,
    ) -> Invocation {
        let mut invocation = Invocation::new(self.program.clone(), env, &self.package_dir)
            .args(["bind", "-target", target]);

        if let Some(api) = android_api {
            invocation = invocation.arg("-androidapi").arg(api.to_string());
        }

        invocation
            .arg("-o")
            .arg(output.to_string_lossy().into_owned())
            .arg(".")
    }
}
