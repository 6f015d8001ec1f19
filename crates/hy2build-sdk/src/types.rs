//! Core types for hy2build-sdk.
//!
//! This module defines the fundamental types used throughout the SDK:
//!
//! - [`BuildError`] - Error taxonomy for pre-flight, argument and build failures
//! - [`Os`] / [`Arch`] - The operating systems and architectures a target can name
//! - [`Platform`] / [`AppleMode`] - What the user asked to build
//! - [`FailurePolicy`] - Fail-fast or fail-soft matrix execution
//! - [`BuildSettings`] - Resolved settings consumed by planning and the pipeline

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Error types for hy2build-sdk operations.
///
/// Every variant is fatal for the run; nothing is retried. The CLI maps all of
/// them to exit code 1.
///
/// # Example
///
/// ```
/// use hy2build_sdk::{BuildError, Platform};
///
/// match Platform::parse("freebsd", None) {
///     Err(BuildError::InvalidArgument(msg)) => assert!(msg.contains("freebsd")),
///     other => panic!("unexpected: {:?}", other),
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A required external tool is not on `PATH`.
    ///
    /// Raised by pre-flight checks before any target is built.
    #[error("{tool} not found. {hint}")]
    MissingTool { tool: String, hint: String },

    /// Unknown platform, missing Apple suboption, or an otherwise unusable argument.
    #[error("{0}")]
    InvalidArgument(String),

    /// An external build invocation exited unsuccessfully.
    ///
    /// `stderr` is the captured standard error, surfaced verbatim.
    #[error("{target} failed (exit code {}):\n{stderr}", .exit_code.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string()))]
    BuildToolFailure {
        target: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// One or more targets failed under fail-soft execution.
    #[error("{} target(s) failed: {}", .0.len(), .0.join(", "))]
    TargetsFailed(Vec<String>),

    /// Invalid toolchain or matrix configuration.
    #[error("configuration error: {0}. Check hy2build.toml or CLI flags")]
    Config(String),

    /// An I/O error occurred, e.g. while creating an output directory.
    #[error("I/O error: {0}. Check file paths and permissions")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed while writing a plan or report.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Target operating system, spelled the way `GOOS` spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Linux,
    Darwin,
    Ios,
    Windows,
    Android,
}

impl Os {
    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Linux => "linux",
            Os::Darwin => "darwin",
            Os::Ios => "ios",
            Os::Windows => "windows",
            Os::Android => "android",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target architecture, spelled the way `GOARCH` spells it.
///
/// [`Arch::Universal`] marks gomobile targets, where the binding generator
/// builds every architecture of the platform itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    Amd64,
    Arm64,
    Universal,
}

impl Arch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::Amd64 => "amd64",
            Arch::Arm64 => "arm64",
            Arch::Universal => "universal",
        }
    }

    /// Architecture name as clang's `-arch` flag expects it.
    pub fn clang_arch(&self) -> Option<&'static str> {
        match self {
            Arch::Amd64 => Some("x86_64"),
            Arch::Arm64 => Some("arm64"),
            Arch::Universal => None,
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How Apple artifacts are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppleMode {
    /// `gomobile bind -target ios` producing an xcframework.
    Gomobile,
    /// `go build -buildmode=c-archive` per (os, arch) producing static archives.
    Cgo,
}

/// Platform selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "platform", content = "mode")]
pub enum Platform {
    Android,
    Apple(AppleMode),
    Linux,
    Windows,
}

impl Platform {
    /// Every valid (platform, suboption) combination, in usage order.
    pub const ALL: [Platform; 5] = [
        Platform::Android,
        Platform::Apple(AppleMode::Gomobile),
        Platform::Apple(AppleMode::Cgo),
        Platform::Linux,
        Platform::Windows,
    ];

    /// Parses the positional `<platform> [suboption]` pair.
    ///
    /// The platform is matched case-insensitively; the Apple suboption must be
    /// exactly `gomobile` or `cgo`. A suboption given to any other platform is
    /// ignored by the caller.
    pub fn parse(platform: &str, suboption: Option<&str>) -> Result<Self, BuildError> {
        match platform.to_lowercase().as_str() {
            "android" => Ok(Platform::Android),
            "apple" => match suboption {
                Some("gomobile") => Ok(Platform::Apple(AppleMode::Gomobile)),
                Some("cgo") => Ok(Platform::Apple(AppleMode::Cgo)),
                _ => Err(BuildError::InvalidArgument(
                    "Please specify: gomobile or cgo\n\
                     Example: hy2build apple gomobile"
                        .to_string(),
                )),
            },
            "linux" => Ok(Platform::Linux),
            "windows" => Ok(Platform::Windows),
            _ => Err(BuildError::InvalidArgument(format!(
                "Unknown platform: {}",
                platform
            ))),
        }
    }

    /// Whether this platform consumes a suboption.
    pub fn takes_suboption(&self) -> bool {
        matches!(self, Platform::Apple(_))
    }

    /// Human-readable name used in progress output.
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Android => "Android",
            Platform::Apple(AppleMode::Gomobile) => "Apple platforms using gomobile",
            Platform::Apple(AppleMode::Cgo) => "Apple platforms using cgo",
            Platform::Linux => "Linux",
            Platform::Windows => "Windows",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Android => f.write_str("android"),
            Platform::Apple(AppleMode::Gomobile) => f.write_str("apple gomobile"),
            Platform::Apple(AppleMode::Cgo) => f.write_str("apple cgo"),
            Platform::Linux => f.write_str("linux"),
            Platform::Windows => f.write_str("windows"),
        }
    }
}

/// What happens to the rest of the matrix after a target fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop at the first failing target.
    #[default]
    FailFast,
    /// Build every target and report all failures at the end.
    FailSoft,
}

/// Compiler programs for one cross-compiling platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerPair {
    pub cc: String,
    pub cxx: String,
}

/// Resolved settings for one run.
///
/// The CLI builds this from `hy2build.toml` and flags; the defaults are what
/// libHysteria2 releases are built with.
///
/// # Example
///
/// ```
/// use hy2build_sdk::BuildSettings;
///
/// let settings = BuildSettings::default();
/// assert_eq!(settings.android_api, 21);
/// assert_eq!(settings.jobs, 1);
/// ```
#[derive(Debug, Clone)]
pub struct BuildSettings {
    /// Directory of the Go package to build; all invocations run here.
    pub package_dir: PathBuf,
    /// `go` program name or path.
    pub go: String,
    /// `gomobile` program name or path.
    pub gomobile: String,
    /// `-androidapi` passed to gomobile.
    pub android_api: u32,
    /// Output directory for Apple cgo archives, relative to `package_dir`.
    pub apple_cgo_dir: PathBuf,
    /// Host compilers for the Linux archive.
    pub linux: CompilerPair,
    /// MinGW cross compilers for the Windows archive.
    pub windows: CompilerPair,
    pub policy: FailurePolicy,
    /// Worker threads for the matrix; `1` runs sequentially.
    pub jobs: usize,
    /// Log invocations without running builds or creating directories.
    pub dry_run: bool,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            package_dir: PathBuf::from("."),
            go: "go".to_string(),
            gomobile: "gomobile".to_string(),
            android_api: 21,
            apple_cgo_dir: PathBuf::from("build/apple"),
            linux: CompilerPair {
                cc: "clang".to_string(),
                cxx: "clang++".to_string(),
            },
            windows: CompilerPair {
                cc: "x86_64-w64-mingw32-gcc".to_string(),
                cxx: "x86_64-w64-mingw32-g++".to_string(),
            },
            policy: FailurePolicy::FailFast,
            jobs: 1,
            dry_run: false,
        }
    }
}
