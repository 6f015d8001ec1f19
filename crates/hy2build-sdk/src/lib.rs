//! Build SDK for libHysteria2
//!
//! `hy2build-sdk` builds the libHysteria2 Go package into the artifacts its
//! consumers link against: an Android AAR and an Apple xcframework via
//! `gomobile bind`, and C static archives for iOS, macOS, Linux and Windows via
//! `go build -buildmode=c-archive`.
//!
//! # Architecture
//!
//! The SDK consists of several components:
//!
//! - **Targets**: The static build matrix per platform ([`targets::plan`])
//! - **Toolchain**: Compiler records and pre-flight tool checks
//! - **Builders**: Turn a target into a `gomobile` or `go build` invocation
//! - **Matrix**: Runs targets sequentially or in parallel under a failure policy
//! - **Pipeline**: Ties the above together for one platform build
//!
//! Every external command goes through a [`ToolRunner`], and every child
//! process gets an explicit [`Environment`]; the process environment of the
//! caller is never modified.
//!
//! # Example: Programmatic Usage
//!
//! ```ignore
//! use hy2build_sdk::{BuildSettings, Environment, Pipeline, Platform, SystemRunner};
//!
//! fn main() -> Result<(), hy2build_sdk::BuildError> {
//!     let runner = SystemRunner::new();
//!     let pipeline = Pipeline::new(&runner, Environment::capture(), BuildSettings::default());
//!
//!     let report = pipeline.run(Platform::parse("apple", Some("cgo"))?)?;
//!     for target in &report.targets {
//!         println!("{}: {}", target.label, target.output.display());
//!     }
//!     report.check()
//! }
//! ```

pub mod builders;
pub mod env;
pub mod matrix;
pub mod pipeline;
pub mod process;
pub mod targets;
pub mod toolchain;
pub mod types;

// Re-export key types for convenience
pub use env::Environment;
pub use matrix::{BuildResult, MatrixRunner, Summary, summarize};
pub use pipeline::{MatrixReport, Pipeline, TargetReport};
pub use process::{Invocation, ProcessOutput, SystemRunner, ToolRunner};
pub use targets::{BuildKind, TargetDescriptor, TargetPlan};
pub use toolchain::{CompilerSpec, Toolchain, ToolRequirement};
pub use types::{
    AppleMode, Arch, BuildError, BuildSettings, CompilerPair, FailurePolicy, Os, Platform,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
