//! # hy2build
//!
//! Command-line tool for building libHysteria2 for every platform it ships on.
//!
//! ## Overview
//!
//! `hy2build` is the CLI front end of [`hy2build_sdk`]. It handles:
//!
//! - **Pre-flight** - Checks that `gomobile`, `go`, `clang`, `xcrun` or MinGW
//!   are installed before anything is built
//! - **Building** - Runs `gomobile bind` or `go build -buildmode=c-archive`
//!   for every target of the selected platform
//! - **Reporting** - Prints completion messages and optionally writes a JSON
//!   report
//!
//! ## Quick Start
//!
//! ```bash
//! # Android AAR
//! hy2build android
//!
//! # Apple xcframework via gomobile
//! hy2build apple gomobile
//!
//! # Apple static archives for iOS device, simulator and macOS
//! hy2build apple cgo --keep-going --jobs 4
//!
//! # Show the matrix without running anything
//! hy2build windows --plan
//! ```
//!
//! ## Platforms
//!
//! | Platform | Output |
//! |----------|--------|
//! | `android` | `libHysteria2.aar` |
//! | `apple gomobile` | `LibHysteria2.xcframework` |
//! | `apple cgo` | `build/apple/libhysteria2_<os>_<arch>.a` |
//! | `linux` | `libhysteria2_linux.a` |
//! | `windows` | `libhysteria2_windows.a` |
//!
//! ## CLI Flags
//!
//! - **`--dry-run`** - Log build commands without running them
//! - **`--verbose` / `-v`** - Enable debug logging (environment overrides, tool versions)
//! - **`--config <path>`** - Use this config file instead of discovering `hy2build.toml`
//! - **`--package-dir <dir>`** - Go package to build (default: current directory)
//! - **`--keep-going`** - Build every target even after a failure
//! - **`--jobs <n>`** - Build up to `n` targets concurrently
//! - **`--report <path>`** - Write a JSON report of the run
//! - **`--plan`** - Print the build matrix as JSON and exit
//!
//! `RUST_LOG` overrides the log filter chosen by `--verbose`.
//!
//! ## Modules
//!
//! - [`config`] - Configuration file support for `hy2build.toml`

use anyhow::{Context, Result};
use clap::Parser;
use hy2build_sdk::toolchain::{ToolRequirement, required_tools};
use hy2build_sdk::{
    AppleMode, Arch, BuildError, BuildKind, BuildSettings, Environment, MatrixReport, Os,
    Pipeline, Platform, SystemRunner, TargetPlan,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

pub mod config;

use config::ConfigResolver;

/// Usage text printed when no or an invalid platform is given.
pub const USAGE: &str = "\
Usage: hy2build <platform> [suboption] [options]
Platforms:
  android
  apple gomobile
  apple cgo
  linux
  windows";

/// Build orchestrator for libHysteria2 artifacts.
#[derive(Parser, Debug)]
#[command(
    name = "hy2build",
    author,
    version,
    about = "Build libHysteria2 for Android, Apple platforms, Linux and Windows",
    long_about = None,
    after_help = USAGE
)]
struct Cli {
    /// Platform to build: android, apple, linux or windows
    platform: Option<String>,

    /// Apple build mode: gomobile or cgo
    suboption: Option<String>,

    /// Print what would be done without actually doing it
    #[arg(long)]
    dry_run: bool,

    /// Print verbose output including environment overrides
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Path to config file (default: discover hy2build.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory of the Go package to build
    #[arg(long)]
    package_dir: Option<PathBuf>,

    /// Build every target even after one fails
    #[arg(long)]
    keep_going: bool,

    /// Number of targets to build concurrently
    #[arg(long, short = 'j')]
    jobs: Option<usize>,

    /// Write a JSON report of the run to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Print the build matrix as JSON without running any tool
    #[arg(long)]
    plan: bool,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let Some(platform_arg) = cli.platform.as_deref() else {
        return Err(BuildError::InvalidArgument("No platform specified".to_string()).into());
    };
    let platform = Platform::parse(platform_arg, cli.suboption.as_deref())?;
    if let Some(sub) = &cli.suboption
        && !platform.takes_suboption()
    {
        warn!("Ignoring suboption '{}' for {}", sub, platform);
    }

    let cwd = env::current_dir().context("Failed to get current directory")?;
    let resolver = ConfigResolver::load(cli.config.as_deref(), &cwd)?;
    if let Some(path) = &resolver.config_path {
        debug!("Using config file {}", path.display());
    }
    let settings = resolve_settings(&cli, &resolver, &cwd)?;

    if cli.plan {
        return print_plan(platform, &settings);
    }

    let ambient = ambient_environment(&settings.package_dir);
    let runner = SystemRunner::new();

    println!("Building for {}...", platform.display_name());
    let pipeline = Pipeline::new(&runner, ambient, settings);
    let report = pipeline.run(platform)?;

    if let Some(path) = &cli.report {
        write_report(&report, path)?;
        println!("Report written to {}", path.display());
    }

    report.check()?;
    print_completion(platform, pipeline.settings(), &report);
    Ok(())
}

/// Returns `true` if `err` should be followed by the usage text.
pub fn is_usage_error(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidArgument(_))
    )
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "hy2build=debug,hy2build_sdk=debug"
    } else {
        "hy2build=info,hy2build_sdk=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

/// Merges CLI flags, config file and defaults. CLI wins over config.
fn resolve_settings(cli: &Cli, resolver: &ConfigResolver, cwd: &Path) -> Result<BuildSettings> {
    let mut settings = resolver.base_settings();

    let package_dir = cli
        .package_dir
        .clone()
        .or_else(|| resolver.package_dir())
        .unwrap_or_else(|| cwd.to_path_buf());
    settings.package_dir = std::path::absolute(&package_dir)
        .with_context(|| format!("Failed to resolve package directory {:?}", package_dir))?;

    settings.jobs = resolver.resolve(cli.jobs, |c| c.matrix.jobs, 1).max(1);
    settings.policy = resolver.policy(cli.keep_going);
    settings.dry_run = cli.dry_run;
    Ok(settings)
}

/// Process environment plus `.env.local` from the package directory.
///
/// Variables already set in the process environment win. The process
/// environment itself is not modified.
fn ambient_environment(package_dir: &Path) -> Environment {
    let ambient = Environment::capture();
    let path = package_dir.join(".env.local");
    if !path.is_file() {
        return ambient;
    }

    let iter = match dotenvy::from_path_iter(&path) {
        Ok(iter) => iter,
        Err(e) => {
            warn!("Ignoring {}: {}", path.display(), e);
            return ambient;
        }
    };

    let mut extra = BTreeMap::new();
    for item in iter {
        match item {
            Ok((key, value)) if ambient.get(&key).is_none() => {
                debug!("{}: {}", path.display(), key);
                extra.insert(key, value);
            }
            Ok(_) => {}
            Err(e) => warn!("Skipping invalid line in {}: {}", path.display(), e),
        }
    }
    ambient.overlay(&extra)
}

#[derive(Serialize)]
struct PlanOutput<'a> {
    platform: String,
    package_dir: &'a Path,
    dry_run: bool,
    tools: Vec<ToolRequirement>,
    targets: Vec<PlannedTarget>,
}

#[derive(Serialize)]
struct PlannedTarget {
    label: String,
    os: Os,
    arch: Arch,
    build: BuildKind,
    output: PathBuf,
    env: BTreeMap<String, String>,
}

impl From<&TargetPlan> for PlannedTarget {
    fn from(plan: &TargetPlan) -> Self {
        Self {
            label: plan.label(),
            os: plan.os,
            arch: plan.arch,
            build: plan.kind.clone(),
            output: plan.output.clone(),
            env: plan.describe_overrides(),
        }
    }
}

fn print_plan(platform: Platform, settings: &BuildSettings) -> Result<()> {
    let plans = hy2build_sdk::targets::plan(platform, settings);
    let output = PlanOutput {
        platform: platform.to_string(),
        package_dir: &settings.package_dir,
        dry_run: settings.dry_run,
        tools: required_tools(platform, settings),
        targets: plans.iter().map(PlannedTarget::from).collect(),
    };
    let json = serde_json::to_string_pretty(&output).context("Failed to serialize build plan")?;
    println!("{}", json);
    Ok(())
}

fn write_report(report: &MatrixReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create report directory {:?}", parent))?;
    }
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    fs::write(path, json).with_context(|| format!("Failed to write report to {:?}", path))?;
    Ok(())
}

fn print_completion(platform: Platform, settings: &BuildSettings, report: &MatrixReport) {
    if report.dry_run {
        println!("Dry run completed for {}: nothing was built", platform);
        return;
    }
    match platform {
        Platform::Android => println!(
            "Android build completed: {}",
            hy2build_sdk::targets::ANDROID_AAR
        ),
        Platform::Apple(AppleMode::Gomobile) => println!(
            "Apple build completed: {}",
            hy2build_sdk::targets::APPLE_XCFRAMEWORK
        ),
        Platform::Apple(AppleMode::Cgo) => {
            println!(
                "Apple cgo build completed in {}/",
                settings.apple_cgo_dir.display()
            );
            for target in &report.targets {
                println!("  {}: {}", target.label, target.output.display());
            }
        }
        Platform::Linux => println!(
            "Linux build completed: {}",
            hy2build_sdk::targets::LINUX_ARCHIVE
        ),
        Platform::Windows => println!(
            "Windows build completed: {}",
            hy2build_sdk::targets::WINDOWS_ARCHIVE
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::Hy2buildConfig;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["hy2build"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_positional_platform_and_suboption() {
        let cli = parse(&["apple", "cgo", "--keep-going", "-j", "4"]);
        assert_eq!(cli.platform.as_deref(), Some("apple"));
        assert_eq!(cli.suboption.as_deref(), Some("cgo"));
        assert!(cli.keep_going);
        assert_eq!(cli.jobs, Some(4));
    }

    #[test]
    fn test_no_platform_parses() {
        let cli = parse(&[]);
        assert!(cli.platform.is_none());
    }

    #[test]
    fn test_usage_error_detection() {
        let err: anyhow::Error = BuildError::InvalidArgument("Unknown platform: x".into()).into();
        assert!(is_usage_error(&err));

        let err: anyhow::Error = BuildError::MissingTool {
            tool: "go".into(),
            hint: String::new(),
        }
        .into();
        assert!(!is_usage_error(&err));
    }

    #[test]
    fn test_cli_overrides_config() {
        let tmp = TempDir::new().unwrap();
        let resolver = ConfigResolver {
            config: Some(Hy2buildConfig {
                matrix: config::MatrixConfig {
                    fail_fast: Some(false),
                    jobs: Some(3),
                },
                ..Hy2buildConfig::default()
            }),
            config_path: Some(tmp.path().join("hy2build.toml")),
        };

        let settings = resolve_settings(&parse(&["linux"]), &resolver, tmp.path()).unwrap();
        assert_eq!(settings.jobs, 3);
        assert_eq!(settings.policy, hy2build_sdk::FailurePolicy::FailSoft);
        assert_eq!(settings.package_dir, tmp.path());

        let settings =
            resolve_settings(&parse(&["linux", "--jobs", "1", "--dry-run"]), &resolver, tmp.path())
                .unwrap();
        assert_eq!(settings.jobs, 1);
        assert!(settings.dry_run);
    }

    #[test]
    fn test_env_local_does_not_override_process_env() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(".env.local"),
            "HY2BUILD_TEST_ONLY_IN_FILE=from-file\nPATH=/should/not/win\n",
        )
        .unwrap();

        let ambient = ambient_environment(tmp.path());
        assert_eq!(ambient.get("HY2BUILD_TEST_ONLY_IN_FILE").unwrap(), "from-file");
        if let Some(path) = env::var_os("PATH") {
            assert_eq!(ambient.get("PATH").unwrap(), path.as_os_str());
        }
        assert!(env::var_os("HY2BUILD_TEST_ONLY_IN_FILE").is_none());
    }

    #[test]
    fn test_plan_entry_shows_symbolic_sdk() {
        let plans = hy2build_sdk::targets::plan(
            Platform::Apple(AppleMode::Cgo),
            &BuildSettings::default(),
        );
        let entry = PlannedTarget::from(&plans[0]);
        assert_eq!(entry.label, "ios/arm64");
        assert_eq!(entry.env["CC"], "clang -arch arm64 -isysroot <iphoneos SDK>");
    }
}
