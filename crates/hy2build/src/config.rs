//! Configuration file support for hy2build.
//!
//! This module provides support for `hy2build.toml` configuration files that
//! pin tool paths, compilers and matrix behavior for a checkout so they do
//! not have to be passed as flags on every run.
//!
//! ## Configuration File Location
//!
//! The configuration file is searched for in the following order:
//! 1. `--config <path>` if given
//! 2. Current working directory (`./hy2build.toml`)
//! 3. Parent directories (up to the repository root or filesystem root)
//!
//! ## Example Configuration
//!
//! ```toml
//! [project]
//! package_dir = "."
//!
//! [tools]
//! go = "go"
//! gomobile = "gomobile"
//!
//! [android]
//! api_level = 21
//!
//! [apple]
//! cgo_output_dir = "build/apple"
//!
//! [linux]
//! cc = "clang"
//! cxx = "clang++"
//!
//! [windows]
//! cc = "x86_64-w64-mingw32-gcc"
//! cxx = "x86_64-w64-mingw32-g++"
//!
//! [matrix]
//! fail_fast = true
//! jobs = 1
//! ```

use anyhow::{Context, Result};
use hy2build_sdk::{BuildSettings, CompilerPair, FailurePolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The default configuration file name.
pub const CONFIG_FILE_NAME: &str = "hy2build.toml";

/// Root configuration structure for `hy2build.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hy2buildConfig {
    pub project: ProjectConfig,
    pub tools: ToolsConfig,
    pub android: AndroidConfig,
    pub apple: AppleConfig,
    pub linux: CompilerConfig,
    pub windows: CompilerConfig,
    pub matrix: MatrixConfig,
}

/// Project-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Directory of the Go package to build.
    ///
    /// Relative paths are resolved against the directory containing the
    /// config file. Defaults to the current directory.
    pub package_dir: Option<PathBuf>,
}

/// External tool locations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// `go` program name or path. Defaults to `go` on `PATH`.
    pub go: Option<String>,
    /// `gomobile` program name or path. Defaults to `gomobile` on `PATH`.
    pub gomobile: Option<String>,
}

/// Android AAR configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AndroidConfig {
    /// Value passed as `-androidapi`. Defaults to 21.
    pub api_level: Option<u32>,
}

/// Apple build configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppleConfig {
    /// Output directory for cgo archives. Defaults to `build/apple`.
    pub cgo_output_dir: Option<PathBuf>,
}

/// C and C++ compilers for a cgo platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub cc: Option<String>,
    pub cxx: Option<String>,
}

impl CompilerConfig {
    fn merge_into(&self, pair: &mut CompilerPair) {
        if let Some(cc) = &self.cc {
            pair.cc = cc.clone();
        }
        if let Some(cxx) = &self.cxx {
            pair.cxx = cxx.clone();
        }
    }
}

/// Matrix execution defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixConfig {
    /// Stop at the first failing target. Defaults to `true`.
    ///
    /// Can be overridden via CLI `--keep-going` flag.
    pub fail_fast: Option<bool>,

    /// Targets built concurrently. Defaults to 1.
    ///
    /// Can be overridden via CLI `--jobs` flag.
    pub jobs: Option<usize>,
}

impl Hy2buildConfig {
    /// Loads configuration from the specified file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Hy2buildConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Attempts to find and load configuration starting from the specified directory.
    ///
    /// # Returns
    ///
    /// * `Ok(Some((config, path)))` - Found and loaded configuration with its path
    /// * `Ok(None)` - No configuration file found
    /// * `Err` - If a config file was found but couldn't be parsed
    pub fn discover_from(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.is_file() {
                let config = Self::load_from_file(&config_path)?;
                return Ok(Some((config, config_path)));
            }

            // Stop at repository root or filesystem root
            if current.join(".git").exists() || !current.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Saves the configuration to the specified file path.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }
}

/// Configuration resolver that merges config file values with CLI arguments.
///
/// CLI arguments always take precedence over config file values.
#[derive(Debug, Default)]
pub struct ConfigResolver {
    /// Loaded configuration, if any.
    pub config: Option<Hy2buildConfig>,

    /// Path to the loaded config file, if any.
    pub config_path: Option<PathBuf>,
}

impl ConfigResolver {
    /// Loads `explicit` if given, otherwise discovers a config file upward
    /// from `cwd`. An explicit path that does not exist is an error.
    pub fn load(explicit: Option<&Path>, cwd: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            let config = Hy2buildConfig::load_from_file(path)?;
            return Ok(Self {
                config: Some(config),
                config_path: Some(path.to_path_buf()),
            });
        }

        match Hy2buildConfig::discover_from(cwd)? {
            Some((config, path)) => Ok(Self {
                config: Some(config),
                config_path: Some(path),
            }),
            None => Ok(Self::default()),
        }
    }

    /// Resolves a CLI value, using config as fallback.
    ///
    /// # Returns
    ///
    /// The resolved value, preferring CLI over config over default.
    pub fn resolve<T, F>(&self, cli_value: Option<T>, config_getter: F, default: T) -> T
    where
        F: FnOnce(&Hy2buildConfig) -> Option<T>,
    {
        cli_value
            .or_else(|| self.config.as_ref().and_then(config_getter))
            .unwrap_or(default)
    }

    /// Package directory from config, anchored at the config file's directory.
    pub fn package_dir(&self) -> Option<PathBuf> {
        let dir = self.config.as_ref()?.project.package_dir.clone()?;
        if dir.is_absolute() {
            return Some(dir);
        }
        let base = self.config_path.as_deref().and_then(Path::parent)?;
        Some(base.join(dir))
    }

    /// Builds run settings from config and defaults. CLI-only values
    /// (package dir, policy, jobs, dry-run) are applied by the caller.
    pub fn base_settings(&self) -> BuildSettings {
        let mut settings = BuildSettings::default();
        let Some(config) = &self.config else {
            return settings;
        };

        if let Some(go) = &config.tools.go {
            settings.go = go.clone();
        }
        if let Some(gomobile) = &config.tools.gomobile {
            settings.gomobile = gomobile.clone();
        }
        if let Some(api) = config.android.api_level {
            settings.android_api = api;
        }
        if let Some(dir) = &config.apple.cgo_output_dir {
            settings.apple_cgo_dir = dir.clone();
        }
        config.linux.merge_into(&mut settings.linux);
        config.windows.merge_into(&mut settings.windows);
        settings
    }

    /// Failure policy: `--keep-going` wins, then `matrix.fail_fast`.
    pub fn policy(&self, keep_going: bool) -> FailurePolicy {
        let fail_fast = self.resolve(
            keep_going.then_some(false),
            |c| c.matrix.fail_fast,
            true,
        );
        if fail_fast {
            FailurePolicy::FailFast
        } else {
            FailurePolicy::FailSoft
        }
    }
}
