//! Toolchain records and pre-flight checks.
//!
//! cgo reads the C compiler from `CC` and splits it on whitespace, so a
//! compiler with flags has to travel as a single string. Rather than building
//! that string by hand (and relying on a shell to expand things like
//! `$(xcrun --sdk iphoneos --show-sdk-path)`), a compiler is described by a
//! [`CompilerSpec`]: program, flags, and an optional sysroot. Xcode SDK
//! sysroots are looked up by running `xcrun` through the [`ToolRunner`], the
//! record is validated, and only then rendered into the override string.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::env::Environment;
use crate::process::{Invocation, ToolRunner};
use crate::types::{AppleMode, BuildError, BuildSettings, Platform};

/// Where a compiler's `-isysroot` comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sysroot {
    /// A fixed path.
    Path(PathBuf),
    /// An Xcode SDK name (`iphoneos`, `iphonesimulator`, ...) resolved with
    /// `xcrun --sdk <name> --show-sdk-path`.
    XcodeSdk(String),
}

/// A C or C++ compiler invocation prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompilerSpec {
    pub program: String,
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sysroot: Option<Sysroot>,
}

impl CompilerSpec {
    /// A bare compiler with no flags.
    pub fn program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            sysroot: None,
        }
    }

    /// clang targeting `arch` against an Xcode SDK.
    pub fn clang_for_sdk(clang_arch: &str, sdk: &str) -> Self {
        Self {
            program: "clang".to_string(),
            args: vec!["-arch".to_string(), clang_arch.to_string()],
            sysroot: Some(Sysroot::XcodeSdk(sdk.to_string())),
        }
    }

    /// Checks the record can be rendered into a single whitespace-separated
    /// `CC` value without any shell interpretation.
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.program.trim().is_empty() {
            return Err(BuildError::Config("compiler program must not be empty".to_string()));
        }
        check_word("compiler program", &self.program)?;
        for arg in &self.args {
            check_word("compiler argument", arg)?;
        }
        match &self.sysroot {
            Some(Sysroot::Path(path)) => check_word("sysroot", &path.to_string_lossy()),
            Some(Sysroot::XcodeSdk(sdk)) => check_word("Xcode SDK name", sdk),
            None => Ok(()),
        }
    }

    /// Resolves the sysroot (if any) and renders the compiler into the string
    /// cgo expects in `CC` / `CXX`.
    pub fn resolve(
        &self,
        runner: &dyn ToolRunner,
        ambient: &Environment,
        cwd: &Path,
    ) -> Result<String, BuildError> {
        self.validate()?;

        let mut words = vec![self.program.clone()];
        words.extend(self.args.iter().cloned());

        if let Some(sysroot) = &self.sysroot {
            let path = match sysroot {
                Sysroot::Path(path) => path.clone(),
                Sysroot::XcodeSdk(sdk) => resolve_xcode_sdk(runner, sdk, ambient, cwd)?,
            };
            let path = path.to_string_lossy().into_owned();
            check_word("sysroot", &path)?;
            words.push("-isysroot".to_string());
            words.push(path);
        }

        Ok(words.join(" "))
    }

    /// Renders the record for previews, leaving an Xcode SDK unresolved.
    pub fn describe(&self) -> String {
        let mut words = vec![self.program.clone()];
        words.extend(self.args.iter().cloned());
        match &self.sysroot {
            Some(Sysroot::Path(path)) => {
                words.push("-isysroot".to_string());
                words.push(path.display().to_string());
            }
            Some(Sysroot::XcodeSdk(sdk)) => {
                words.push("-isysroot".to_string());
                words.push(format!("<{} SDK>", sdk));
            }
            None => {}
        }
        words.join(" ")
    }
}

/// Compiler settings for one target. Unset fields leave the ambient
/// environment (and Go's defaults) in charge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Toolchain {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cc: Option<CompilerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cxx: Option<CompilerSpec>,
}

impl Toolchain {
    /// Toolchain with explicit `CC` and `CXX` programs.
    pub fn with_compilers(cc: impl Into<String>, cxx: impl Into<String>) -> Self {
        Self {
            cc: Some(CompilerSpec::program(cc)),
            cxx: Some(CompilerSpec::program(cxx)),
        }
    }

    /// Toolchain that only sets `CC`.
    pub fn with_cc(cc: CompilerSpec) -> Self {
        Self {
            cc: Some(cc),
            cxx: None,
        }
    }

    pub fn validate(&self) -> Result<(), BuildError> {
        for spec in self.cc.iter().chain(self.cxx.iter()) {
            spec.validate()?;
        }
        Ok(())
    }

    /// Resolves the toolchain into `CC` / `CXX` environment overrides.
    pub fn resolve(
        &self,
        runner: &dyn ToolRunner,
        ambient: &Environment,
        cwd: &Path,
    ) -> Result<BTreeMap<String, String>, BuildError> {
        let mut vars = BTreeMap::new();
        if let Some(cc) = &self.cc {
            vars.insert("CC".to_string(), cc.resolve(runner, ambient, cwd)?);
        }
        if let Some(cxx) = &self.cxx {
            vars.insert("CXX".to_string(), cxx.resolve(runner, ambient, cwd)?);
        }
        Ok(vars)
    }

    /// Preview form of the overrides, see [`CompilerSpec::describe`].
    pub fn describe(&self) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        if let Some(cc) = &self.cc {
            vars.insert("CC".to_string(), cc.describe());
        }
        if let Some(cxx) = &self.cxx {
            vars.insert("CXX".to_string(), cxx.describe());
        }
        vars
    }
}

fn check_word(what: &str, value: &str) -> Result<(), BuildError> {
    const SHELL_META: &[char] = &['$', '`', '(', ')', ';', '&', '|', '<', '>', '"', '\''];
    if value.chars().any(char::is_whitespace) {
        return Err(BuildError::Config(format!(
            "{} '{}' contains whitespace; cgo splits CC/CXX on whitespace",
            what, value
        )));
    }
    if let Some(c) = value.chars().find(|c| SHELL_META.contains(c)) {
        return Err(BuildError::Config(format!(
            "{} '{}' contains shell metacharacter '{}'; compiler settings are never shell-expanded",
            what, value, c
        )));
    }
    Ok(())
}

/// Runs `xcrun --sdk <sdk> --show-sdk-path` and returns the trimmed path.
pub fn resolve_xcode_sdk(
    runner: &dyn ToolRunner,
    sdk: &str,
    ambient: &Environment,
    cwd: &Path,
) -> Result<PathBuf, BuildError> {
    let invocation = Invocation::new("xcrun", ambient.clone(), cwd).args(["--sdk", sdk, "--show-sdk-path"]);
    debug!("Resolving Xcode SDK: {}", invocation.display_command());

    let output = runner.exec(&invocation)?;
    if !output.success() {
        return Err(BuildError::BuildToolFailure {
            target: format!("xcrun --sdk {}", sdk),
            exit_code: output.exit_code,
            stderr: output.stderr,
        });
    }

    let path = output.stdout.trim();
    if path.is_empty() {
        return Err(BuildError::Config(format!(
            "xcrun returned an empty SDK path for '{}'. Install Xcode and run `xcode-select --install`",
            sdk
        )));
    }
    Ok(PathBuf::from(path))
}

/// An external tool that must be present before a matrix can run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolRequirement {
    pub tool: String,
    /// Arguments that make the tool print its version; non-zero exit is fatal.
    pub version_args: Vec<String>,
    /// Shown to the user when the tool is missing.
    pub install_hint: String,
}

impl ToolRequirement {
    fn new(tool: &str, version_args: &[&str], install_hint: &str) -> Self {
        Self {
            tool: tool.to_string(),
            version_args: version_args.iter().map(|a| a.to_string()).collect(),
            install_hint: install_hint.to_string(),
        }
    }
}

const GOMOBILE_HINT: &str = "Please install it first:\n\
     go install golang.org/x/mobile/cmd/gomobile@latest\n\
     gomobile init";
const GO_HINT: &str = "Please install Go from https://go.dev/dl/";
const CLANG_HINT: &str = "Please install clang and clang++";
const MINGW_HINT: &str = "LLVM MinGW is required. Please install it:\n\
     winget install MartinStorsjo.LLVM-MinGW.UCRT";
const XCRUN_HINT: &str = "Xcode command line tools are required. Run: xcode-select --install";

/// Tools a platform needs, in the order they are checked.
pub fn required_tools(platform: Platform, settings: &BuildSettings) -> Vec<ToolRequirement> {
    match platform {
        Platform::Android | Platform::Apple(AppleMode::Gomobile) => {
            vec![ToolRequirement::new(&settings.gomobile, &["version"], GOMOBILE_HINT)]
        }
        Platform::Apple(AppleMode::Cgo) => vec![
            ToolRequirement::new(&settings.go, &["version"], GO_HINT),
            ToolRequirement::new("xcrun", &["--version"], XCRUN_HINT),
            ToolRequirement::new("clang", &["--version"], CLANG_HINT),
        ],
        Platform::Linux => vec![
            ToolRequirement::new(&settings.linux.cc, &["--version"], CLANG_HINT),
            ToolRequirement::new(&settings.go, &["version"], GO_HINT),
        ],
        Platform::Windows => vec![
            ToolRequirement::new(&settings.windows.cc, &["--version"], MINGW_HINT),
            ToolRequirement::new(&settings.go, &["version"], GO_HINT),
        ],
    }
}

/// Verifies every required tool is present and answers its version query.
///
/// The first missing tool aborts with [`BuildError::MissingTool`]; a tool that
/// is present but fails its version query aborts with
/// [`BuildError::BuildToolFailure`] carrying its stderr.
pub fn preflight(
    requirements: &[ToolRequirement],
    runner: &dyn ToolRunner,
    ambient: &Environment,
    cwd: &Path,
) -> Result<(), BuildError> {
    for req in requirements {
        if !runner.probe(&req.tool) {
            return Err(BuildError::MissingTool {
                tool: req.tool.clone(),
                hint: req.install_hint.clone(),
            });
        }

        let invocation =
            Invocation::new(req.tool.clone(), ambient.clone(), cwd).args(req.version_args.iter().cloned());
        info!("Running: {}", invocation.display_command());
        let output = runner.exec(&invocation)?;
        if !output.success() {
            return Err(BuildError::BuildToolFailure {
                target: invocation.display_command(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }
        debug!("{}: {}", req.tool, output.stdout.lines().next().unwrap_or("").trim());
    }
    Ok(())
}
