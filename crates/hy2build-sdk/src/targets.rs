//! The build matrix table.
//!
//! [`plan`] returns the static list of targets for a [`Platform`]. Planning is
//! pure: nothing is probed or executed, which makes it safe for `--plan`
//! previews. [`TargetPlan::resolve`] turns a row into an immutable
//! [`TargetDescriptor`] once pre-flight has passed, looking up Xcode SDKs and
//! fixing the environment overrides for good.
//!
//! Artifact names and the (os, arch) order are consumed by downstream
//! projects and must not change:
//!
//! | Platform | Targets | Artifact |
//! |----------|---------|----------|
//! | `android` | android/universal | `libHysteria2.aar` |
//! | `apple gomobile` | ios/universal | `LibHysteria2.xcframework` |
//! | `apple cgo` | ios/arm64, ios/amd64, darwin/arm64, darwin/amd64 | `build/apple/libhysteria2_<os>_<arch>.a` |
//! | `linux` | linux/amd64 | `libhysteria2_linux.a` |
//! | `windows` | windows/amd64 | `libhysteria2_windows.a` |

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::env::Environment;
use crate::process::ToolRunner;
use crate::toolchain::{CompilerSpec, Toolchain};
use crate::types::{AppleMode, Arch, BuildError, BuildSettings, Os, Platform};

/// Android AAR produced by gomobile.
pub const ANDROID_AAR: &str = "libHysteria2.aar";
/// Apple xcframework produced by gomobile.
pub const APPLE_XCFRAMEWORK: &str = "LibHysteria2.xcframework";
/// Linux static archive.
pub const LINUX_ARCHIVE: &str = "libhysteria2_linux.a";
/// Windows static archive.
pub const WINDOWS_ARCHIVE: &str = "libhysteria2_windows.a";

/// Apple cgo archive name for one (os, arch).
pub fn apple_archive_name(os: Os, arch: Arch) -> String {
    format!("libhysteria2_{}_{}.a", os, arch)
}

/// The external build that produces a target's artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "tool", rename_all = "kebab-case")]
pub enum BuildKind {
    /// `gomobile bind -target <target> [-androidapi <api>]`.
    GomobileBind {
        target: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        android_api: Option<u32>,
    },
    /// `go build -buildmode=c-archive`.
    CArchive,
}

/// One unresolved row of the matrix table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetPlan {
    pub os: Os,
    pub arch: Arch,
    pub kind: BuildKind,
    /// Artifact path relative to the package directory.
    pub output: PathBuf,
    /// Plain overrides such as `GOOS`; compiler variables come from `toolchain`.
    pub env: BTreeMap<String, String>,
    pub toolchain: Toolchain,
}

impl TargetPlan {
    fn gomobile(os: Os, target: &str, android_api: Option<u32>, output: &str) -> Self {
        Self {
            os,
            arch: Arch::Universal,
            kind: BuildKind::GomobileBind {
                target: target.to_string(),
                android_api,
            },
            output: PathBuf::from(output),
            env: BTreeMap::new(),
            toolchain: Toolchain::default(),
        }
    }

    fn c_archive(os: Os, arch: Arch, output: PathBuf, toolchain: Toolchain) -> Self {
        let env = BTreeMap::from([
            ("GOOS".to_string(), os.as_str().to_string()),
            ("GOARCH".to_string(), arch.as_str().to_string()),
            ("CGO_ENABLED".to_string(), "1".to_string()),
        ]);
        Self {
            os,
            arch,
            kind: BuildKind::CArchive,
            output,
            env,
            toolchain,
        }
    }

    /// `<os>/<arch>` label used in logs and reports.
    pub fn label(&self) -> String {
        format!("{}/{}", self.os, self.arch)
    }

    /// Every override this target will set, with Xcode SDKs left symbolic.
    pub fn describe_overrides(&self) -> BTreeMap<String, String> {
        let mut vars = self.env.clone();
        vars.extend(self.toolchain.describe());
        vars
    }

    /// Freezes this row into a descriptor.
    ///
    /// Resolves the toolchain (which may run `xcrun`) and anchors the output
    /// path at `package_dir`.
    pub fn resolve(
        &self,
        runner: &dyn ToolRunner,
        ambient: &Environment,
        package_dir: &Path,
    ) -> Result<TargetDescriptor, BuildError> {
        let mut overrides = self.env.clone();
        overrides.extend(self.toolchain.resolve(runner, ambient, package_dir)?);

        Ok(TargetDescriptor {
            os: self.os,
            arch: self.arch,
            kind: self.kind.clone(),
            toolchain_overrides: overrides,
            output_path: package_dir.join(&self.output),
        })
    }
}

/// An immutable, fully resolved build target.
///
/// Created once per run by [`TargetPlan::resolve`]; there is no way to modify
/// one afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetDescriptor {
    os: Os,
    arch: Arch,
    kind: BuildKind,
    toolchain_overrides: BTreeMap<String, String>,
    output_path: PathBuf,
}

impl TargetDescriptor {
    /// Builds a descriptor directly, bypassing the table. Mostly useful for
    /// driving a [`crate::MatrixRunner`] with a custom matrix.
    pub fn new(
        os: Os,
        arch: Arch,
        kind: BuildKind,
        toolchain_overrides: BTreeMap<String, String>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            os,
            arch,
            kind,
            toolchain_overrides,
            output_path: output_path.into(),
        }
    }

    pub fn os(&self) -> Os {
        self.os
    }

    pub fn arch(&self) -> Arch {
        self.arch
    }

    pub fn kind(&self) -> &BuildKind {
        &self.kind
    }

    pub fn toolchain_overrides(&self) -> &BTreeMap<String, String> {
        &self.toolchain_overrides
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn label(&self) -> String {
        format!("{}/{}", self.os, self.arch)
    }

    /// The environment this target builds with: `ambient` overlaid with this
    /// target's overrides. `ambient` is not modified.
    pub fn environment(&self, ambient: &Environment) -> Environment {
        ambient.overlay(&self.toolchain_overrides)
    }
}

/// Returns the matrix for `platform`, in declaration order.
pub fn plan(platform: Platform, settings: &BuildSettings) -> Vec<TargetPlan> {
    match platform {
        Platform::Android => vec![TargetPlan::gomobile(
            Os::Android,
            "android",
            Some(settings.android_api),
            ANDROID_AAR,
        )],
        Platform::Apple(AppleMode::Gomobile) => {
            vec![TargetPlan::gomobile(Os::Ios, "ios", None, APPLE_XCFRAMEWORK)]
        }
        Platform::Apple(AppleMode::Cgo) => {
            // Device, simulator, Apple Silicon, Intel
            let matrix = [
                (Os::Ios, Arch::Arm64),
                (Os::Ios, Arch::Amd64),
                (Os::Darwin, Arch::Arm64),
                (Os::Darwin, Arch::Amd64),
            ];
            matrix
                .into_iter()
                .map(|(os, arch)| {
                    let toolchain = match (os, arch.clang_arch()) {
                        (Os::Ios, Some(clang_arch)) => {
                            let sdk = if arch == Arch::Arm64 { "iphoneos" } else { "iphonesimulator" };
                            Toolchain::with_cc(CompilerSpec::clang_for_sdk(clang_arch, sdk))
                        }
                        _ => Toolchain::default(),
                    };
                    let output = settings.apple_cgo_dir.join(apple_archive_name(os, arch));
                    TargetPlan::c_archive(os, arch, output, toolchain)
                })
                .collect()
        }
        Platform::Linux => vec![TargetPlan::c_archive(
            Os::Linux,
            Arch::Amd64,
            PathBuf::from(LINUX_ARCHIVE),
            Toolchain::with_compilers(&settings.linux.cc, &settings.linux.cxx),
        )],
        Platform::Windows => vec![TargetPlan::c_archive(
            Os::Windows,
            Arch::Amd64,
            PathBuf::from(WINDOWS_ARCHIVE),
            Toolchain::with_compilers(&settings.windows.cc, &settings.windows.cxx),
        )],
    }
}

/// Directories that must exist before any target of `plans` writes its
/// artifact, relative to the package directory. Deduplicated, in first-use
/// order.
pub fn output_dirs(plans: &[TargetPlan]) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    for plan in plans {
        if let Some(parent) = plan.output.parent()
            && !parent.as_os_str().is_empty()
            && !dirs.iter().any(|d| d == parent)
        {
            dirs.push(parent.to_path_buf());
        }
    }
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{Invocation, ProcessOutput};

    struct SdkRunner;

    impl ToolRunner for SdkRunner {
        fn probe(&self, _tool: &str) -> bool {
            true
        }

        fn exec(&self, invocation: &Invocation) -> Result<ProcessOutput, BuildError> {
            let sdk = &invocation.args[1];
            Ok(ProcessOutput {
                exit_code: Some(0),
                stdout: format!("/sdk/{}\n", sdk),
                stderr: String::new(),
            })
        }
    }

    fn labels(plans: &[TargetPlan]) -> Vec<String> {
        plans.iter().map(TargetPlan::label).collect()
    }

    #[test]
    fn android_matrix() {
        let plans = plan(Platform::Android, &BuildSettings::default());
        assert_eq!(labels(&plans), ["android/universal"]);
        assert_eq!(plans[0].output, PathBuf::from("libHysteria2.aar"));
        assert_eq!(
            plans[0].kind,
            BuildKind::GomobileBind {
                target: "android".to_string(),
                android_api: Some(21)
            }
        );
        assert!(plans[0].describe_overrides().is_empty());
    }

    #[test]
    fn apple_gomobile_matrix() {
        let plans = plan(Platform::Apple(AppleMode::Gomobile), &BuildSettings::default());
        assert_eq!(labels(&plans), ["ios/universal"]);
        assert_eq!(plans[0].output, PathBuf::from("LibHysteria2.xcframework"));
    }

    #[test]
    fn apple_cgo_matrix_order_and_names() {
        let plans = plan(Platform::Apple(AppleMode::Cgo), &BuildSettings::default());
        assert_eq!(
            labels(&plans),
            ["ios/arm64", "ios/amd64", "darwin/arm64", "darwin/amd64"]
        );
        let outputs: Vec<_> = plans.iter().map(|p| p.output.clone()).collect();
        assert_eq!(
            outputs,
            [
                PathBuf::from("build/apple/libhysteria2_ios_arm64.a"),
                PathBuf::from("build/apple/libhysteria2_ios_amd64.a"),
                PathBuf::from("build/apple/libhysteria2_darwin_arm64.a"),
                PathBuf::from("build/apple/libhysteria2_darwin_amd64.a"),
            ]
        );

        // Only iOS targets override CC
        assert!(plans[0].toolchain.cc.is_some());
        assert!(plans[1].toolchain.cc.is_some());
        assert!(plans[2].toolchain.cc.is_none());
        assert!(plans[3].toolchain.cc.is_none());
        for p in &plans {
            assert_eq!(p.env.get("CGO_ENABLED").map(String::as_str), Some("1"));
        }
    }

    #[test]
    fn linux_and_windows_compilers() {
        let settings = BuildSettings::default();
        let linux = &plan(Platform::Linux, &settings)[0];
        let vars = linux.describe_overrides();
        assert_eq!(vars["GOOS"], "linux");
        assert_eq!(vars["GOARCH"], "amd64");
        assert_eq!(vars["CC"], "clang");
        assert_eq!(vars["CXX"], "clang++");
        assert_eq!(linux.output, PathBuf::from("libhysteria2_linux.a"));

        let windows = &plan(Platform::Windows, &settings)[0];
        let vars = windows.describe_overrides();
        assert_eq!(vars["GOOS"], "windows");
        assert_eq!(vars["CC"], "x86_64-w64-mingw32-gcc");
        assert_eq!(vars["CXX"], "x86_64-w64-mingw32-g++");
        assert_eq!(windows.output, PathBuf::from("libhysteria2_windows.a"));
    }

    #[test]
    fn resolve_anchors_output_and_sdk() {
        let plans = plan(Platform::Apple(AppleMode::Cgo), &BuildSettings::default());
        let desc = plans[1]
            .resolve(&SdkRunner, &Environment::new(), Path::new("/src/libhy2"))
            .unwrap();
        assert_eq!(desc.label(), "ios/amd64");
        assert_eq!(
            desc.output_path(),
            Path::new("/src/libhy2/build/apple/libhysteria2_ios_amd64.a")
        );
        assert_eq!(
            desc.toolchain_overrides()["CC"],
            "clang -arch x86_64 -isysroot /sdk/iphonesimulator"
        );
        assert_eq!(desc.toolchain_overrides()["GOOS"], "ios");
    }

    #[test]
    fn descriptor_environment_overlays_ambient() {
        let desc = TargetDescriptor::new(
            Os::Linux,
            Arch::Amd64,
            BuildKind::CArchive,
            BTreeMap::from([("CC".to_string(), "clang".to_string())]),
            "out.a",
        );
        let ambient: Environment = [("CC", "gcc"), ("HOME", "/home/u")].into_iter().collect();
        let env = desc.environment(&ambient);
        assert_eq!(env.get("CC").unwrap(), "clang");
        assert_eq!(env.get("HOME").unwrap(), "/home/u");
        assert_eq!(ambient.get("CC").unwrap(), "gcc");
    }

    #[test]
    fn output_dirs_are_deduplicated() {
        let plans = plan(Platform::Apple(AppleMode::Cgo), &BuildSettings::default());
        assert_eq!(output_dirs(&plans), [PathBuf::from("build/apple")]);
        assert!(output_dirs(&plan(Platform::Linux, &BuildSettings::default())).is_empty());
    }

    #[test]
    fn custom_android_api_level() {
        let settings = BuildSettings {
            android_api: 24,
            ..BuildSettings::default()
        };
        let plans = plan(Platform::Android, &settings);
        assert_eq!(
            plans[0].kind,
            BuildKind::GomobileBind {
                target: "android".to_string(),
                android_api: Some(24)
            }
        );
    }
}
