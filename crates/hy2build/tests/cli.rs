//! CLI integration tests for hy2build.
//!
//! These tests never reach a real build: they cover argument handling,
//! `--plan` output, config discovery and pre-flight failures.

use std::fs;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

/// Get the hy2build binary command.
fn hy2build() -> Command {
    Command::cargo_bin("hy2build").unwrap()
}

/// A repository root with an empty Go module, so config discovery stops here.
fn checkout() -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::create_dir(tmp.path().join(".git")).unwrap();
    fs::write(tmp.path().join("go.mod"), "module example.com/hy2\n").unwrap();
    tmp
}

fn plan_json(tmp: &TempDir, args: &[&str]) -> Value {
    let output = hy2build()
        .args(args)
        .arg("--plan")
        .current_dir(tmp.path())
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).unwrap()
}

// ============================================================================
// Argument handling
// ============================================================================

#[test]
fn test_no_platform_prints_usage() {
    let tmp = checkout();
    hy2build()
        .current_dir(tmp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Usage: hy2build <platform>"))
        .stderr(predicate::str::contains("apple cgo"));
}

#[test]
fn test_unknown_platform() {
    let tmp = checkout();
    hy2build()
        .arg("freebsd")
        .current_dir(tmp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown platform: freebsd"))
        .stdout(predicate::str::contains("Running:").not());
}

#[test]
fn test_apple_requires_suboption() {
    let tmp = checkout();
    hy2build()
        .arg("apple")
        .current_dir(tmp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Please specify: gomobile or cgo"));

    hy2build()
        .args(["apple", "metal"])
        .current_dir(tmp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("gomobile or cgo"));
}

#[test]
fn test_version_flag() {
    hy2build()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("hy2build"));
}

// ============================================================================
// --plan
// ============================================================================

#[test]
fn test_plan_linux() {
    let tmp = checkout();
    let plan = plan_json(&tmp, &["linux"]);

    assert_eq!(plan["platform"], "linux");
    let targets = plan["targets"].as_array().unwrap();
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0]["label"], "linux/amd64");
    assert_eq!(targets[0]["output"], "libhysteria2_linux.a");
    assert_eq!(targets[0]["env"]["CC"], "clang");
    assert_eq!(targets[0]["env"]["CXX"], "clang++");
    assert_eq!(targets[0]["env"]["CGO_ENABLED"], "1");
}

#[test]
fn test_plan_is_case_insensitive() {
    let tmp = checkout();
    let plan = plan_json(&tmp, &["ANDROID"]);
    assert_eq!(plan["platform"], "android");
    assert_eq!(plan["targets"][0]["output"], "libHysteria2.aar");
    assert_eq!(plan["tools"][0]["tool"], "gomobile");
}

#[test]
fn test_plan_apple_cgo_order() {
    let tmp = checkout();
    let plan = plan_json(&tmp, &["apple", "cgo"]);

    let labels: Vec<&str> = plan["targets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["label"].as_str().unwrap())
        .collect();
    assert_eq!(labels, ["ios/arm64", "ios/amd64", "darwin/arm64", "darwin/amd64"]);
    assert_eq!(
        plan["targets"][3]["output"],
        "build/apple/libhysteria2_darwin_amd64.a"
    );
    // --plan never creates output directories
    assert!(!tmp.path().join("build").exists());
}

#[test]
fn test_plan_uses_config_file() {
    let tmp = checkout();
    fs::write(
        tmp.path().join("hy2build.toml"),
        "[windows]\ncc = \"x86_64-w64-mingw32-clang\"\n\n[android]\napi_level = 26\n",
    )
    .unwrap();

    let windows = plan_json(&tmp, &["windows"]);
    assert_eq!(windows["targets"][0]["env"]["CC"], "x86_64-w64-mingw32-clang");
    assert_eq!(windows["targets"][0]["env"]["CXX"], "x86_64-w64-mingw32-g++");
    assert_eq!(windows["tools"][0]["tool"], "x86_64-w64-mingw32-clang");

    let android = plan_json(&tmp, &["android"]);
    assert_eq!(android["targets"][0]["build"]["android_api"], 26);
}

#[test]
fn test_invalid_config_is_reported() {
    let tmp = checkout();
    fs::write(tmp.path().join("hy2build.toml"), "[matrix\njobs = 2\n").unwrap();

    hy2build()
        .args(["linux", "--plan"])
        .current_dir(tmp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to parse config file"));
}

// ============================================================================
// Pre-flight
// ============================================================================

#[test]
fn test_missing_tool_fails_before_building() {
    let tmp = checkout();
    let empty_path = tmp.path().join("empty-bin");
    fs::create_dir(&empty_path).unwrap();

    hy2build()
        .args(["linux", "--report", "report.json"])
        .current_dir(tmp.path())
        .env("PATH", &empty_path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("clang not found"));

    assert!(!tmp.path().join("libhysteria2_linux.a").exists());
    assert!(!tmp.path().join("report.json").exists());
}

#[test]
fn test_missing_gomobile_shows_install_hint() {
    let tmp = checkout();
    let empty_path = tmp.path().join("empty-bin");
    fs::create_dir(&empty_path).unwrap();

    hy2build()
        .args(["apple", "gomobile"])
        .current_dir(tmp.path())
        .env("PATH", &empty_path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("gomobile not found"))
        .stderr(predicate::str::contains(
            "go install golang.org/x/mobile/cmd/gomobile@latest",
        ));
}
