//! Common utilities shared between the gomobile and cgo builders.
//!
//! ## Error Messages
//!
//! Functions in this module return errors that say what went wrong, where
//! (paths), and how to fix it.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::types::BuildError;

/// Validates that `package_dir` is a buildable Go package.
///
/// This function checks that:
/// - The path exists
/// - The path is a directory
/// - The directory, or one of its parents, contains a `go.mod`
///
/// # Returns
/// `Ok(())` if validation passes, or a descriptive `BuildError` if it fails.
pub fn validate_package_dir(package_dir: &Path) -> Result<(), BuildError> {
    if !package_dir.exists() {
        return Err(BuildError::Config(format!(
            "Package directory does not exist: {}\n\n\
             Run hy2build from the libHysteria2 checkout or pass --package-dir",
            package_dir.display()
        )));
    }

    if !package_dir.is_dir() {
        return Err(BuildError::Config(format!(
            "Package directory is not a directory: {}",
            package_dir.display()
        )));
    }

    if find_go_mod(package_dir).is_none() {
        return Err(BuildError::Config(format!(
            "No go.mod found in {} or any parent directory.\n\n\
             Ensure --package-dir points at the Go module to build",
            package_dir.display()
        )));
    }

    Ok(())
}

/// Walks up from `dir` to the nearest `go.mod`.
pub fn find_go_mod(dir: &Path) -> Option<std::path::PathBuf> {
    dir.ancestors()
        .map(|d| d.join("go.mod"))
        .find(|candidate| candidate.is_file())
}

/// Reads the module path from a `go.mod` file.
///
/// Returns `Some("github.com/...")` for the first `module` directive, `None`
/// if the file cannot be read or has no directive.
///
/// # Example
/// ```ignore
/// let module = read_module_path(Path::new("go.mod"));
/// assert_eq!(module.as_deref(), Some("github.com/CodeWithTamim/libHysteria2"));
/// ```
pub fn read_module_path(go_mod: &Path) -> Option<String> {
    let content = fs::read_to_string(go_mod).ok()?;

    for line in content.lines() {
        // Strip line comments
        let line = line.split("//").next().unwrap_or("").trim();
        let Some(rest) = line.strip_prefix("module") else {
            continue;
        };
        if !rest.starts_with(char::is_whitespace) {
            continue;
        }
        let value = rest.trim().trim_matches('"');
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }

    None
}

/// Creates `path` and its parents if they do not exist. Safe to call
/// repeatedly.
pub fn ensure_dir(path: &Path) -> Result<(), BuildError> {
    if path.is_dir() {
        return Ok(());
    }
    debug!("Creating directory {}", path.display());
    fs::create_dir_all(path).map_err(|e| {
        BuildError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to create directory {}: {}", path.display(), e),
        ))
    })
}

/// Checks that a build left its artifact at `path`.
///
/// gomobile produces a directory for xcframeworks and a file for AARs; both
/// count.
pub fn verify_artifact(path: &Path) -> Result<(), String> {
    if path.exists() {
        Ok(())
    } else {
        Err(format!(
            "Build reported success but the artifact was not found at expected location: {}",
            path.display()
        ))
    }
}
