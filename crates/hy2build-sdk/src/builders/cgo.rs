//! cgo static archive builds
//!
//! Produces C static archives (`.a` plus the generated header) with
//! `go build -buildmode=c-archive`. The target platform is selected purely
//! through the environment: `GOOS`, `GOARCH`, `CGO_ENABLED=1` and, where the
//! host compiler is not right for the target, `CC` / `CXX`.

use std::path::{Path, PathBuf};

use crate::env::Environment;
use crate::process::Invocation;

/// Builds `go build -buildmode=c-archive` invocations for one Go package.
#[derive(Debug, Clone)]
pub struct CArchiveBuilder {
    /// go program name or path
    program: String,
    /// Directory of the Go package being built
    package_dir: PathBuf,
}

impl CArchiveBuilder {
    pub fn new(program: impl Into<String>, package_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            package_dir: package_dir.into(),
        }
    }

    /// `go build -buildmode=c-archive -o <output> .`
    pub fn archive(&self, output: &Path, env: Environment) -> Invocation {
        Invocation::new(self.program.clone(), env, &self.package_dir).args([
            "build".to_string(),
            "-buildmode=c-archive".to_string(),
            "-o".to_string(),
            output.to_string_lossy().into_owned(),
            ".".to_string(),
        ])
    }
}

/// Header file cgo writes next to an archive (`libfoo.a` -> `libfoo.h`).
pub fn archive_header(archive: &Path) -> PathBuf {
    archive.with_extension("h")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_command() {
        let env: Environment = [("GOOS", "linux"), ("CGO_ENABLED", "1")].into_iter().collect();
        let inv = CArchiveBuilder::new("go", "/src/libhy2").archive(Path::new("libhysteria2_linux.a"), env.clone());
        assert_eq!(
            inv.display_command(),
            "go build -buildmode=c-archive -o libhysteria2_linux.a ."
        );
        assert_eq!(inv.env, env);
        assert_eq!(inv.cwd, PathBuf::from("/src/libhy2"));
    }

    #[test]
    fn header_next_to_archive() {
        assert_eq!(
            archive_header(Path::new("build/apple/libhysteria2_ios_arm64.a")),
            PathBuf::from("build/apple/libhysteria2_ios_arm64.h")
        );
    }
}
