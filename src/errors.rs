//! Error types for the build driver.
//!
//! Validation errors are raised before any external process runs. Pipeline
//! errors carry the exit code of the failing child so it can be propagated
//! unchanged to the caller.

use std::path::PathBuf;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

/// Any failure the build driver can report.
#[derive(Debug, Error, Diagnostic)]
pub enum BuildError {
    #[error("unknown compiler vendor `{vendor}`")]
    #[diagnostic(
        code(mcbuild::unknown_vendor),
        help("supported vendors: gnu, clang, clang-cl, intel, msvc, pgi")
    )]
    UnknownVendor { vendor: String },

    #[error("missing prerequisite: {what}")]
    #[diagnostic(code(mcbuild::missing_prerequisite))]
    MissingPrerequisite {
        what: String,
        #[help]
        hint: String,
    },

    #[error("not a directory: {}", path.display())]
    #[diagnostic(code(mcbuild::not_a_directory))]
    NotADirectory { path: PathBuf },

    #[error("default build directory does not exist: {}", path.display())]
    #[diagnostic(
        code(mcbuild::no_build_dir),
        help("specify a build directory explicitly, e.g. `mcbuild build -b mydirectory`")
    )]
    DefaultBuildDirMissing { path: PathBuf },

    #[error("no build description found in {}: {detail}", source_dir.display())]
    #[diagnostic(
        code(mcbuild::no_build_description),
        help("the source directory must contain CMakeLists.txt or meson.build")
    )]
    NoBuildDescription { source_dir: PathBuf, detail: String },

    #[error("generate step failed{}", fmt_code(*exit_code))]
    #[diagnostic(code(mcbuild::generate_failed))]
    GenerateFailed { exit_code: Option<i32> },

    #[error("build step failed{}", fmt_code(*exit_code))]
    #[diagnostic(code(mcbuild::build_failed))]
    BuildFailed { exit_code: Option<i32> },

    #[error("tests failed{}", fmt_code(*exit_code))]
    #[diagnostic(code(mcbuild::test_failed))]
    TestFailed { exit_code: Option<i32> },

    #[error("test runner `{runner}` not found")]
    #[diagnostic(
        code(mcbuild::test_runner_missing),
        help("install it or make sure it is on PATH")
    )]
    TestRunnerMissing { runner: String },

    #[error("install step failed{}", fmt_code(*exit_code))]
    #[diagnostic(code(mcbuild::install_failed))]
    InstallFailed { exit_code: Option<i32> },

    #[error("could not persist build configuration in {}: {reason}", build_dir.display())]
    #[diagnostic(code(mcbuild::persist))]
    PersistError { build_dir: PathBuf, reason: String },

    #[error("`{command}` did not finish within {}s", limit.as_secs())]
    #[diagnostic(code(mcbuild::timeout))]
    Timeout { command: String, limit: Duration },

    #[error("invalid configuration in {}: {message}", path.display())]
    #[diagnostic(code(mcbuild::config))]
    Config { path: PathBuf, message: String },

    #[error(transparent)]
    #[diagnostic(code(mcbuild::io))]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(code(mcbuild::other))]
    Other(#[from] anyhow::Error),
}

fn fmt_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!(" with exit code {}", code),
        None => " (terminated by signal)".to_string(),
    }
}

impl BuildError {
    /// Process exit code to report for this error.
    ///
    /// Pipeline failures report the child's own exit code; everything else
    /// reports 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildError::GenerateFailed { exit_code }
            | BuildError::BuildFailed { exit_code }
            | BuildError::TestFailed { exit_code }
            | BuildError::InstallFailed { exit_code } => match exit_code {
                Some(code) if *code != 0 => *code,
                _ => 1,
            },
            _ => 1,
        }
    }

    /// True for errors detected before any external process is started.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            BuildError::UnknownVendor { .. }
                | BuildError::MissingPrerequisite { .. }
                | BuildError::NotADirectory { .. }
                | BuildError::DefaultBuildDirMissing { .. }
                | BuildError::NoBuildDescription { .. }
                | BuildError::Config { .. }
        )
    }
}

/// Result alias for driver operations.
pub type Result<T, E = BuildError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_errors_propagate_exit_code() {
        assert_eq!(BuildError::BuildFailed { exit_code: Some(2) }.exit_code(), 2);
        assert_eq!(BuildError::TestFailed { exit_code: Some(8) }.exit_code(), 8);
        assert_eq!(BuildError::InstallFailed { exit_code: None }.exit_code(), 1);
    }

    #[test]
    fn test_validation_errors_exit_one() {
        let err = BuildError::UnknownVendor {
            vendor: "borland".into(),
        };
        assert_eq!(err.exit_code(), 1);
        assert!(err.is_validation());
        assert!(!BuildError::BuildFailed { exit_code: Some(1) }.is_validation());
    }

    #[test]
    fn test_display_includes_exit_code() {
        let err = BuildError::GenerateFailed { exit_code: Some(3) };
        assert_eq!(err.to_string(), "generate step failed with exit code 3");
    }
}
