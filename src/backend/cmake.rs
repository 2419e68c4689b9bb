//! CMake backend: `cmake` generate, `cmake --build`, CTest, install target.

use std::path::{Path, PathBuf};

use semver::Version;

use super::{missing_tool, BuildBackend, BuildContext, BuildSystem};
use crate::errors::{BuildError, Result};
use crate::staleness::is_msvc_generator;
use crate::store::cmake::CACHE_FILE;
use crate::store::{CMakeStore, ConfigurationStore};
use crate::util::env::Tools;
use crate::util::process::ProcessBuilder;

/// Assumed when `cmake --version` output cannot be parsed.
const FALLBACK_VERSION: Version = Version::new(3, 14, 0);

/// CMake build backend.
#[derive(Debug)]
pub struct CMakeBackend {
    cmake: PathBuf,
    ctest: Option<PathBuf>,
    version: Version,
    store: CMakeStore,
}

impl CMakeBackend {
    /// Create the backend, detecting the CMake version.
    pub fn new(tools: &Tools) -> Result<Self> {
        let cmake = tools
            .cmake
            .clone()
            .ok_or_else(|| missing_tool("cmake", "build CMake projects"))?;

        let version = detect_version(&cmake).unwrap_or_else(|| {
            tracing::warn!(
                "could not determine CMake version, assuming {}",
                FALLBACK_VERSION
            );
            FALLBACK_VERSION
        });
        tracing::debug!("using CMake {} at {}", version, cmake.display());

        Ok(Self::with_version(cmake, tools.ctest.clone(), version))
    }

    /// Backend for reading a build directory without running CMake.
    pub fn for_inspection(tools: &Tools) -> Self {
        let cmake = tools.cmake.clone().unwrap_or_else(|| PathBuf::from("cmake"));
        Self::with_version(cmake, tools.ctest.clone(), FALLBACK_VERSION)
    }

    /// Create the backend for a known CMake version.
    pub fn with_version(cmake: PathBuf, ctest: Option<PathBuf>, version: Version) -> Self {
        let store = CMakeStore::new(version >= Version::new(3, 14, 0));
        CMakeBackend {
            cmake,
            ctest,
            version,
            store,
        }
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    /// `--parallel` needs CMake 3.12.
    fn supports_parallel(&self) -> bool {
        self.version >= Version::new(3, 12, 0)
    }

    /// `-S`/`-B` need CMake 3.13.
    fn supports_source_build_flags(&self) -> bool {
        self.version >= Version::new(3, 13, 0)
    }

    fn parallel_args(&self, ctx: &BuildContext) -> Vec<String> {
        if !self.supports_parallel() {
            return Vec::new();
        }
        match ctx.jobs {
            Some(jobs) => vec!["--parallel".to_string(), jobs.to_string()],
            None => vec!["--parallel".to_string()],
        }
    }

    fn build_dir_command(&self, ctx: &BuildContext) -> ProcessBuilder {
        ProcessBuilder::new(&self.cmake)
            .arg("--build")
            .arg(&ctx.build_dir)
            .args(["--config", ctx.build_type()])
    }
}

impl BuildBackend for CMakeBackend {
    fn build_system(&self) -> BuildSystem {
        BuildSystem::CMake
    }

    fn store(&self) -> &dyn ConfigurationStore {
        &self.store
    }

    fn generator_hint(&self, ctx: &BuildContext) -> Option<String> {
        if let Some(generator) = generator_override(&ctx.extra_args) {
            Some(generator)
        } else if ctx.toolchain.is_msvc() {
            Some(ctx.msvc_generator.clone())
        } else if ctx.host.is_windows() {
            Some("MinGW Makefiles".to_string())
        } else {
            None
        }
    }

    fn is_configured(&self, build_dir: &Path) -> bool {
        build_dir.join(CACHE_FILE).is_file()
    }

    fn generate_args(&self, ctx: &BuildContext) -> Vec<String> {
        let mut args = Vec::new();

        let generator = self.generator_hint(ctx);
        // A caller's own `-G` arrives with the extra args.
        if generator_override(&ctx.extra_args).is_none() {
            if let Some(ref generator) = generator {
                args.push("-G".to_string());
                args.push(generator.clone());
            }
        }
        if generator.as_deref().is_some_and(is_msvc_generator) {
            args.extend(["-A".to_string(), "x64".to_string()]);
        } else if ctx.host.is_windows() && !ctx.toolchain.is_msvc() {
            // MinGW Makefiles refuse to run with sh.exe on PATH otherwise.
            args.push("-DCMAKE_SH=CMAKE_SH-NOTFOUND".to_string());
        }

        args.push(format!("-DCMAKE_BUILD_TYPE={}", ctx.build_type()));
        args.extend(ctx.library_defines.iter().cloned());

        if let Some(ref prefix) = ctx.install_dir {
            args.push(format!("-DCMAKE_INSTALL_PREFIX:PATH={}", prefix.display()));
        }

        args.extend(ctx.extra_args.iter().cloned());
        args
    }

    fn generate_command(&self, ctx: &BuildContext, args: &[String]) -> ProcessBuilder {
        let cmd = ProcessBuilder::new(&self.cmake);
        let cmd = if self.supports_source_build_flags() {
            cmd.arg("-S")
                .arg(&ctx.source_dir)
                .arg("-B")
                .arg(&ctx.build_dir)
                .args(args)
        } else {
            // Older CMake configures into the working directory.
            cmd.args(args).arg(&ctx.source_dir).cwd(&ctx.build_dir)
        };
        ctx.decorate(cmd)
    }

    fn build_command(&self, ctx: &BuildContext) -> ProcessBuilder {
        let cmd = self.build_dir_command(ctx).args(self.parallel_args(ctx));
        ctx.decorate(cmd)
    }

    fn test_command(&self, ctx: &BuildContext) -> Result<ProcessBuilder> {
        if ctx.toolchain.is_msvc() {
            let cmd = self.build_dir_command(ctx).args(["--target", "RUN_TESTS"]);
            return Ok(ctx.decorate(cmd));
        }

        let ctest = self.ctest.as_ref().ok_or_else(|| BuildError::TestRunnerMissing {
            runner: "ctest".to_string(),
        })?;
        let cmd = ProcessBuilder::new(ctest)
            .args(["--parallel", &ctx.parallelism().to_string()])
            .arg("--output-on-failure")
            .args(["-C", ctx.build_type()])
            .cwd(&ctx.build_dir);
        Ok(ctx.decorate(cmd))
    }

    fn install_command(&self, ctx: &BuildContext) -> ProcessBuilder {
        let cmd = self
            .build_dir_command(ctx)
            .args(["--target", "install"])
            .args(self.parallel_args(ctx));
        ctx.decorate(cmd)
    }
}

/// Generator the caller selected with `-G <name>` or `-G<name>`. The last one wins.
fn generator_override(extra_args: &[String]) -> Option<String> {
    let mut generator = None;
    let mut args = extra_args.iter();
    while let Some(arg) = args.next() {
        if arg == "-G" {
            if let Some(value) = args.next() {
                generator = Some(value.clone());
            }
        } else if let Some(value) = arg.strip_prefix("-G") {
            generator = Some(value.to_string());
        }
    }
    generator
}

fn detect_version(cmake: &Path) -> Option<Version> {
    let output = ProcessBuilder::new(cmake).arg("--version").exec().ok()?;
    if !output.status.success() {
        return None;
    }
    parse_version_output(&String::from_utf8_lossy(&output.stdout))
}

/// Parse the first line of `cmake --version`, e.g. `cmake version 3.28.1`.
pub fn parse_version_output(stdout: &str) -> Option<Version> {
    let line = stdout.lines().next()?;
    let raw = line.split_whitespace().skip_while(|w| *w != "version").nth(1)?;

    let numeric: String = raw
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let mut parts = numeric.split('.').filter(|p| !p.is_empty());

    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let patch = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    Some(Version::new(major, minor, patch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::toolchain;
    use crate::util::env::HostFamily;

    fn ctx(host: HostFamily, cc: &str) -> BuildContext {
        let mut ctx = BuildContext::new(
            PathBuf::from("/src"),
            PathBuf::from("/src/build"),
            toolchain(&[cc]),
        );
        ctx.host = host;
        ctx
    }

    fn backend(version: Version) -> CMakeBackend {
        CMakeBackend::with_version(PathBuf::from("cmake"), Some(PathBuf::from("ctest")), version)
    }

    #[test]
    fn test_parse_version_output() {
        assert_eq!(
            parse_version_output("cmake version 3.28.1\n\nCMake suite maintained"),
            Some(Version::new(3, 28, 1))
        );
        assert_eq!(
            parse_version_output("cmake3 version 3.17.5"),
            Some(Version::new(3, 17, 5))
        );
        assert_eq!(
            parse_version_output("cmake version 3.30.0-rc2"),
            Some(Version::new(3, 30, 0))
        );
        assert_eq!(parse_version_output("garbage"), None);
    }

    #[test]
    fn test_extra_args_come_last() {
        let mut ctx = ctx(HostFamily::Posix, "gcc");
        ctx.extra_args = vec!["-DCMAKE_BUILD_TYPE=RelWithDebInfo".into()];
        ctx.install_dir = Some(PathBuf::from("/opt/pkg"));
        ctx.library_defines = vec!["-DLAPACK_ROOT=/opt/lapack".into()];

        let args = backend(Version::new(3, 28, 0)).generate_args(&ctx);
        assert_eq!(
            args,
            vec![
                "-DCMAKE_BUILD_TYPE=Release",
                "-DLAPACK_ROOT=/opt/lapack",
                "-DCMAKE_INSTALL_PREFIX:PATH=/opt/pkg",
                "-DCMAKE_BUILD_TYPE=RelWithDebInfo",
            ]
        );
    }

    #[test]
    fn test_msvc_uses_visual_studio_generator() {
        let mut ctx = ctx(HostFamily::Windows, "cl");
        ctx.msvc_generator = "Visual Studio 17 2022".into();
        let backend = backend(Version::new(3, 28, 0));

        assert_eq!(backend.generator_hint(&ctx).as_deref(), Some("Visual Studio 17 2022"));
        let args = backend.generate_args(&ctx);
        assert_eq!(&args[..4], ["-G", "Visual Studio 17 2022", "-A", "x64"]);

        let test = backend.test_command(&ctx).unwrap();
        assert!(test.get_args().contains(&"RUN_TESTS".to_string()));
    }

    #[test]
    fn test_windows_gnu_uses_mingw() {
        let ctx = ctx(HostFamily::Windows, "gcc");
        let args = backend(Version::new(3, 28, 0)).generate_args(&ctx);

        assert_eq!(&args[..3], ["-G", "MinGW Makefiles", "-DCMAKE_SH=CMAKE_SH-NOTFOUND"]);
    }

    #[test]
    fn test_caller_generator_overrides_default() {
        let mut ctx = ctx(HostFamily::Windows, "gcc");
        ctx.extra_args = vec!["-G".into(), "Unix Makefiles".into(), "-GNinja".into()];
        let backend = backend(Version::new(3, 28, 0));

        assert_eq!(backend.generator_hint(&ctx).as_deref(), Some("Ninja"));
        let args = backend.generate_args(&ctx);
        assert_eq!(args.iter().filter(|a| a.starts_with("-G")).count(), 2);
        assert!(!args.contains(&"MinGW Makefiles".to_string()));
    }

    #[test]
    fn test_msvc_with_ninja_skips_platform_flag() {
        let mut ctx = ctx(HostFamily::Windows, "cl");
        ctx.extra_args = vec!["-G".into(), "Ninja".into()];
        let args = backend(Version::new(3, 28, 0)).generate_args(&ctx);

        assert!(!args.contains(&"-A".to_string()));
        assert!(!args.contains(&"-DCMAKE_SH=CMAKE_SH-NOTFOUND".to_string()));
        assert_eq!(args[args.len() - 2..], ["-G", "Ninja"]);
    }

    #[test]
    fn test_old_cmake_configures_in_build_dir() {
        let ctx = ctx(HostFamily::Posix, "gcc");
        let backend = backend(Version::new(3, 10, 2));
        let cmd = backend.generate_command(&ctx, &["-DX=1".to_string()]);

        assert_eq!(cmd.get_args(), ["-DX=1", "/src"]);
        assert!(!backend.build_command(&ctx).get_args().contains(&"--parallel".to_string()));
    }

    #[test]
    fn test_generate_command_sets_compilers() {
        let ctx = ctx(HostFamily::Posix, "clang");
        let cmd = backend(Version::new(3, 28, 0)).generate_command(&ctx, &[]);

        assert_eq!(cmd.get_args(), ["-S", "/src", "-B", "/src/build"]);
        assert_eq!(cmd.get_env().get("CC").map(String::as_str), Some("clang"));
    }

    #[test]
    fn test_build_requests_parallelism() {
        let mut ctx = ctx(HostFamily::Posix, "gcc");
        let backend = backend(Version::new(3, 28, 0));

        let args = backend.build_command(&ctx).get_args().to_vec();
        assert_eq!(args, ["--build", "/src/build", "--config", "Release", "--parallel"]);

        ctx.jobs = Some(4);
        let args = backend.build_command(&ctx).get_args().to_vec();
        assert_eq!(args[args.len() - 2..], ["--parallel", "4"]);
    }

    #[test]
    fn test_missing_ctest() {
        let ctx = ctx(HostFamily::Posix, "gcc");
        let backend = CMakeBackend::with_version(PathBuf::from("cmake"), None, Version::new(3, 28, 0));

        let err = backend.test_command(&ctx).unwrap_err();
        assert!(matches!(err, BuildError::TestRunnerMissing { .. }));
    }

    #[test]
    fn test_old_cmake_has_no_file_api() {
        let tmp = tempfile::TempDir::new().unwrap();
        backend(Version::new(3, 13, 0)).store().prepare(tmp.path()).unwrap();
        assert!(!tmp.path().join(".cmake").exists());
    }
}
