//! Build system backends.
//!
//! A backend knows the command lines of one build system (CMake or Meson +
//! Ninja) and where that system keeps its metadata. The shared
//! generate → build → test → install sequence lives in [`driver`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::errors::{BuildError, Result};
use crate::store::ConfigurationStore;
use crate::toolchain::ToolchainSpec;
use crate::util::env::{HostFamily, Tools};
use crate::util::process::ProcessBuilder;

pub mod cmake;
pub mod driver;
pub mod meson;

pub use cmake::CMakeBackend;
pub use driver::{Driver, GenerateOutcome, PipelineReport, Stage};
pub use meson::MesonBackend;

/// Default Visual Studio generator when nothing else selects one.
pub const DEFAULT_MSVC_GENERATOR: &str = "Visual Studio 15 2017";

/// A supported build system, identified by its build description file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildSystem {
    CMake,
    Meson,
}

impl BuildSystem {
    /// Probe order when detecting the build system of a source tree.
    pub const PROBE_ORDER: [BuildSystem; 2] = [BuildSystem::CMake, BuildSystem::Meson];

    /// File that marks a source tree as using this build system.
    pub fn description_file(&self) -> &'static str {
        match self {
            BuildSystem::CMake => "CMakeLists.txt",
            BuildSystem::Meson => "meson.build",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildSystem::CMake => "cmake",
            BuildSystem::Meson => "meson",
        }
    }
}

impl fmt::Display for BuildSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildSystem {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cmake" => Ok(BuildSystem::CMake),
            "meson" | "ninja" => Ok(BuildSystem::Meson),
            other => Err(format!("unknown build system `{}` (expected cmake or meson)", other)),
        }
    }
}

/// Everything a backend needs to know about one invocation.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Absolute source directory
    pub source_dir: PathBuf,

    /// Absolute build directory
    pub build_dir: PathBuf,

    /// Resolved compilers
    pub toolchain: ToolchainSpec,

    /// Caller arguments appended verbatim to generation
    pub extra_args: Vec<String>,

    /// Install prefix, if installing
    pub install_dir: Option<PathBuf>,

    /// Wipe generated metadata unconditionally
    pub wipe: bool,

    /// Run the test stage
    pub run_tests: bool,

    /// Debug instead of release build
    pub debug: bool,

    /// Explicit parallel job count; the tools' maximum otherwise
    pub jobs: Option<usize>,

    /// `-D<NAME>_ROOT=` definitions for CMake
    pub library_defines: Vec<String>,

    /// Visual Studio generator for MSVC builds
    pub msvc_generator: String,

    /// Deadline for each child process
    pub timeout: Option<Duration>,

    /// Platform the driver runs on
    pub host: HostFamily,
}

impl BuildContext {
    /// Create a context with defaults for everything optional.
    pub fn new(source_dir: PathBuf, build_dir: PathBuf, toolchain: ToolchainSpec) -> Self {
        BuildContext {
            source_dir,
            build_dir,
            toolchain,
            extra_args: Vec::new(),
            install_dir: None,
            wipe: false,
            run_tests: false,
            debug: false,
            jobs: None,
            library_defines: Vec::new(),
            msvc_generator: DEFAULT_MSVC_GENERATOR.to_string(),
            timeout: None,
            host: HostFamily::current(),
        }
    }

    pub fn build_type(&self) -> &'static str {
        if self.debug {
            "Debug"
        } else {
            "Release"
        }
    }

    /// Parallelism for tools that need an explicit count.
    pub fn parallelism(&self) -> usize {
        self.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Attach the compilers and deadline to a command.
    pub fn decorate(&self, mut cmd: ProcessBuilder) -> ProcessBuilder {
        for (key, value) in self.toolchain.env_vars() {
            cmd = cmd.env(key, value);
        }
        cmd.timeout(self.timeout)
    }
}

/// Operations one build system provides to the driver.
pub trait BuildBackend {
    fn build_system(&self) -> BuildSystem;

    /// Where this backend persists its configuration.
    fn store(&self) -> &dyn ConfigurationStore;

    /// Generator this invocation asks for, if the backend chooses one.
    fn generator_hint(&self, ctx: &BuildContext) -> Option<String>;

    /// True when the build directory holds generated build files.
    fn is_configured(&self, build_dir: &Path) -> bool;

    /// Generation arguments: built-in ones first, caller's `extra_args` last.
    fn generate_args(&self, ctx: &BuildContext) -> Vec<String>;

    /// Full generate command for `args`.
    fn generate_command(&self, ctx: &BuildContext, args: &[String]) -> ProcessBuilder;

    fn build_command(&self, ctx: &BuildContext) -> ProcessBuilder;

    /// Fails with [`BuildError::TestRunnerMissing`] when no runner is available.
    fn test_command(&self, ctx: &BuildContext) -> Result<ProcessBuilder>;

    fn install_command(&self, ctx: &BuildContext) -> ProcessBuilder;
}

/// The backend selected for a run.
#[derive(Debug)]
pub enum Backend {
    CMake(CMakeBackend),
    Meson(MesonBackend),
}

impl Backend {
    /// Construct the backend for `system` from the discovered tools.
    pub fn new(system: BuildSystem, tools: &Tools) -> Result<Self> {
        match system {
            BuildSystem::CMake => CMakeBackend::new(tools).map(Backend::CMake),
            BuildSystem::Meson => MesonBackend::new(tools).map(Backend::Meson),
        }
    }

    /// Construct the backend without probing any tool.
    ///
    /// Only suitable for inspecting a build directory; commands built from
    /// it may name tools that do not exist.
    pub fn for_inspection(system: BuildSystem, tools: &Tools) -> Self {
        match system {
            BuildSystem::CMake => Backend::CMake(CMakeBackend::for_inspection(tools)),
            BuildSystem::Meson => Backend::Meson(MesonBackend::for_inspection(tools)),
        }
    }

    pub fn as_backend(&self) -> &dyn BuildBackend {
        match self {
            Backend::CMake(b) => b,
            Backend::Meson(b) => b,
        }
    }

    pub fn build_system(&self) -> BuildSystem {
        self.as_backend().build_system()
    }
}

pub(crate) fn missing_tool(tool: &str, purpose: &str) -> BuildError {
    BuildError::MissingPrerequisite {
        what: format!("`{}` not found", tool),
        hint: format!("{} is required to {}; install it and make sure it is on PATH", tool, purpose),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_system_parse() {
        assert_eq!("CMake".parse::<BuildSystem>().unwrap(), BuildSystem::CMake);
        assert_eq!("meson".parse::<BuildSystem>().unwrap(), BuildSystem::Meson);
        assert!("scons".parse::<BuildSystem>().is_err());
    }

    #[test]
    fn test_probe_order_is_cmake_first() {
        assert_eq!(BuildSystem::PROBE_ORDER[0].description_file(), "CMakeLists.txt");
        assert_eq!(BuildSystem::PROBE_ORDER[1].description_file(), "meson.build");
    }

    #[test]
    fn test_missing_tools_fail_construction() {
        let tools = Tools::default();

        for system in BuildSystem::PROBE_ORDER {
            let err = Backend::new(system, &tools).unwrap_err();
            assert!(matches!(err, BuildError::MissingPrerequisite { .. }));
        }
    }
}
