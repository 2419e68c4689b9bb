//! Project configuration file support.
//!
//! A project may carry an `mcbuild.toml` next to its build description:
//!
//! ```toml
//! [build]
//! build_dir = "build"
//! vendor = "intel"
//! build_system = "cmake"
//!
//! [compilers]
//! fc = "ifort"
//!
//! [libraries]
//! lapack = "~/libs/lapack"
//! ```
//!
//! Command-line values take precedence over everything in this file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// File name looked up in the source directory.
pub const CONFIG_FILE_NAME: &str = "mcbuild.toml";

/// Per-project configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Build settings
    pub build: BuildSettings,

    /// Compiler role hints
    pub compilers: CompilerHints,

    /// Library root directories, forwarded to CMake as `<NAME>_ROOT`
    pub libraries: BTreeMap<String, PathBuf>,
}

/// `[build]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Build directory, relative to the source directory
    pub build_dir: Option<PathBuf>,

    /// Compiler vendor
    pub vendor: Option<String>,

    /// Preferred build system (`cmake` or `meson`)
    pub build_system: Option<String>,

    /// Visual Studio generator to use with MSVC
    pub msvc_generator: Option<String>,

    /// Parallel job count for build and test steps
    pub jobs: Option<usize>,
}

/// `[compilers]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerHints {
    pub cc: Option<String>,
    pub cxx: Option<String>,
    pub fc: Option<String>,
}

impl ProjectConfig {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config: {}", path.display()))
    }

    /// Load the configuration if the file exists.
    pub fn load_if_exists(path: &Path) -> Result<Option<Self>> {
        if path.is_file() {
            Self::load(path).map(Some)
        } else {
            tracing::debug!("{} not found, using defaults", path.display());
            Ok(None)
        }
    }

    /// `-D<NAME>_ROOT=<dir>` definitions for every configured library.
    pub fn library_defines(&self) -> Vec<String> {
        self.libraries
            .iter()
            .map(|(name, dir)| {
                format!(
                    "-D{}_ROOT={}",
                    name.to_uppercase(),
                    crate::util::fs::expand_tilde(dir).display()
                )
            })
            .collect()
    }
}

/// Path of the project config file for a source directory.
pub fn project_config_path(source_dir: &Path) -> PathBuf {
    source_dir.join(CONFIG_FILE_NAME)
}
