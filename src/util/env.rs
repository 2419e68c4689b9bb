//! Process environment snapshot and external tool discovery.
//!
//! The environment is captured once at startup and passed explicitly to
//! every component that needs it, so nothing reads `std::env` behind the
//! caller's back and tests can inject fake search paths.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// The platform family the driver runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostFamily {
    Windows,
    Posix,
}

impl HostFamily {
    /// Family of the running process.
    pub fn current() -> Self {
        if cfg!(windows) {
            HostFamily::Windows
        } else {
            HostFamily::Posix
        }
    }

    pub fn is_windows(&self) -> bool {
        matches!(self, HostFamily::Windows)
    }
}

impl fmt::Display for HostFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostFamily::Windows => write!(f, "Windows"),
            HostFamily::Posix => write!(f, "Unix"),
        }
    }
}

/// Snapshot of the environment the driver runs in.
#[derive(Debug, Clone)]
pub struct Environment {
    vars: HashMap<String, String>,
    search_path: Option<OsString>,
    cwd: PathBuf,
    host: HostFamily,
}

impl Environment {
    /// Capture the current process environment.
    pub fn capture() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to determine current directory")?;
        Ok(Environment {
            vars: std::env::vars().collect(),
            search_path: std::env::var_os("PATH"),
            cwd,
            host: HostFamily::current(),
        })
    }

    /// Build an environment by hand.
    pub fn new(cwd: impl Into<PathBuf>, host: HostFamily) -> Self {
        Environment {
            vars: HashMap::new(),
            search_path: None,
            cwd: cwd.into(),
            host,
        }
    }

    /// Set a variable.
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Replace the executable search path.
    pub fn with_search_path(mut self, path: impl Into<OsString>) -> Self {
        self.search_path = Some(path.into());
        self
    }

    /// Look up a variable; empty values count as unset.
    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn host(&self) -> HostFamily {
        self.host
    }

    /// Locate an executable on the search path.
    ///
    /// Names containing a path separator are checked directly.
    pub fn find_executable(&self, name: &str) -> Option<PathBuf> {
        which::which_in(name, self.search_path.as_ref(), &self.cwd).ok()
    }
}

/// External build tools, located once and threaded through the pipeline.
#[derive(Debug, Clone, Default)]
pub struct Tools {
    pub cmake: Option<PathBuf>,
    pub ctest: Option<PathBuf>,
    pub meson: Option<PathBuf>,
    pub ninja: Option<PathBuf>,
}

impl Tools {
    /// Search the environment for every tool.
    pub fn discover(env: &Environment) -> Self {
        let tools = Tools {
            cmake: env.find_executable("cmake"),
            ctest: env.find_executable("ctest"),
            meson: env.find_executable("meson"),
            ninja: env.find_executable("ninja"),
        };
        tracing::debug!("discovered tools: {:?}", tools);
        tools
    }
}
