//! Compiler toolchain resolution.
//!
//! Maps a vendor name to concrete compiler executables per language role,
//! applying user hints on top of the vendor defaults and checking the
//! vendor's environment preconditions.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{BuildError, Result};
use crate::util::env::Environment;

mod vendor;

pub use vendor::Vendor;
use vendor::Prerequisite;

/// A language role a compiler fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "C")]
    C,
    #[serde(rename = "CXX")]
    Cxx,
    #[serde(rename = "Fortran")]
    Fortran,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::C, Role::Cxx, Role::Fortran];

    /// Environment variable the build tools read this compiler from.
    pub fn env_var(&self) -> &'static str {
        match self {
            Role::C => "CC",
            Role::Cxx => "CXX",
            Role::Fortran => "FC",
        }
    }

    /// Language name used in CMake cache variables (`CMAKE_<lang>_COMPILER`).
    pub fn cmake_lang(&self) -> &'static str {
        match self {
            Role::C => "C",
            Role::Cxx => "CXX",
            Role::Fortran => "Fortran",
        }
    }

    /// Language name used in Meson introspection.
    pub fn meson_lang(&self) -> &'static str {
        match self {
            Role::C => "c",
            Role::Cxx => "cpp",
            Role::Fortran => "fortran",
        }
    }

    pub fn from_meson_lang(lang: &str) -> Option<Role> {
        Role::ALL.into_iter().find(|role| role.meson_lang() == lang)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::C => write!(f, "C"),
            Role::Cxx => write!(f, "C++"),
            Role::Fortran => write!(f, "Fortran"),
        }
    }
}

/// Compiler executable per role, as resolved for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainSpec {
    vendor: Vendor,
    compilers: BTreeMap<Role, String>,
}

impl ToolchainSpec {
    /// Build a spec directly. The C role should be present.
    pub fn new(vendor: Vendor, compilers: BTreeMap<Role, String>) -> Self {
        ToolchainSpec { vendor, compilers }
    }

    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    pub fn get(&self, role: Role) -> Option<&str> {
        self.compilers.get(&role).map(String::as_str)
    }

    pub fn compilers(&self) -> &BTreeMap<Role, String> {
        &self.compilers
    }

    /// True when the C compiler is Microsoft's `cl`.
    pub fn is_msvc(&self) -> bool {
        self.get(Role::C)
            .map(|cc| compiler_stem(cc) == "cl")
            .unwrap_or(false)
    }

    /// `CC`/`CXX`/`FC` variables for child processes.
    pub fn env_vars(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.compilers
            .iter()
            .map(|(role, exe)| (role.env_var(), exe.as_str()))
    }
}

/// Executable base name, without directories or a Windows executable suffix.
///
/// Only `.exe` is stripped so versioned names like `gcc-4.9` stay intact.
pub fn compiler_stem(exe: &str) -> String {
    let name = exe
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(exe)
        .trim();
    let lower = name.to_ascii_lowercase();
    match lower.strip_suffix(".exe") {
        Some(stem) => stem.to_string(),
        None => lower,
    }
}

/// Resolve a vendor name plus role hints to a toolchain.
///
/// Hints take precedence over vendor defaults. The C compiler and every
/// hinted compiler must be on the search path; default C++/Fortran
/// compilers that are missing are dropped so the build tool can decide.
pub fn resolve(
    vendor: &str,
    hints: &BTreeMap<Role, String>,
    env: &Environment,
) -> Result<ToolchainSpec> {
    let vendor: Vendor = vendor.parse()?;
    let entry = vendor.entry();

    for prerequisite in entry.prerequisites {
        check_prerequisite(vendor, prerequisite, env)?;
    }

    let defaults = match entry.windows_defaults {
        Some(windows) if env.host().is_windows() => windows,
        _ => entry.defaults,
    };

    let mut compilers = BTreeMap::new();
    for (role, name) in defaults {
        if hints.contains_key(role) {
            continue;
        }
        if *role != Role::C && env.find_executable(name).is_none() {
            tracing::warn!("{} compiler `{}` not found, leaving {} unset", role, name, role.env_var());
            continue;
        }
        compilers.insert(*role, (*name).to_string());
    }

    for (role, name) in hints {
        compilers.insert(*role, name.clone());
    }

    let cc = compilers
        .get(&Role::C)
        .filter(|cc| !cc.is_empty())
        .ok_or_else(|| BuildError::MissingPrerequisite {
            what: format!("no C compiler for vendor `{}`", vendor),
            hint: "pass --cc to select one".to_string(),
        })?;

    for (role, name) in &compilers {
        let required = *role == Role::C || hints.contains_key(role);
        if required && env.find_executable(name).is_none() {
            return Err(BuildError::MissingPrerequisite {
                what: format!("{} compiler `{}` not found", role, name),
                hint: format!("install `{}` or add its directory to PATH", name),
            });
        }
    }

    tracing::debug!("resolved {} toolchain: CC={} {:?}", vendor, cc, compilers);

    Ok(ToolchainSpec { vendor, compilers })
}

fn check_prerequisite(vendor: Vendor, prerequisite: &Prerequisite, env: &Environment) -> Result<()> {
    match prerequisite {
        Prerequisite::EnvVar { name, hint } => {
            if env.var(name).is_none() {
                return Err(BuildError::MissingPrerequisite {
                    what: format!("{} requires the {} environment variable", vendor, name),
                    hint: (*hint).to_string(),
                });
            }
        }
        Prerequisite::OnPath { program, hint } => {
            if env.find_executable(program).is_none() {
                return Err(BuildError::MissingPrerequisite {
                    what: format!("{} requires `{}` on PATH", vendor, program),
                    hint: (*hint).to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_support::{fake_env, install_fake_compilers};
    use crate::util::env::HostFamily;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_gnu_defaults() {
        let tmp = TempDir::new().unwrap();
        install_fake_compilers(tmp.path(), &["gcc", "g++", "gfortran"]);
        let env = fake_env(tmp.path());

        let spec = resolve("gnu", &BTreeMap::new(), &env).unwrap();
        assert_eq!(spec.vendor(), Vendor::Gnu);
        assert_eq!(spec.get(Role::C), Some("gcc"));
        assert_eq!(spec.get(Role::Cxx), Some("g++"));
        assert_eq!(spec.get(Role::Fortran), Some("gfortran"));
    }

    #[test]
    fn test_missing_optional_role_is_dropped() {
        let tmp = TempDir::new().unwrap();
        install_fake_compilers(tmp.path(), &["clang", "clang++"]);
        let env = fake_env(tmp.path());

        let spec = resolve("clang", &BTreeMap::new(), &env).unwrap();
        assert_eq!(spec.get(Role::C), Some("clang"));
        assert_eq!(spec.get(Role::Fortran), None);
    }

    #[test]
    fn test_missing_c_compiler_fails() {
        let tmp = TempDir::new().unwrap();
        let env = fake_env(tmp.path());

        let err = resolve("gnu", &BTreeMap::new(), &env).unwrap_err();
        assert!(matches!(err, BuildError::MissingPrerequisite { .. }));
    }

    #[test]
    fn test_hints_override_defaults() {
        let tmp = TempDir::new().unwrap();
        install_fake_compilers(tmp.path(), &["gcc", "g++", "ifort"]);
        let env = fake_env(tmp.path());

        let mut hints = BTreeMap::new();
        hints.insert(Role::Fortran, "ifort".to_string());
        let spec = resolve("gnu", &hints, &env).unwrap();

        assert_eq!(spec.get(Role::C), Some("gcc"));
        assert_eq!(spec.get(Role::Fortran), Some("ifort"));
    }

    #[test]
    fn test_missing_hinted_compiler_fails() {
        let tmp = TempDir::new().unwrap();
        install_fake_compilers(tmp.path(), &["gcc"]);
        let env = fake_env(tmp.path());

        let mut hints = BTreeMap::new();
        hints.insert(Role::Fortran, "ifx".to_string());
        let err = resolve("gnu", &hints, &env).unwrap_err();
        assert!(matches!(err, BuildError::MissingPrerequisite { what, .. } if what.contains("ifx")));
    }

    #[test]
    fn test_intel_requires_mklroot() {
        let tmp = TempDir::new().unwrap();
        install_fake_compilers(tmp.path(), &["icc", "icpc", "ifort"]);

        let err = resolve("intel", &BTreeMap::new(), &fake_env(tmp.path())).unwrap_err();
        assert!(matches!(err, BuildError::MissingPrerequisite { what, .. } if what.contains("MKLROOT")));

        let env = fake_env(tmp.path()).with_var("MKLROOT", "/opt/intel/mkl");
        let spec = resolve("intel", &BTreeMap::new(), &env).unwrap();
        assert_eq!(spec.get(Role::C), Some("icc"));
    }

    #[test]
    fn test_intel_windows_defaults() {
        let tmp = TempDir::new().unwrap();
        install_fake_compilers(tmp.path(), &["icl", "ifort"]);
        let env = Environment::new(tmp.path(), HostFamily::Windows)
            .with_search_path(tmp.path().as_os_str())
            .with_var("MKLROOT", "C:/mkl");

        let spec = resolve("intel", &BTreeMap::new(), &env).unwrap();
        assert_eq!(spec.get(Role::C), Some("icl"));
        assert_eq!(spec.get(Role::Cxx), Some("icl"));
    }

    #[test]
    fn test_msvc_requires_cl_on_path() {
        let tmp = TempDir::new().unwrap();
        let err = resolve("msvc", &BTreeMap::new(), &fake_env(tmp.path())).unwrap_err();
        assert!(matches!(err, BuildError::MissingPrerequisite { .. }));

        install_fake_compilers(tmp.path(), &["cl"]);
        let spec = resolve("msvc", &BTreeMap::new(), &fake_env(tmp.path())).unwrap();
        assert!(spec.is_msvc());
    }

    #[test]
    fn test_unknown_vendor() {
        let tmp = TempDir::new().unwrap();
        let err = resolve("borland", &BTreeMap::new(), &fake_env(tmp.path())).unwrap_err();
        assert!(matches!(err, BuildError::UnknownVendor { .. }));
    }

    #[test]
    fn test_every_vendor_yields_c_or_fails_cleanly() {
        let tmp = TempDir::new().unwrap();
        install_fake_compilers(tmp.path(), &["gcc", "clang", "clang-cl"]);
        let env = fake_env(tmp.path());

        for name in ["gnu", "clang", "clang-cl", "intel", "msvc", "pgi"] {
            match resolve(name, &BTreeMap::new(), &env) {
                Ok(spec) => assert!(!spec.get(Role::C).unwrap_or_default().is_empty()),
                Err(err) => assert!(matches!(err, BuildError::MissingPrerequisite { .. })),
            }
        }
    }

    #[test]
    fn test_compiler_stem() {
        assert_eq!(compiler_stem("/usr/bin/gcc"), "gcc");
        assert_eq!(compiler_stem("C:\\Program Files\\LLVM\\bin\\clang-cl.exe"), "clang-cl");
        assert_eq!(compiler_stem("gcc-4.9"), "gcc-4.9");
        assert_eq!(compiler_stem("CL.EXE"), "cl");
    }

    #[test]
    fn test_env_vars() {
        let mut compilers = BTreeMap::new();
        compilers.insert(Role::C, "gcc".to_string());
        compilers.insert(Role::Fortran, "gfortran".to_string());
        let spec = ToolchainSpec::new(Vendor::Gnu, compilers);

        let vars: Vec<_> = spec.env_vars().collect();
        assert_eq!(vars, vec![("CC", "gcc"), ("FC", "gfortran")]);
    }
}
