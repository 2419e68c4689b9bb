//! Compiler vendor table.
//!
//! Vendor defaults are data: adding a vendor means adding a row to
//! [`VENDORS`], not new control flow.

use std::fmt;
use std::str::FromStr;

use crate::errors::BuildError;

use super::Role;

/// A toolchain family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vendor {
    Gnu,
    Clang,
    /// Clang with the MSVC-compatible driver interface.
    ClangCl,
    Intel,
    Msvc,
    Pgi,
}

impl Vendor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::Gnu => "gnu",
            Vendor::Clang => "clang",
            Vendor::ClangCl => "clang-cl",
            Vendor::Intel => "intel",
            Vendor::Msvc => "msvc",
            Vendor::Pgi => "pgi",
        }
    }

    /// Table row for this vendor.
    pub(crate) fn entry(&self) -> &'static VendorEntry {
        VENDORS
            .iter()
            .find(|entry| entry.vendor == *self)
            .unwrap_or(&VENDORS[0])
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vendor {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        VENDORS
            .iter()
            .find(|entry| entry.names.contains(&wanted.as_str()))
            .map(|entry| entry.vendor)
            .ok_or_else(|| BuildError::UnknownVendor {
                vendor: s.to_string(),
            })
    }
}

/// Environment state a vendor needs before it can be resolved.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Prerequisite {
    /// A variable that must be set and non-empty.
    EnvVar {
        name: &'static str,
        hint: &'static str,
    },
    /// A program that must be on the search path.
    OnPath {
        program: &'static str,
        hint: &'static str,
    },
}

/// Default compiler names and preconditions for one vendor.
#[derive(Debug)]
pub(crate) struct VendorEntry {
    pub vendor: Vendor,
    /// Accepted spellings on the command line.
    pub names: &'static [&'static str],
    pub defaults: &'static [(Role, &'static str)],
    /// Replaces `defaults` on Windows hosts when present.
    pub windows_defaults: Option<&'static [(Role, &'static str)]>,
    pub prerequisites: &'static [Prerequisite],
}

const INTEL_ENV_HINT: &str = "run `compilervars.bat intel64` (Windows) or \
                              `source compilervars.sh intel64` before building";

pub(crate) static VENDORS: &[VendorEntry] = &[
    VendorEntry {
        vendor: Vendor::Gnu,
        names: &["gnu", "gcc"],
        defaults: &[(Role::C, "gcc"), (Role::Cxx, "g++"), (Role::Fortran, "gfortran")],
        windows_defaults: None,
        prerequisites: &[],
    },
    VendorEntry {
        vendor: Vendor::Clang,
        names: &["clang"],
        defaults: &[(Role::C, "clang"), (Role::Cxx, "clang++"), (Role::Fortran, "flang")],
        windows_defaults: None,
        prerequisites: &[],
    },
    VendorEntry {
        vendor: Vendor::ClangCl,
        names: &["clang-cl", "clangcl"],
        defaults: &[
            (Role::C, "clang-cl"),
            (Role::Cxx, "clang-cl"),
            (Role::Fortran, "flang"),
        ],
        windows_defaults: None,
        prerequisites: &[],
    },
    VendorEntry {
        vendor: Vendor::Intel,
        names: &["intel"],
        defaults: &[(Role::C, "icc"), (Role::Cxx, "icpc"), (Role::Fortran, "ifort")],
        windows_defaults: Some(&[(Role::C, "icl"), (Role::Cxx, "icl"), (Role::Fortran, "ifort")]),
        prerequisites: &[Prerequisite::EnvVar {
            name: "MKLROOT",
            hint: INTEL_ENV_HINT,
        }],
    },
    VendorEntry {
        vendor: Vendor::Msvc,
        names: &["msvc"],
        defaults: &[(Role::C, "cl"), (Role::Cxx, "cl")],
        windows_defaults: None,
        prerequisites: &[Prerequisite::OnPath {
            program: "cl",
            hint: "run from a Developer Command Prompt so cl.exe is on PATH",
        }],
    },
    VendorEntry {
        vendor: Vendor::Pgi,
        names: &["pgi"],
        defaults: &[(Role::C, "pgcc"), (Role::Cxx, "pgc++"), (Role::Fortran, "pgfortran")],
        // pgc++ is not available on Windows; pair with MSVC for C++.
        windows_defaults: Some(&[(Role::C, "pgcc"), (Role::Cxx, "cl"), (Role::Fortran, "pgfortran")]),
        prerequisites: &[
            Prerequisite::OnPath {
                program: "pgcc",
                hint: "add the PGI compiler bin directory to PATH",
            },
            Prerequisite::OnPath {
                program: "pgfortran",
                hint: "add the PGI compiler bin directory to PATH",
            },
        ],
    },
];
