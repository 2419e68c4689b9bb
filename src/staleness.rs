//! Decide whether a configured build directory can be reused.
//!
//! The checks run in a fixed order and stop at the first hit: cheap
//! structural checks first, then platform and compiler-family checks, then
//! per-role compiler identity. A family mismatch implies per-role mismatches,
//! and reporting the family change is the more useful message.
//!
//! Everything here is best-effort string matching against what third-party
//! tools recorded. Partially populated records are treated as fresh for the
//! fields they lack.

use std::fmt;
use std::time::SystemTime;

use crate::store::PersistedConfig;
use crate::toolchain::{compiler_stem, Role, ToolchainSpec};
use crate::util::env::HostFamily;

/// Why a build directory must be wiped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WipeReason {
    UserRequested,
    DescriptionChanged,
    OsChanged { from: HostFamily, to: HostFamily },
    CompilerFamilyChanged { from: String, to: String },
    GeneratorChanged { from: String, to: String },
    CompilerChanged { role: Role, old: String, new: String },
}

impl fmt::Display for WipeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WipeReason::UserRequested => write!(f, "user requested"),
            WipeReason::DescriptionChanged => write!(f, "build description changed"),
            WipeReason::OsChanged { from, to } => {
                write!(f, "operating system changed: {} => {}", from, to)
            }
            WipeReason::CompilerFamilyChanged { from, to } => {
                write!(f, "compiler family changed: {} => {}", from, to)
            }
            WipeReason::GeneratorChanged { from, to } => {
                write!(f, "generator changed: {} => {}", from, to)
            }
            WipeReason::CompilerChanged { role, old, new } => {
                write!(f, "{} compiler changed: {} => {}", role, old, new)
            }
        }
    }
}

/// Outcome of [`decide`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalenessVerdict {
    pub must_wipe: bool,
    pub reason: Option<WipeReason>,
}

impl StalenessVerdict {
    pub fn reuse() -> Self {
        StalenessVerdict {
            must_wipe: false,
            reason: None,
        }
    }

    pub fn wipe(reason: WipeReason) -> Self {
        StalenessVerdict {
            must_wipe: true,
            reason: Some(reason),
        }
    }

    /// Human-readable reason, if any.
    pub fn reason_text(&self) -> Option<String> {
        self.reason.as_ref().map(ToString::to_string)
    }
}

/// Platform family a generator produces build files for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorFamily {
    Posix,
    Windows,
    /// Works on either (e.g. Ninja).
    Any,
}

/// Classify a generator name.
pub fn generator_family(generator: &str) -> GeneratorFamily {
    const WINDOWS_PREFIXES: [&str; 6] = [
        "MinGW",
        "MSYS",
        "NMake",
        "Visual Studio",
        "Borland",
        "Watcom",
    ];
    if generator.starts_with("Unix") || generator.starts_with("Xcode") {
        GeneratorFamily::Posix
    } else if WINDOWS_PREFIXES.iter().any(|p| generator.starts_with(p)) {
        GeneratorFamily::Windows
    } else {
        GeneratorFamily::Any
    }
}

/// True for IDE generators that drive the MSVC toolchain.
pub fn is_msvc_generator(generator: &str) -> bool {
    generator.starts_with("Visual")
}

/// Decide whether the build directory must be wiped before generating.
///
/// Pure function of its inputs.
pub fn decide(
    requested: &ToolchainSpec,
    generator_hint: Option<&str>,
    persisted: Option<&PersistedConfig>,
    force_wipe: bool,
    description_mtime: Option<SystemTime>,
    host: HostFamily,
) -> StalenessVerdict {
    if force_wipe {
        return StalenessVerdict::wipe(WipeReason::UserRequested);
    }

    let Some(persisted) = persisted else {
        return StalenessVerdict::reuse();
    };

    if let (Some(modified), Some(captured)) = (description_mtime, persisted.captured_at) {
        if modified > captured {
            return StalenessVerdict::wipe(WipeReason::DescriptionChanged);
        }
    }

    if let Some(generator) = persisted.generator.as_deref() {
        match (generator_family(generator), host) {
            (GeneratorFamily::Posix, HostFamily::Windows) => {
                return StalenessVerdict::wipe(WipeReason::OsChanged {
                    from: HostFamily::Posix,
                    to: HostFamily::Windows,
                });
            }
            (GeneratorFamily::Windows, HostFamily::Posix) => {
                return StalenessVerdict::wipe(WipeReason::OsChanged {
                    from: HostFamily::Windows,
                    to: HostFamily::Posix,
                });
            }
            _ => {}
        }

        let requested_cc = requested.get(Role::C).unwrap_or_default();
        if is_msvc_generator(generator) && !requested.is_msvc() {
            return StalenessVerdict::wipe(WipeReason::CompilerFamilyChanged {
                from: "MSVC".to_string(),
                to: requested_cc.to_string(),
            });
        }
        // An explicit non-Visual Studio generator may drive cl.
        let wants_visual_studio = generator_hint.map_or(true, is_msvc_generator);
        if requested.is_msvc() && wants_visual_studio && !is_msvc_generator(generator) {
            return StalenessVerdict::wipe(WipeReason::CompilerFamilyChanged {
                from: generator.to_string(),
                to: "MSVC".to_string(),
            });
        }
        if let Some(hint) = generator_hint {
            if hint != generator {
                return StalenessVerdict::wipe(WipeReason::GeneratorChanged {
                    from: generator.to_string(),
                    to: hint.to_string(),
                });
            }
        }
    }

    for (role, wanted) in requested.compilers() {
        let Some(recorded) = persisted.compilers.get(role) else {
            continue;
        };
        let old = compiler_stem(recorded);
        let new = compiler_stem(wanted);
        if old != new {
            return StalenessVerdict::wipe(WipeReason::CompilerChanged {
                role: *role,
                old,
                new,
            });
        }
    }

    StalenessVerdict::reuse()
}
