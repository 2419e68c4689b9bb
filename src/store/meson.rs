//! Meson build directory state.
//!
//! Meson writes introspection JSON to `meson-info/` on every setup. Compilers
//! are recovered from the per-source entries of `intro-targets.json`, the
//! backend from the `backend` option in `intro-buildoptions.json`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use super::snapshot::SNAPSHOT_FILE;
use super::{ConfigurationStore, PersistedConfig};
use crate::toolchain::Role;
use crate::util::fs::{modified_time, read_to_string};

const INFO_DIR: &str = "meson-info";
const PRIVATE_DIR: &str = "meson-private";
const TARGETS_FILE: &str = "intro-targets.json";
const OPTIONS_FILE: &str = "intro-buildoptions.json";

/// Generated file whose presence means the directory has been set up.
pub const BUILD_NINJA: &str = "build.ninja";

/// Reads Meson's introspection files.
#[derive(Debug, Clone, Copy, Default)]
pub struct MesonStore;

impl MesonStore {
    pub fn new() -> Self {
        MesonStore
    }

    fn targets_path(build_dir: &Path) -> PathBuf {
        build_dir.join(INFO_DIR).join(TARGETS_FILE)
    }
}

impl ConfigurationStore for MesonStore {
    fn name(&self) -> &'static str {
        "Meson"
    }

    fn metadata_paths(&self, build_dir: &Path) -> Vec<PathBuf> {
        vec![
            build_dir.join(INFO_DIR),
            build_dir.join(PRIVATE_DIR),
            build_dir.join(BUILD_NINJA),
            build_dir.join(".ninja_log"),
            build_dir.join(".ninja_deps"),
        ]
    }

    fn snapshot_path(&self, build_dir: &Path) -> PathBuf {
        build_dir.join(PRIVATE_DIR).join(SNAPSHOT_FILE)
    }

    fn read_introspection(&self, build_dir: &Path) -> Option<PersistedConfig> {
        let targets_path = Self::targets_path(build_dir);
        if !targets_path.is_file() {
            return None;
        }

        let compilers = match read_compilers(&targets_path) {
            Ok(compilers) => compilers,
            Err(e) => {
                tracing::debug!("ignoring Meson introspection: {:#}", e);
                return None;
            }
        };

        let generator = read_backend(&build_dir.join(INFO_DIR).join(OPTIONS_FILE))
            .unwrap_or_else(|e| {
                tracing::debug!("Meson backend unknown: {:#}", e);
                None
            });

        Some(PersistedConfig {
            generator,
            compilers,
            captured_at: modified_time(&targets_path),
            args_digest: None,
        })
    }

    fn introspection_present(&self, build_dir: &Path) -> bool {
        Self::targets_path(build_dir).is_file()
    }
}

#[derive(Debug, Deserialize)]
struct IntroTarget {
    #[serde(default)]
    target_sources: Vec<TargetSource>,
}

#[derive(Debug, Deserialize)]
struct TargetSource {
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    compiler: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BuildOption {
    name: String,
    value: serde_json::Value,
}

/// One compiler per language, scanning every target's sources.
fn read_compilers(path: &Path) -> Result<BTreeMap<Role, String>> {
    let targets: Vec<IntroTarget> = serde_json::from_str(&read_to_string(path)?)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    let mut compilers = BTreeMap::new();
    for source in targets.iter().flat_map(|t| &t.target_sources) {
        let Some(role) = source.language.as_deref().and_then(Role::from_meson_lang) else {
            continue;
        };
        if let Some(exe) = source.compiler.first() {
            compilers.entry(role).or_insert_with(|| exe.clone());
        }
    }
    Ok(compilers)
}

fn read_backend(path: &Path) -> Result<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }
    let options: Vec<BuildOption> = serde_json::from_str(&read_to_string(path)?)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    Ok(options
        .into_iter()
        .find(|opt| opt.name == "backend")
        .and_then(|opt| opt.value.as_str().map(backend_display_name)))
}

/// Meson backend option value to the generator name used elsewhere.
pub fn backend_display_name(backend: &str) -> String {
    match backend {
        "ninja" => "Ninja".to_string(),
        "xcode" => "Xcode".to_string(),
        other if other.starts_with("vs") => format!("Visual Studio ({})", other),
        other => other.to_string(),
    }
}
