//! Persisted build configuration.
//!
//! Each backend records what it was generated with in its own introspection
//! format. A [`ConfigurationStore`] reads that data back into a
//! [`PersistedConfig`] and keeps a small snapshot stamp of its own next to
//! it, so the staleness check never depends on format details.
//!
//! Reading is soft: a missing or unparsable record reads as absent, because
//! a corrupt cache must never block a rebuild.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::errors::{BuildError, Result};
use crate::toolchain::Role;

pub mod cmake;
pub mod meson;
pub mod snapshot;

pub use cmake::CMakeStore;
pub use meson::MesonStore;

/// Configuration a build directory was last generated with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedConfig {
    /// Generator the backend used (e.g. `Unix Makefiles`, `Ninja`)
    pub generator: Option<String>,

    /// Compiler per role, as recorded (may be a full path)
    pub compilers: BTreeMap<Role, String>,

    /// When the record was captured
    pub captured_at: Option<SystemTime>,

    /// Digest of the generation arguments
    pub args_digest: Option<String>,
}

impl PersistedConfig {
    /// Fill fields this record lacks from `other`.
    ///
    /// The capture time becomes the later of the two.
    pub fn fill_from(&mut self, other: PersistedConfig) {
        if self.generator.is_none() {
            self.generator = other.generator;
        }
        for (role, exe) in other.compilers {
            self.compilers.entry(role).or_insert(exe);
        }
        self.captured_at = match (self.captured_at, other.captured_at) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        if self.args_digest.is_none() {
            self.args_digest = other.args_digest;
        }
    }
}

/// Backend-specific access to the persisted configuration of a build dir.
pub trait ConfigurationStore {
    /// Short name of the backend format, for messages.
    fn name(&self) -> &'static str;

    /// Files and directories holding generated metadata.
    ///
    /// Wiping removes exactly these; anything else in the build directory
    /// is left alone.
    fn metadata_paths(&self, build_dir: &Path) -> Vec<PathBuf>;

    /// Location of the snapshot stamp.
    fn snapshot_path(&self, build_dir: &Path) -> PathBuf;

    /// Ask the backend to emit introspection data on its next run.
    fn prepare(&self, _build_dir: &Path) -> anyhow::Result<()> {
        Ok(())
    }

    /// Parse the backend's own introspection data.
    fn read_introspection(&self, build_dir: &Path) -> Option<PersistedConfig>;

    /// True when the last generate run left introspection data behind.
    fn introspection_present(&self, build_dir: &Path) -> bool;

    /// Read the persisted configuration, or `None` when absent or unreadable.
    fn read(&self, build_dir: &Path) -> Option<PersistedConfig> {
        let introspected = self.read_introspection(build_dir);
        let stamped = snapshot::load(&self.snapshot_path(build_dir));

        match (introspected, stamped) {
            (Some(mut config), Some(stamp)) => {
                config.fill_from(stamp);
                Some(config)
            }
            (config, stamp) => config.or(stamp),
        }
    }

    /// Record `config` after a successful generate run.
    ///
    /// Fails with [`BuildError::PersistError`] when the generate run did not
    /// produce the backend's introspection data. The stale stamp is removed
    /// in that case so the next invocation regenerates.
    fn write(&self, build_dir: &Path, config: &PersistedConfig) -> Result<()> {
        let stamp = self.snapshot_path(build_dir);

        if !self.introspection_present(build_dir) {
            if let Err(e) = crate::util::fs::remove_file_if_exists(&stamp) {
                tracing::debug!("could not drop stale snapshot: {:#}", e);
            }
            return Err(BuildError::PersistError {
                build_dir: build_dir.to_path_buf(),
                reason: format!("{} introspection data was not produced", self.name()),
            });
        }

        snapshot::save(&stamp, config).map_err(|e| BuildError::PersistError {
            build_dir: build_dir.to_path_buf(),
            reason: format!("{:#}", e),
        })
    }
}
