//! Snapshot stamp kept alongside a backend's own metadata.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::PersistedConfig;
use crate::util::fs::{read_to_string, write_atomic};

/// File name of the stamp inside a backend's metadata directory.
pub const SNAPSHOT_FILE: &str = "mcbuild-snapshot.json";

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    #[serde(flatten)]
    config: PersistedConfig,
}

/// Load a stamp; missing, unreadable or foreign-version stamps read as `None`.
pub fn load(path: &Path) -> Option<PersistedConfig> {
    if !path.is_file() {
        return None;
    }

    let parsed = read_to_string(path).and_then(|text| {
        serde_json::from_str::<SnapshotFile>(&text)
            .with_context(|| format!("failed to parse {}", path.display()))
    });

    match parsed {
        Ok(file) if file.version == FORMAT_VERSION => Some(file.config),
        Ok(file) => {
            tracing::debug!("ignoring snapshot format {} in {}", file.version, path.display());
            None
        }
        Err(e) => {
            tracing::debug!("ignoring unreadable snapshot: {:#}", e);
            None
        }
    }
}

/// Atomically replace the stamp at `path`.
pub fn save(path: &Path, config: &PersistedConfig) -> Result<()> {
    let file = SnapshotFile {
        version: FORMAT_VERSION,
        config: config.clone(),
    };
    let json = serde_json::to_vec_pretty(&file).context("failed to serialize snapshot")?;
    write_atomic(path, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::Role;
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::TempDir;

    #[test]
    fn test_save_then_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("CMakeFiles").join(SNAPSHOT_FILE);

        let mut config = PersistedConfig {
            generator: Some("Unix Makefiles".into()),
            captured_at: Some(UNIX_EPOCH + Duration::from_secs(1_700_000_000)),
            args_digest: Some("abc123".into()),
            ..Default::default()
        };
        config.compilers.insert(Role::C, "gcc".into());

        save(&path, &config).unwrap();
        assert_eq!(load(&path), Some(config));
    }

    #[test]
    fn test_garbage_reads_as_absent() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(SNAPSHOT_FILE);
        std::fs::write(&path, "{ not json").unwrap();

        assert_eq!(load(&path), None);
    }

    #[test]
    fn test_other_version_reads_as_absent() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(SNAPSHOT_FILE);
        std::fs::write(&path, r#"{"version": 99, "generator": "Ninja", "compilers": {}}"#).unwrap();

        assert_eq!(load(&path), None);
    }
}
