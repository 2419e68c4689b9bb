//! CMake build directory state.
//!
//! CMake 3.14+ answers queries through the file API: a query file under
//! `.cmake/api/v1/query` makes the next configure run write reply files, and
//! the lexicographically greatest `index-*.json` in the reply directory is
//! the current one. Older CMake only leaves `CMakeCache.txt`, which is parsed
//! directly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use super::snapshot::SNAPSHOT_FILE;
use super::{ConfigurationStore, PersistedConfig};
use crate::toolchain::Role;
use crate::util::fs::{ensure_dir, modified_time, read_to_string};

pub const CACHE_FILE: &str = "CMakeCache.txt";
const FILES_DIR: &str = "CMakeFiles";
const API_DIR: &str = ".cmake/api/v1";

/// Reads CMake's cache and file-API replies.
#[derive(Debug, Clone, Copy)]
pub struct CMakeStore {
    file_api: bool,
}

impl CMakeStore {
    /// `file_api` should be false for CMake older than 3.14.
    pub fn new(file_api: bool) -> Self {
        CMakeStore { file_api }
    }

    fn query_dir(build_dir: &Path) -> PathBuf {
        build_dir.join(API_DIR).join("query")
    }

    fn reply_dir(build_dir: &Path) -> PathBuf {
        build_dir.join(API_DIR).join("reply")
    }

    fn read_file_api(&self, build_dir: &Path) -> Result<Option<(BTreeMap<String, String>, PathBuf)>> {
        let reply_dir = Self::reply_dir(build_dir);
        let Some(index_path) = latest_index(&reply_dir)? else {
            return Ok(None);
        };

        let index: ReplyIndex = serde_json::from_str(&read_to_string(&index_path)?)
            .with_context(|| format!("failed to parse {}", index_path.display()))?;
        let Some(cache_ref) = index.reply.cache else {
            tracing::debug!("{} has no cache-v2 reply", index_path.display());
            return Ok(None);
        };

        let cache_path = reply_dir.join(&cache_ref.json_file);
        let cache: CacheReply = serde_json::from_str(&read_to_string(&cache_path)?)
            .with_context(|| format!("failed to parse {}", cache_path.display()))?;

        let entries = cache
            .entries
            .into_iter()
            .map(|entry| (entry.name, entry.value))
            .collect();
        Ok(Some((entries, index_path)))
    }

    fn read_cache_file(&self, build_dir: &Path) -> Result<Option<(BTreeMap<String, String>, PathBuf)>> {
        let path = build_dir.join(CACHE_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let entries = parse_cache_file(&read_to_string(&path)?);
        Ok(Some((entries, path)))
    }
}

impl ConfigurationStore for CMakeStore {
    fn name(&self) -> &'static str {
        "CMake"
    }

    fn metadata_paths(&self, build_dir: &Path) -> Vec<PathBuf> {
        vec![
            build_dir.join(CACHE_FILE),
            build_dir.join(FILES_DIR),
            Self::reply_dir(build_dir),
        ]
    }

    fn snapshot_path(&self, build_dir: &Path) -> PathBuf {
        build_dir.join(FILES_DIR).join(SNAPSHOT_FILE)
    }

    fn prepare(&self, build_dir: &Path) -> Result<()> {
        if !self.file_api {
            return Ok(());
        }
        let query_dir = Self::query_dir(build_dir);
        ensure_dir(&query_dir)?;
        let query = query_dir.join("cache-v2");
        if !query.exists() {
            std::fs::write(&query, b"")
                .with_context(|| format!("failed to write {}", query.display()))?;
        }
        Ok(())
    }

    fn read_introspection(&self, build_dir: &Path) -> Option<PersistedConfig> {
        let from_api = if self.file_api {
            self.read_file_api(build_dir).unwrap_or_else(|e| {
                tracing::debug!("ignoring CMake file-API reply: {:#}", e);
                None
            })
        } else {
            None
        };

        let found = match from_api {
            Some(found) => Some(found),
            None => self.read_cache_file(build_dir).unwrap_or_else(|e| {
                tracing::debug!("ignoring {}: {:#}", CACHE_FILE, e);
                None
            }),
        };

        let (entries, source) = found?;
        Some(config_from_entries(&entries, modified_time(&source)))
    }

    fn introspection_present(&self, build_dir: &Path) -> bool {
        if self.file_api {
            matches!(latest_index(&Self::reply_dir(build_dir)), Ok(Some(_)))
        } else {
            build_dir.join(CACHE_FILE).is_file()
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReplyIndex {
    reply: ReplyObjects,
}

#[derive(Debug, Deserialize)]
struct ReplyObjects {
    #[serde(rename = "cache-v2")]
    cache: Option<ReplyRef>,
}

#[derive(Debug, Deserialize)]
struct ReplyRef {
    #[serde(rename = "jsonFile")]
    json_file: String,
}

#[derive(Debug, Deserialize)]
struct CacheReply {
    entries: Vec<CacheEntry>,
}

#[derive(Debug, Deserialize)]
struct CacheEntry {
    name: String,
    value: String,
}

/// Newest reply index in `reply_dir`, by file name.
fn latest_index(reply_dir: &Path) -> Result<Option<PathBuf>> {
    if !reply_dir.is_dir() {
        return Ok(None);
    }
    // The directory part is literal; only the file name is a pattern.
    let dir = glob::Pattern::escape(&reply_dir.to_string_lossy());
    let pattern = Path::new(&dir).join("index-*.json");
    let pattern = pattern.to_string_lossy();

    let latest = glob::glob(&pattern)
        .with_context(|| format!("invalid glob pattern: {}", pattern))?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .max_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(latest)
}

/// Parse `NAME:TYPE=VALUE` lines of a CMake cache file.
pub fn parse_cache_file(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with("//"))
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let name = key.split_once(':').map_or(key, |(name, _ty)| name);
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

fn config_from_entries(
    entries: &BTreeMap<String, String>,
    captured_at: Option<std::time::SystemTime>,
) -> PersistedConfig {
    let mut compilers = BTreeMap::new();
    for role in Role::ALL {
        let key = format!("CMAKE_{}_COMPILER", role.cmake_lang());
        if let Some(value) = entries.get(&key) {
            if !value.is_empty() && !value.ends_with("NOTFOUND") {
                compilers.insert(role, value.clone());
            }
        }
    }

    PersistedConfig {
        generator: entries
            .get("CMAKE_GENERATOR")
            .filter(|g| !g.is_empty())
            .cloned(),
        compilers,
        captured_at,
        args_digest: None,
    }
}
