//! Byte-keyed disk cache with per-entry TTL.
//!
//! Each entry is a payload file plus a JSON metadata sidecar recording the
//! original key and expiry. The sidecar's key is compared on read, so two
//! keys that sanitize to the same file name degrade to a miss instead of
//! serving the wrong payload.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: String,
    expires_at_ms: Option<u64>,
}

/// Listing row for `confpack cache list`.
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    pub key: String,
    pub size: u64,
    pub expires_at_ms: Option<u64>,
}

impl DiskCache {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create cache dir: {}", dir.display()))?;
        Ok(DiskCache { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let (payload_path, meta_path) = self.entry_paths(key);
        let meta = match fs::read_to_string(&meta_path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to read cache meta: {}", meta_path.display()));
            }
        };
        let meta: EntryMeta = match serde_json::from_str(&meta) {
            Ok(meta) => meta,
            // Unreadable metadata is a miss, not an error.
            Err(_) => return Ok(None),
        };
        if meta.key != key {
            return Ok(None);
        }
        if let Some(expires_at_ms) = meta.expires_at_ms
            && now_ms() >= expires_at_ms
        {
            self.delete(key)?;
            return Ok(None);
        }
        match fs::read(&payload_path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err)
                .with_context(|| format!("Failed to read cache entry: {}", payload_path.display())),
        }
    }

    pub fn set(&self, key: &str, value: &[u8], expire: Option<Duration>) -> Result<()> {
        let (payload_path, meta_path) = self.entry_paths(key);
        let meta = EntryMeta {
            key: key.to_string(),
            expires_at_ms: expire.map(|ttl| now_ms() + ttl.as_millis() as u64),
        };
        fs::write(&payload_path, value)
            .with_context(|| format!("Failed to write cache entry: {}", payload_path.display()))?;
        fs::write(&meta_path, serde_json::to_vec_pretty(&meta)?)
            .with_context(|| format!("Failed to write cache meta: {}", meta_path.display()))?;
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        let (payload_path, meta_path) = self.entry_paths(key);
        remove_if_exists(&payload_path)?;
        remove_if_exists(&meta_path)?;
        Ok(())
    }

    /// All entries currently on disk, expired ones included.
    pub fn entries(&self) -> Result<Vec<CacheEntry>> {
        let mut entries = Vec::new();
        for item in fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read cache dir: {}", self.dir.display()))?
        {
            let path = item?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(data) = fs::read_to_string(&path) else {
                continue;
            };
            let Ok(meta) = serde_json::from_str::<EntryMeta>(&data) else {
                continue;
            };
            let payload = path.with_extension("").with_extension("bin");
            let size = fs::metadata(&payload).map(|m| m.len()).unwrap_or(0);
            entries.push(CacheEntry {
                key: meta.key,
                size,
                expires_at_ms: meta.expires_at_ms,
            });
        }
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    pub fn clear(&self) -> Result<usize> {
        let entries = self.entries()?;
        for entry in &entries {
            self.delete(&entry.key)?;
        }
        Ok(entries.len())
    }

    fn entry_paths(&self, key: &str) -> (PathBuf, PathBuf) {
        let stem = sanitize_key(key);
        (
            self.dir.join(format!("{stem}.bin")),
            self.dir.join(format!("{stem}.meta.json")),
        )
    }
}

fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => {
            Err(err).with_context(|| format!("Failed to delete cache file: {}", path.display()))
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
