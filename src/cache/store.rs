use std::fs::{self, File};
use std::path::{Path, PathBuf};
use memmap2::Mmap;
use tracing::{debug, info, warn};

use super::record;
use super::types::{CacheError, CacheKey, CachedResponse};

/// Disk-backed response store, partitioned by generation name.
///
/// Each generation is a directory under the store root holding one record
/// file per entry. The store only ever appends or replaces entries; whole
/// generations are deleted at activation, never individual files, so a
/// reader can never observe a half-deleted generation.
pub struct CacheStore {
    /// Root directory holding the generation directories
    root: PathBuf,
}

impl CacheStore {
    /// Creates a store rooted at the given directory.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Path of a generation directory.
    fn generation_dir(&self, generation: &str) -> PathBuf {
        self.root.join(generation)
    }

    /// Path of an entry within a generation.
    fn entry_path(&self, generation: &str, key: &CacheKey) -> PathBuf {
        self.generation_dir(generation).join(key.file_name())
    }

    /// Ensures a generation directory exists, creating it if necessary.
    fn ensure_generation_dir(&self, generation: &str) -> Result<PathBuf, CacheError> {
        let dir = self.generation_dir(generation);
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
            info!("Created cache generation: {}", generation);
        }
        Ok(dir)
    }

    /// Stores a response under a generation, replacing any previous entry.
    ///
    /// The record is written to a temporary file and renamed into place so
    /// a concurrent reader sees either the old entry or the new one.
    pub fn put(
        &self,
        generation: &str,
        key: &CacheKey,
        response: &CachedResponse,
    ) -> Result<(), CacheError> {
        let dir = self.ensure_generation_dir(generation)?;
        let bytes = record::encode_record(key, response)?;
        let path = dir.join(key.file_name());
        let staging = path.with_extension("tmp");
        fs::write(&staging, &bytes)?;
        fs::rename(&staging, &path)?;
        debug!("Stored {} bytes under {}/{}", bytes.len(), generation, key.file_name());
        Ok(())
    }

    /// Looks up an entry in a single generation.
    ///
    /// Unreadable records are discarded and reported as a miss rather than
    /// an error; the entry will simply be refetched.
    pub fn get(
        &self,
        generation: &str,
        key: &CacheKey,
    ) -> Result<Option<CachedResponse>, CacheError> {
        let path = self.entry_path(generation, key);
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(&path)?;
        let data = unsafe { Mmap::map(&file)? };
        let (stored_key, response) = match record::decode_record(&data) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Discarding unreadable cache record {}: {}", path.display(), e);
                let _ = fs::remove_file(&path);
                return Ok(None);
            }
        };

        // A colliding hash yields a record for some other identity; treat
        // it as a miss, never as the wrong body.
        if stored_key != *key {
            return Ok(None);
        }

        Ok(Some(response))
    }

    /// Looks the key up across generations in order, first hit wins.
    pub fn lookup(
        &self,
        generations: &[&str],
        key: &CacheKey,
    ) -> Result<Option<CachedResponse>, CacheError> {
        for generation in generations {
            if let Some(response) = self.get(generation, key)? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }

    /// Names of every generation currently on disk.
    pub fn list_generations(&self) -> Result<Vec<String>, CacheError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut names: Vec<String> = fs::read_dir(&self.root)?
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Deletes every generation whose name is not in `keep`, returning the
    /// names that were removed.
    pub fn activate(&self, keep: &[&str]) -> Result<Vec<String>, CacheError> {
        let mut removed = Vec::new();
        for name in self.list_generations()? {
            if keep.contains(&name.as_str()) {
                continue;
            }
            info!("Deleting superseded cache generation: {}", name);
            fs::remove_dir_all(self.generation_dir(&name))?;
            removed.push(name);
        }
        Ok(removed)
    }

    /// Deletes every generation, forcing a rebuild.
    pub fn clear_all(&self) -> Result<(), CacheError> {
        for name in self.list_generations()? {
            info!("Deleting cache generation: {}", name);
            fs::remove_dir_all(self.generation_dir(&name))?;
        }
        Ok(())
    }

    /// The store's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}
