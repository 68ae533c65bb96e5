// src/watch/hash.rs

//! Content hashes used to drop change events for files whose bytes did not
//! actually change (editor touch-saves, `git checkout` of identical content).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use blake3::Hasher;
use tracing::debug;

use crate::fs::FileSystem;

/// Compute the hash of a single file.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let bytes = fs.read(path)?;
    let mut hasher = Hasher::new();
    hasher.update(&bytes);
    Ok(hasher.finalize().to_hex().to_string())
}

/// Last known hash per watched file, kept in memory for the lifetime of a
/// subscription.
#[derive(Debug, Default)]
pub struct ContentHashes {
    hashes: HashMap<PathBuf, String>,
}

impl ContentHashes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current hash of each file without reporting changes.
    pub fn seed<'a, I>(&mut self, fs: &dyn FileSystem, paths: I)
    where
        I: IntoIterator<Item = &'a PathBuf>,
    {
        for path in paths {
            match compute_file_hash(fs, path) {
                Ok(hash) => {
                    self.hashes.insert(path.clone(), hash);
                }
                Err(err) => debug!(path = %path.display(), error = %err, "could not hash file"),
            }
        }
    }

    /// Update the stored hash and report whether the content differs.
    ///
    /// A file that can no longer be read (removed, renamed away) counts as
    /// changed and is forgotten.
    pub fn has_changed(&mut self, fs: &dyn FileSystem, path: &Path) -> bool {
        match compute_file_hash(fs, path) {
            Ok(hash) => match self.hashes.insert(path.to_path_buf(), hash.clone()) {
                Some(previous) => previous != hash,
                None => true,
            },
            Err(_) => {
                self.hashes.remove(path);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}
