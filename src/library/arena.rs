//! Raw bundle bytes retained for one resolution run.
//!
//! Every bundle fetched as a top-level library is kept here until the
//! package has been assembled. Parent extraction scans these bundles for
//! embedded libraries, and assembly copies library directories out of them.
//! The arena is owned by a [`crate::core::Resolution`] and dropped with it.

use std::io::Cursor;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use zip::ZipArchive;

use crate::core::ResolveError;

/// A bundle held in the arena
#[derive(Debug, Clone)]
pub struct RetainedBundle {
    /// Arena key (identity key of the bundle's main library)
    pub key: String,

    bytes: Arc<[u8]>,

    /// Archive entry names, in archive order
    entry_names: Vec<String>,
}

impl RetainedBundle {
    /// Raw archive bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Entry names in archive order
    pub fn entry_names(&self) -> &[String] {
        &self.entry_names
    }

    /// Open the archive for reading
    pub fn archive(&self) -> zip::result::ZipResult<ZipArchive<Cursor<&[u8]>>> {
        ZipArchive::new(Cursor::new(self.bytes()))
    }

    /// SHA-256 of the raw bytes, hex-encoded
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        hex::encode(hasher.finalize())
    }
}

/// Insertion-ordered store of retained bundles
#[derive(Debug, Default)]
pub struct BundleArena {
    bundles: Vec<RetainedBundle>,
}

impl BundleArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Retain a bundle under `key`. A key that is already present keeps its
    /// original bytes.
    pub fn retain(&mut self, key: impl Into<String>, bytes: Vec<u8>) -> Result<(), ResolveError> {
        let key = key.into();
        if self.get(&key).is_some() {
            return Ok(());
        }

        let entry_names = archive_entry_names(&bytes)
            .map_err(|e| ResolveError::malformed(&key, e.to_string()))?;

        self.bundles.push(RetainedBundle {
            key,
            bytes: Arc::from(bytes),
            entry_names,
        });
        Ok(())
    }

    /// Look up a bundle by key
    pub fn get(&self, key: &str) -> Option<&RetainedBundle> {
        self.bundles.iter().find(|b| b.key == key)
    }

    /// Bundles in retention order
    pub fn iter(&self) -> impl Iterator<Item = &RetainedBundle> {
        self.bundles.iter()
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// Total retained bytes
    pub fn total_bytes(&self) -> usize {
        self.bundles.iter().map(|b| b.bytes.len()).sum()
    }
}

/// Entry names by archive index (`file_names()` iterates a hash map)
fn archive_entry_names(bytes: &[u8]) -> zip::result::ZipResult<Vec<String>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    (0..archive.len())
        .map(|i| archive.by_index_raw(i).map(|file| file.name().to_string()))
        .collect()
}
