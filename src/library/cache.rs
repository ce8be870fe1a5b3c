//! Disk cache of downloaded library bundles.
//!
//! Bundles are stored flat in one directory:
//!
//! ```text
//! <cache>/
//! ├── H5P.MultiChoice-1.16.h5p     # canonical versioned name
//! ├── H5P.Image-1.1.2.h5p          # versioned with patch (older writers)
//! └── H5P.Column.h5p               # legacy, unversioned
//! ```
//!
//! Lookups prefer versioned files over legacy ones. A missing directory or
//! file is a miss, not an error.

use std::path::{Path, PathBuf};

use glob::Pattern;
use tokio::fs;
use tracing::debug;

use crate::core::ResolveError;
use crate::domain::{LibraryIdentity, VersionPreference};

/// Default bundle file extension
pub const DEFAULT_EXTENSION: &str = "h5p";

/// Version parsed from a cache filename
///
/// Ordering is (major, minor, patch) with an absent patch ranking lowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CacheVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: Option<u32>,
}

impl CacheVersion {
    fn matches(&self, preferred: VersionPreference) -> bool {
        self.major == preferred.major && self.minor == preferred.minor
    }
}

impl std::fmt::Display for CacheVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.patch {
            Some(patch) => write!(f, "{}.{}.{}", self.major, self.minor, patch),
            None => write!(f, "{}.{}", self.major, self.minor),
        }
    }
}

/// A bundle loaded from the cache
#[derive(Debug, Clone)]
pub struct CachedBundle {
    pub path: PathBuf,

    /// `None` for a legacy unversioned file
    pub version: Option<CacheVersion>,

    pub bytes: Vec<u8>,
}

/// One file in the cache, as reported by [`VersionedCacheStore::list`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub machine_name: String,
    pub version: Option<CacheVersion>,
    pub path: PathBuf,
}

/// Versioned, disk-backed bundle cache
#[derive(Debug, Clone)]
pub struct VersionedCacheStore {
    dir: PathBuf,
    extension: String,
}

impl VersionedCacheStore {
    /// Create a store over `dir` using the default `.h5p` extension
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_extension(dir, DEFAULT_EXTENSION)
    }

    /// Create a store with a custom file extension
    pub fn with_extension(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into().trim_start_matches('.').to_string(),
        }
    }

    /// Cache directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Canonical filename for an identity (`{name}-{major}.{minor}.{ext}`)
    pub fn canonical_path(&self, identity: &LibraryIdentity) -> PathBuf {
        self.dir.join(format!(
            "{}-{}.{}.{}",
            identity.machine_name, identity.major_version, identity.minor_version, self.extension
        ))
    }

    fn legacy_path(&self, machine_name: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", machine_name, self.extension))
    }

    /// Load the best cached bundle for `machine_name`.
    ///
    /// With a preference, an exact major.minor match wins; otherwise (or if
    /// nothing matches exactly) the highest version present is used. The
    /// legacy unversioned file is only consulted when no versioned file exists.
    pub async fn try_load(
        &self,
        machine_name: &str,
        preferred: Option<VersionPreference>,
    ) -> Result<Option<CachedBundle>, ResolveError> {
        let candidates = self.versioned_candidates(machine_name).await?;

        let exact = preferred.and_then(|p| {
            candidates
                .iter()
                .filter(|(v, _)| v.matches(p))
                .max_by_key(|(v, _)| *v)
        });
        let chosen = exact.or_else(|| candidates.iter().max_by_key(|(v, _)| *v));

        let (path, version) = match chosen {
            Some((version, path)) => (path.clone(), Some(*version)),
            None => {
                let legacy = self.legacy_path(machine_name);
                if !fs::try_exists(&legacy)
                    .await
                    .map_err(|e| ResolveError::cache_io(&legacy, e))?
                {
                    debug!(library = machine_name, "Cache miss");
                    return Ok(None);
                }
                (legacy, None)
            }
        };

        let bytes = fs::read(&path)
            .await
            .map_err(|e| ResolveError::cache_io(&path, e))?;

        debug!(library = machine_name, path = %path.display(), "Cache hit");
        Ok(Some(CachedBundle {
            path,
            version,
            bytes,
        }))
    }

    /// Write a bundle under its canonical versioned filename
    pub async fn save(
        &self,
        identity: &LibraryIdentity,
        bytes: &[u8],
    ) -> Result<PathBuf, ResolveError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ResolveError::cache_io(&self.dir, e))?;

        let path = self.canonical_path(identity);
        fs::write(&path, bytes)
            .await
            .map_err(|e| ResolveError::cache_io(&path, e))?;

        debug!(library = %identity, path = %path.display(), "Saved bundle to cache");
        Ok(path)
    }

    /// List every bundle in the cache, sorted by name then version
    pub async fn list(&self) -> Result<Vec<CacheEntry>, ResolveError> {
        let mut entries: Vec<CacheEntry> = self
            .matching_files("*")
            .await?
            .into_iter()
            .filter_map(|path| {
                let stem = path.file_name()?.to_str()?.strip_suffix(&format!(".{}", self.extension))?;
                let (machine_name, version) = split_versioned_stem(stem);
                Some(CacheEntry {
                    machine_name: machine_name.to_string(),
                    version,
                    path: path.clone(),
                })
            })
            .collect();

        entries.sort_by(|a, b| {
            a.machine_name
                .cmp(&b.machine_name)
                .then(a.version.cmp(&b.version))
        });
        Ok(entries)
    }

    /// Versioned files for one library, with their parsed versions
    async fn versioned_candidates(
        &self,
        machine_name: &str,
    ) -> Result<Vec<(CacheVersion, PathBuf)>, ResolveError> {
        let prefix = format!("{}-", Pattern::escape(machine_name));
        let suffix = format!(".{}", self.extension);

        Ok(self
            .matching_files(&format!("{}*", prefix))
            .await?
            .into_iter()
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?;
                let version = name
                    .strip_prefix(machine_name)?
                    .strip_prefix('-')?
                    .strip_suffix(&suffix)
                    .and_then(parse_version)?;
                Some((version, path))
            })
            .collect())
    }

    /// Files in the cache directory whose stem matches `stem_pattern`
    async fn matching_files(&self, stem_pattern: &str) -> Result<Vec<PathBuf>, ResolveError> {
        let pattern = Pattern::new(&format!(
            "{}.{}",
            stem_pattern,
            Pattern::escape(&self.extension)
        ))
        .map_err(|e| {
            ResolveError::cache_io(
                &self.dir,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()),
            )
        })?;

        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ResolveError::cache_io(&self.dir, e)),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ResolveError::cache_io(&self.dir, e))?
        {
            let matched = entry
                .file_name()
                .to_str()
                .is_some_and(|name| pattern.matches(name));
            if !matched {
                continue;
            }

            let path = entry.path();
            let is_file = fs::metadata(&path)
                .await
                .map_err(|e| ResolveError::cache_io(&path, e))?
                .is_file();
            if is_file {
                paths.push(path);
            }
        }

        Ok(paths)
    }
}

/// Parse `major.minor` or `major.minor.patch`
fn parse_version(s: &str) -> Option<CacheVersion> {
    let parts: Vec<&str> = s.split('.').collect();
    let number = |p: &str| -> Option<u32> {
        if p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        p.parse().ok()
    };

    match parts.as_slice() {
        [major, minor] => Some(CacheVersion {
            major: number(major)?,
            minor: number(minor)?,
            patch: None,
        }),
        [major, minor, patch] => Some(CacheVersion {
            major: number(major)?,
            minor: number(minor)?,
            patch: Some(number(patch)?),
        }),
        _ => None,
    }
}

/// Split `H5P.Image-1.1` into name and version; legacy stems have no version
fn split_versioned_stem(stem: &str) -> (&str, Option<CacheVersion>) {
    if let Some((name, version)) = stem.rsplit_once('-') {
        if let Some(version) = parse_version(version) {
            return (name, Some(version));
        }
    }
    (stem, None)
}
