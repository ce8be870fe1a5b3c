//! Library identities and version preferences.
//!
//! A library is addressed by `machineName-major.minor`. The patch version is
//! carried along for display but never takes part in identity, so two bundles
//! that differ only in patch level are treated as the same library.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Full identity of a library as declared in its `library.json`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryIdentity {
    pub machine_name: String,
    pub major_version: u32,
    pub minor_version: u32,
    #[serde(default)]
    pub patch_version: u32,
}

impl LibraryIdentity {
    /// Create a new identity
    pub fn new(machine_name: impl Into<String>, major: u32, minor: u32, patch: u32) -> Self {
        Self {
            machine_name: machine_name.into(),
            major_version: major,
            minor_version: minor,
            patch_version: patch,
        }
    }

    /// Deduplication key (`H5P.MultiChoice-1.16`). Patch is ignored.
    pub fn key(&self) -> String {
        identity_key(&self.machine_name, self.major_version, self.minor_version)
    }

    /// Short dependency reference (drops title/patch)
    pub fn as_reference(&self) -> DependencyRef {
        DependencyRef {
            machine_name: self.machine_name.clone(),
            major_version: self.major_version,
            minor_version: self.minor_version,
        }
    }
}

impl fmt::Display for LibraryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}.{}.{}",
            self.machine_name, self.major_version, self.minor_version, self.patch_version
        )
    }
}

/// Build an identity key from its parts
pub fn identity_key(machine_name: &str, major: u32, minor: u32) -> String {
    format!("{}-{}.{}", machine_name, major, minor)
}

/// A dependency entry as it appears in `h5p.json` and `library.json`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyRef {
    pub machine_name: String,
    pub major_version: u32,
    pub minor_version: u32,
}

impl DependencyRef {
    /// Create a new dependency reference
    pub fn new(machine_name: impl Into<String>, major: u32, minor: u32) -> Self {
        Self {
            machine_name: machine_name.into(),
            major_version: major,
            minor_version: minor,
        }
    }

    /// Identity key this reference points at
    pub fn key(&self) -> String {
        identity_key(&self.machine_name, self.major_version, self.minor_version)
    }

    /// The requested `major.minor` pair
    pub fn version(&self) -> VersionPreference {
        VersionPreference::new(self.major_version, self.minor_version)
    }
}

impl fmt::Display for DependencyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}.{}",
            self.machine_name, self.major_version, self.minor_version
        )
    }
}

/// A requested `major.minor` version.
///
/// Ordering is lexicographic on (major, minor), so `1.16 > 1.5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionPreference {
    pub major: u32,
    pub minor: u32,
}

impl VersionPreference {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for VersionPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for VersionPreference {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let mut parts = s.trim().split('.');
        let (Some(major), Some(minor)) = (parts.next(), parts.next()) else {
            anyhow::bail!("Version must look like MAJOR.MINOR, got '{}'", s);
        };
        // A trailing patch component is accepted and ignored.
        if parts.clone().count() > 1 {
            anyhow::bail!("Version has too many components: '{}'", s);
        }
        Ok(Self {
            major: major
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid major version in '{}'", s))?,
            minor: minor
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid minor version in '{}'", s))?,
        })
    }
}
