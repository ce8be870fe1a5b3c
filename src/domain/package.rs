//! Inputs to package assembly that come from the content-building side.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A media file to place into the final package
#[derive(Debug, Clone)]
pub struct MediaFile {
    /// Where the file was read from (diagnostics only)
    pub source_path: PathBuf,

    /// File contents
    pub bytes: Vec<u8>,

    /// Path inside the archive, e.g. `content/images/cover.png`
    pub destination_path: String,
}

impl MediaFile {
    /// Create a new media file
    pub fn new(
        source_path: impl Into<PathBuf>,
        bytes: Vec<u8>,
        destination_path: impl Into<String>,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            bytes,
            destination_path: destination_path.into(),
        }
    }
}

/// Values written into the generated `h5p.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageInfo {
    pub title: String,

    pub language: String,

    /// License code; `U` means undisclosed
    #[serde(default = "default_license")]
    pub license: String,
}

fn default_license() -> String {
    "U".to_string()
}

impl PackageInfo {
    /// Create package info with an undisclosed license
    pub fn new(title: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            language: language.into(),
            license: default_license(),
        }
    }

    /// Set the license code
    pub fn with_license(mut self, license: impl Into<String>) -> Self {
        self.license = license.into();
        self
    }
}
