//! Final package assembly.
//!
//! Output layout:
//!
//! ```text
//! h5p.json                    # generated manifest
//! <libraryDirectory>/...      # every resolved library, copied verbatim
//! content/content.json        # content document
//! content/<media>             # media files at their destination paths
//! ```
//!
//! Library entries are copied raw (compressed bytes untouched). Generated
//! entries use a fixed timestamp and permissions, and libraries are written
//! in identity-key order, so identical inputs give identical archives.

use std::collections::HashSet;
use std::io::{Cursor, Write};

use tracing::{debug, info, instrument};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::domain::{MediaFile, PackageInfo, PackageManifest};
use crate::library::bundle::PACKAGE_MANIFEST;

use super::error::AssemblyError;
use super::resolver::Resolution;

/// Path of the content document inside the package
pub const CONTENT_PATH: &str = "content/content.json";

/// Embed type used when the main library declares none
const DEFAULT_EMBED_TYPE: &str = "div";

/// Builds the distributable package archive
#[derive(Debug, Clone)]
pub struct PackageAssembler {
    compression: CompressionMethod,
    level: Option<i32>,
}

impl Default for PackageAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageAssembler {
    /// Deflate at the default level
    pub fn new() -> Self {
        Self {
            compression: CompressionMethod::Deflated,
            level: None,
        }
    }

    /// Override compression of generated entries
    pub fn with_compression(mut self, compression: CompressionMethod, level: Option<i32>) -> Self {
        self.compression = compression;
        self.level = level;
        self
    }

    fn file_options(&self) -> FileOptions {
        FileOptions::default()
            .compression_method(self.compression)
            .compression_level(self.level)
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(0o644)
    }

    /// Assemble the package and return the archive bytes
    #[instrument(skip_all, fields(root = %resolution.root, title = %info.title))]
    pub fn assemble(
        &self,
        content: &str,
        resolution: &Resolution,
        info: &PackageInfo,
        media: &[MediaFile],
    ) -> Result<Vec<u8>, AssemblyError> {
        serde_json::from_str::<serde_json::Value>(content).map_err(AssemblyError::InvalidContent)?;

        let manifest = self.manifest(resolution, info)?;
        let manifest_json =
            serde_json::to_vec_pretty(&manifest).map_err(AssemblyError::Manifest)?;

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let mut written: HashSet<String> = HashSet::new();

        self.write_entry(&mut writer, &mut written, PACKAGE_MANIFEST, &manifest_json)?;

        for library in resolution.iter() {
            let bundle = resolution.arena.get(&library.origin).ok_or_else(|| {
                AssemblyError::MissingBundle {
                    library: library.key(),
                    origin: library.origin.clone(),
                }
            })?;

            let mut archive = bundle.archive()?;
            let prefix = format!("{}/", library.library_directory);
            let mut copied = 0usize;

            for i in 0..archive.len() {
                let file = archive.by_index_raw(i)?;
                if !file.name().starts_with(&prefix) {
                    continue;
                }
                if !written.insert(file.name().to_string()) {
                    return Err(AssemblyError::DuplicateEntry(file.name().to_string()));
                }
                writer.raw_copy_file(file)?;
                copied += 1;
            }

            debug!(library = %library.identity, origin = %bundle.key, entries = copied, "Copied library");
        }

        self.write_entry(&mut writer, &mut written, CONTENT_PATH, content.as_bytes())?;

        for file in media {
            let path = normalize_destination(&file.destination_path)?;
            self.write_entry(&mut writer, &mut written, &path, &file.bytes)?;
        }

        let bytes = writer.finish()?.into_inner();
        info!(
            libraries = resolution.len(),
            media = media.len(),
            bytes = bytes.len(),
            "Package assembled"
        );
        Ok(bytes)
    }

    /// Generated `h5p.json`
    fn manifest(
        &self,
        resolution: &Resolution,
        info: &PackageInfo,
    ) -> Result<PackageManifest, AssemblyError> {
        let root = resolution
            .root_metadata()
            .ok_or_else(|| AssemblyError::UnknownRoot(resolution.root.clone()))?;

        let embed_types = if root.embed_types.is_empty() {
            vec![DEFAULT_EMBED_TYPE.to_string()]
        } else {
            root.embed_types.clone()
        };

        Ok(PackageManifest {
            title: Some(info.title.clone()),
            language: Some(info.language.clone()),
            main_library: root.identity.machine_name.clone(),
            embed_types,
            license: Some(info.license.clone()),
            preloaded_dependencies: resolution
                .iter()
                .map(|library| library.identity.as_reference())
                .collect(),
        })
    }

    fn write_entry(
        &self,
        writer: &mut ZipWriter<Cursor<Vec<u8>>>,
        written: &mut HashSet<String>,
        path: &str,
        bytes: &[u8],
    ) -> Result<(), AssemblyError> {
        if !written.insert(path.to_string()) {
            return Err(AssemblyError::DuplicateEntry(path.to_string()));
        }
        writer.start_file(path, self.file_options())?;
        writer.write_all(bytes)?;
        Ok(())
    }
}

/// Reject absolute or escaping destination paths; use `/` separators
fn normalize_destination(path: &str) -> Result<String, AssemblyError> {
    let normalized = path.replace('\\', "/");
    let invalid = normalized.is_empty()
        || normalized.starts_with('/')
        || normalized.ends_with('/')
        || normalized
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");

    if invalid {
        return Err(AssemblyError::InvalidPath(path.to_string()));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_destination() {
        assert_eq!(
            normalize_destination("content/images/a.png").unwrap(),
            "content/images/a.png"
        );
        assert_eq!(
            normalize_destination("content\\audio\\b.mp3").unwrap(),
            "content/audio/b.mp3"
        );
        assert!(normalize_destination("/etc/passwd").is_err());
        assert!(normalize_destination("content/../h5p.json").is_err());
        assert!(normalize_destination("content//a.png").is_err());
        assert!(normalize_destination("").is_err());
    }
}
