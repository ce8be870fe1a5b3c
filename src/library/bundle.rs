//! Reading library metadata out of bundle archives.
//!
//! A bundle fetched for a library names that library in `h5p.json`
//! (`mainLibrary`); its directory is `{machineName}-{major}.{minor}`.
//! Bundles also vendor their dependencies as sibling directories, which
//! [`extract_from_parents`] can pick up when a dependency is not available
//! on its own.

use std::io::{Cursor, Read};

use glob::{MatchOptions, Pattern};
use serde::de::DeserializeOwned;
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

use super::arena::{BundleArena, RetainedBundle};
use crate::core::ResolveError;
use crate::domain::{
    LibraryManifest, LibraryMetadata, LibrarySource, PackageManifest, VersionPreference,
};

/// Top-level manifest path
pub const PACKAGE_MANIFEST: &str = "h5p.json";

/// Per-library manifest file name
pub const LIBRARY_MANIFEST: &str = "library.json";

/// Optional per-library schema file name
pub const SEMANTICS: &str = "semantics.json";

type Archive<'a> = ZipArchive<Cursor<&'a [u8]>>;

/// Parse a bundle fetched as its own top-level library.
///
/// `bundle` labels the archive in error messages (a file path or library
/// name). The returned metadata's `origin` is its own identity key, which
/// is where the caller is expected to retain `bytes`.
pub fn extract_metadata(
    bundle: &str,
    bytes: &[u8],
    source: LibrarySource,
) -> Result<LibraryMetadata, ResolveError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ResolveError::malformed(bundle, format!("not a readable archive: {}", e)))?;

    let manifest: PackageManifest = read_json(&mut archive, bundle, PACKAGE_MANIFEST)?
        .ok_or_else(|| ResolveError::malformed(bundle, format!("missing {}", PACKAGE_MANIFEST)))?;

    let main = manifest.main_dependency().ok_or_else(|| {
        ResolveError::malformed(
            bundle,
            format!(
                "mainLibrary '{}' is not listed in preloadedDependencies",
                manifest.main_library
            ),
        )
    })?;
    let directory = main.key();

    let (library, semantics) = read_library_dir(&mut archive, bundle, &directory)?;
    let origin = library.identity().key();

    Ok(LibraryMetadata::from_manifest(
        library, semantics, directory, origin, source,
    ))
}

/// Find `machine_name` embedded in any retained bundle.
///
/// Bundles are scanned linearly in retention order. With a preference, an
/// exact `{name}-{major}.{minor}` directory anywhere in the arena beats an
/// earlier loose `{name}-*` match. The directory name found in the parent is
/// kept as-is so asset paths stay consistent when copied into the package.
pub fn extract_from_parents(
    arena: &BundleArena,
    machine_name: &str,
    preferred: Option<VersionPreference>,
) -> Result<Option<LibraryMetadata>, ResolveError> {
    let Some((parent, directory)) = find_embedded_directory(arena, machine_name, preferred)?
    else {
        return Ok(None);
    };

    debug!(
        library = machine_name,
        parent = %parent.key,
        directory = %directory,
        "Found library embedded in parent bundle"
    );

    let mut archive = parent
        .archive()
        .map_err(|e| ResolveError::malformed(&parent.key, e.to_string()))?;
    let (library, semantics) = read_library_dir(&mut archive, &parent.key, &directory)?;

    Ok(Some(LibraryMetadata::from_manifest(
        library,
        semantics,
        directory,
        parent.key.clone(),
        LibrarySource::Parent,
    )))
}

/// Locate `{name}-*/library.json` across the arena
fn find_embedded_directory<'a>(
    arena: &'a BundleArena,
    machine_name: &str,
    preferred: Option<VersionPreference>,
) -> Result<Option<(&'a RetainedBundle, String)>, ResolveError> {
    if let Some(version) = preferred {
        let exact = format!(
            "{}-{}.{}/{}",
            machine_name, version.major, version.minor, LIBRARY_MANIFEST
        );
        for bundle in arena.iter() {
            if bundle.entry_names().iter().any(|name| *name == exact) {
                return Ok(Some((bundle, directory_of(&exact))));
            }
        }
    }

    let pattern = Pattern::new(&format!(
        "{}-*/{}",
        Pattern::escape(machine_name),
        LIBRARY_MANIFEST
    ))
    .map_err(|e| ResolveError::malformed(machine_name, e.to_string()))?;
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };

    for bundle in arena.iter() {
        if let Some(name) = bundle
            .entry_names()
            .iter()
            .find(|name| pattern.matches_with(name, options))
        {
            return Ok(Some((bundle, directory_of(name))));
        }
    }

    Ok(None)
}

fn directory_of(manifest_path: &str) -> String {
    manifest_path
        .rsplit_once('/')
        .map(|(dir, _)| dir.to_string())
        .unwrap_or_default()
}

/// Read `{directory}/library.json` and the optional `semantics.json`
fn read_library_dir(
    archive: &mut Archive<'_>,
    bundle: &str,
    directory: &str,
) -> Result<(LibraryManifest, Option<serde_json::Value>), ResolveError> {
    let manifest_path = format!("{}/{}", directory, LIBRARY_MANIFEST);
    let library: LibraryManifest = read_json(archive, bundle, &manifest_path)?
        .ok_or_else(|| ResolveError::malformed(bundle, format!("missing {}", manifest_path)))?;

    let semantics = read_json(archive, bundle, &format!("{}/{}", directory, SEMANTICS))?;

    Ok((library, semantics))
}

/// Read and parse a JSON entry; `None` if the entry does not exist
fn read_json<T: DeserializeOwned>(
    archive: &mut Archive<'_>,
    bundle: &str,
    path: &str,
) -> Result<Option<T>, ResolveError> {
    let mut file = match archive.by_name(path) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => {
            return Err(ResolveError::malformed(
                bundle,
                format!("cannot read {}: {}", path, e),
            ))
        }
    };

    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| ResolveError::malformed(bundle, format!("cannot read {}: {}", path, e)))?;

    // Some authoring tools write a UTF-8 BOM
    let content = content.trim_start_matches('\u{feff}');

    serde_json::from_str(content)
        .map(Some)
        .map_err(|e| ResolveError::malformed(bundle, format!("invalid {}: {}", path, e)))
}
