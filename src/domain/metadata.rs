//! Manifests and resolved library metadata.
//!
//! `h5p.json` sits at the top of every bundle and names its main library.
//! Each library directory carries its own `library.json`, which is the
//! authoritative source for everything in [`LibraryMetadata`].

use serde::{Deserialize, Deserializer, Serialize};

use super::identity::{DependencyRef, LibraryIdentity};

/// Top-level bundle manifest (`h5p.json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    pub main_library: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embed_types: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    #[serde(default)]
    pub preloaded_dependencies: Vec<DependencyRef>,
}

impl PackageManifest {
    /// Find the dependency entry describing the main library
    pub fn main_dependency(&self) -> Option<&DependencyRef> {
        self.preloaded_dependencies
            .iter()
            .find(|dep| dep.machine_name == self.main_library)
    }
}

/// Per-library manifest (`library.json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryManifest {
    pub machine_name: String,

    #[serde(default)]
    pub title: String,

    pub major_version: u32,
    pub minor_version: u32,

    #[serde(default)]
    pub patch_version: u32,

    #[serde(default, deserialize_with = "deserialize_flag")]
    pub runnable: bool,

    #[serde(default, deserialize_with = "deserialize_flag")]
    pub fullscreen: bool,

    #[serde(default)]
    pub embed_types: Vec<String>,

    #[serde(default)]
    pub preloaded_js: Vec<AssetPath>,

    #[serde(default)]
    pub preloaded_css: Vec<AssetPath>,

    #[serde(default)]
    pub preloaded_dependencies: Vec<DependencyRef>,

    #[serde(default)]
    pub editor_dependencies: Vec<DependencyRef>,

    #[serde(default)]
    pub dynamic_dependencies: Vec<DependencyRef>,
}

impl LibraryManifest {
    pub fn identity(&self) -> LibraryIdentity {
        LibraryIdentity::new(
            self.machine_name.clone(),
            self.major_version,
            self.minor_version,
            self.patch_version,
        )
    }
}

/// A `{ "path": "..." }` asset entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPath {
    pub path: String,
}

/// Real bundles write flags as `0`/`1`; accept booleans too.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(n) => n != 0,
    })
}

/// How a library was obtained during resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LibrarySource {
    /// Loaded from the on-disk bundle cache
    Cache,

    /// Found embedded inside an already fetched bundle
    Parent,

    /// Downloaded from the Hub
    Registry,
}

impl std::fmt::Display for LibrarySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LibrarySource::Cache => write!(f, "cache"),
            LibrarySource::Parent => write!(f, "parent"),
            LibrarySource::Registry => write!(f, "registry"),
        }
    }
}

/// A resolved node in the dependency graph
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryMetadata {
    pub identity: LibraryIdentity,
    pub title: String,
    pub runnable: bool,
    pub fullscreen: bool,
    pub embed_types: Vec<String>,
    pub preloaded_js: Vec<String>,
    pub preloaded_css: Vec<String>,
    pub preloaded_dependencies: Vec<DependencyRef>,
    pub editor_dependencies: Vec<DependencyRef>,
    pub dynamic_dependencies: Vec<DependencyRef>,

    /// Opaque `semantics.json`, if the library ships one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantics: Option<serde_json::Value>,

    /// Directory name inside the origin bundle (e.g. `H5P.InteractiveBook-1.8`)
    pub library_directory: String,

    /// Arena key of the bundle that physically contains `library_directory`
    pub origin: String,

    pub source: LibrarySource,
}

impl LibraryMetadata {
    /// Build metadata from a parsed `library.json`
    pub fn from_manifest(
        manifest: LibraryManifest,
        semantics: Option<serde_json::Value>,
        library_directory: impl Into<String>,
        origin: impl Into<String>,
        source: LibrarySource,
    ) -> Self {
        let identity = manifest.identity();
        Self {
            identity,
            title: manifest.title,
            runnable: manifest.runnable,
            fullscreen: manifest.fullscreen,
            embed_types: manifest.embed_types,
            preloaded_js: manifest.preloaded_js.into_iter().map(|a| a.path).collect(),
            preloaded_css: manifest.preloaded_css.into_iter().map(|a| a.path).collect(),
            preloaded_dependencies: manifest.preloaded_dependencies,
            editor_dependencies: manifest.editor_dependencies,
            dynamic_dependencies: manifest.dynamic_dependencies,
            semantics,
            library_directory: library_directory.into(),
            origin: origin.into(),
            source,
        }
    }

    /// Identity key (`machineName-major.minor`)
    pub fn key(&self) -> String {
        self.identity.key()
    }

    /// Dependencies followed during resolution, preloaded first
    pub fn traversed_dependencies(&self) -> impl Iterator<Item = &DependencyRef> {
        self.preloaded_dependencies
            .iter()
            .chain(self.editor_dependencies.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIBRARY_JSON: &str = r#"{
        "title": "Multiple Choice",
        "machineName": "H5P.MultiChoice",
        "majorVersion": 1,
        "minorVersion": 16,
        "patchVersion": 4,
        "runnable": 1,
        "fullscreen": 0,
        "embedTypes": ["iframe"],
        "preloadedJs": [{"path": "js/multichoice.js"}],
        "preloadedCss": [{"path": "css/multichoice.css"}],
        "preloadedDependencies": [
            {"machineName": "H5P.Image", "majorVersion": 1, "minorVersion": 1}
        ],
        "editorDependencies": [
            {"machineName": "H5PEditor.ShowWhen", "majorVersion": 1, "minorVersion": 0}
        ]
    }"#;

    #[test]
    fn test_library_manifest_parsing() {
        let manifest: LibraryManifest = serde_json::from_str(LIBRARY_JSON).unwrap();

        assert_eq!(manifest.identity().key(), "H5P.MultiChoice-1.16");
        assert!(manifest.runnable);
        assert!(!manifest.fullscreen);
        assert_eq!(manifest.preloaded_js[0].path, "js/multichoice.js");
        assert!(manifest.dynamic_dependencies.is_empty());
    }

    #[test]
    fn test_flags_accept_booleans() {
        let json = r#"{"machineName":"X","majorVersion":1,"minorVersion":0,"runnable":true}"#;
        let manifest: LibraryManifest = serde_json::from_str(json).unwrap();
        assert!(manifest.runnable);
        assert_eq!(manifest.patch_version, 0);
    }

    #[test]
    fn test_metadata_traverses_preloaded_then_editor() {
        let manifest: LibraryManifest = serde_json::from_str(LIBRARY_JSON).unwrap();
        let meta = LibraryMetadata::from_manifest(
            manifest,
            None,
            "H5P.MultiChoice-1.16",
            "H5P.MultiChoice-1.16",
            LibrarySource::Cache,
        );

        let names: Vec<_> = meta
            .traversed_dependencies()
            .map(|d| d.machine_name.as_str())
            .collect();
        assert_eq!(names, vec!["H5P.Image", "H5PEditor.ShowWhen"]);
        assert_eq!(meta.preloaded_css, vec!["css/multichoice.css".to_string()]);
    }

    #[test]
    fn test_package_manifest_main_dependency() {
        let json = r#"{
            "title": "Book",
            "mainLibrary": "H5P.InteractiveBook",
            "preloadedDependencies": [
                {"machineName": "H5P.Column", "majorVersion": 1, "minorVersion": 18},
                {"machineName": "H5P.InteractiveBook", "majorVersion": 1, "minorVersion": 8}
            ]
        }"#;
        let manifest: PackageManifest = serde_json::from_str(json).unwrap();
        let main = manifest.main_dependency().unwrap();
        assert_eq!(main.key(), "H5P.InteractiveBook-1.8");
    }
}
