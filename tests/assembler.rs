//! Assembler Integration Tests
//!
//! Package layout, verbatim library copies, determinism and failure modes.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use bookbinder::core::CONTENT_PATH;
use bookbinder::{
    AssemblyError, BundleArena, DependencyGraphResolver, MediaFile, PackageAssembler, PackageInfo,
    Resolution, VersionedCacheStore,
};
use common::{bundle, cache_bundle, cache_lib, entry_names, read_entry, Lib, MemoryRegistry};
use tempfile::TempDir;

const CONTENT: &str = r#"{"chapters":[{"title":"One"}]}"#;

/// Book -> Text (embedded in Book's bundle), Quiz -> Image
async fn resolve_book(temp: &TempDir) -> Resolution {
    let text = Lib::new("H5P.Text", 1, 1);
    cache_bundle(
        temp.path(),
        "H5P.Book-1.8.h5p",
        &bundle(
            &Lib::new("H5P.Book", 1, 8)
                .dep("H5P.Text", 1, 1)
                .dep("H5P.Quiz", 1, 16),
            &[&text],
        ),
    );
    cache_lib(temp.path(), &Lib::new("H5P.Quiz", 1, 16).dep("H5P.Image", 1, 1));
    cache_lib(temp.path(), &Lib::new("H5P.Image", 1, 1));

    DependencyGraphResolver::new(
        VersionedCacheStore::new(temp.path()),
        Arc::new(MemoryRegistry::new()),
    )
    .resolve("H5P.Book", None)
    .await
    .unwrap()
}

fn media() -> Vec<MediaFile> {
    vec![
        MediaFile::new("cover.png", vec![1, 2, 3], "content/images/cover.png"),
        MediaFile::new("intro.mp3", vec![4, 5], "content/audio/intro.mp3"),
    ]
}

#[tokio::test]
async fn test_package_layout() {
    let temp = TempDir::new().unwrap();
    let resolution = resolve_book(&temp).await;
    let info = PackageInfo::new("My Book", "de");

    let package = PackageAssembler::new()
        .assemble(CONTENT, &resolution, &info, &media())
        .unwrap();

    let names = entry_names(&package);
    assert_eq!(
        names,
        vec![
            "h5p.json",
            "H5P.Book-1.8/library.json",
            "H5P.Book-1.8/js/main.js",
            "H5P.Image-1.1/library.json",
            "H5P.Image-1.1/js/main.js",
            "H5P.Quiz-1.16/library.json",
            "H5P.Quiz-1.16/js/main.js",
            "H5P.Text-1.1/library.json",
            "H5P.Text-1.1/js/main.js",
            "content/content.json",
            "content/images/cover.png",
            "content/audio/intro.mp3",
        ]
    );

    let manifest: serde_json::Value =
        serde_json::from_slice(&read_entry(&package, "h5p.json")).unwrap();
    assert_eq!(manifest["title"], "My Book");
    assert_eq!(manifest["language"], "de");
    assert_eq!(manifest["mainLibrary"], "H5P.Book");
    assert_eq!(manifest["license"], "U");
    assert_eq!(manifest["embedTypes"][0], "div");
    assert_eq!(manifest["preloadedDependencies"].as_array().unwrap().len(), 4);

    assert_eq!(read_entry(&package, CONTENT_PATH), CONTENT.as_bytes());
    assert_eq!(read_entry(&package, "content/audio/intro.mp3"), vec![4, 5]);
}

#[tokio::test]
async fn test_embedded_library_copied_verbatim() {
    let temp = TempDir::new().unwrap();
    let resolution = resolve_book(&temp).await;

    let package = PackageAssembler::new()
        .assemble(CONTENT, &resolution, &PackageInfo::new("Book", "en"), &[])
        .unwrap();

    let parent = resolution.arena.get("H5P.Book-1.8").unwrap();
    for name in ["H5P.Text-1.1/library.json", "H5P.Text-1.1/js/main.js"] {
        assert_eq!(read_entry(&package, name), read_entry(parent.bytes(), name));
    }
}

#[tokio::test]
async fn test_assembly_is_deterministic() {
    let temp = TempDir::new().unwrap();
    let resolution = resolve_book(&temp).await;
    let info = PackageInfo::new("My Book", "en");
    let assembler = PackageAssembler::new();

    let first = assembler
        .assemble(CONTENT, &resolution, &info, &media())
        .unwrap();
    let second = assembler
        .assemble(CONTENT, &resolution, &info, &media())
        .unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_missing_retained_bundle() {
    let temp = TempDir::new().unwrap();
    let resolved = resolve_book(&temp).await;

    // Same libraries, but the arena has been emptied
    let resolution = Resolution {
        root: resolved.root.clone(),
        libraries: resolved.libraries.clone(),
        arena: BundleArena::new(),
    };

    let err = PackageAssembler::new()
        .assemble(CONTENT, &resolution, &PackageInfo::new("Book", "en"), &[])
        .unwrap_err();

    assert!(matches!(err, AssemblyError::MissingBundle { .. }));
}

#[tokio::test]
async fn test_unknown_root() {
    let resolution = Resolution {
        root: "Nothing-1.0".to_string(),
        libraries: BTreeMap::new(),
        arena: BundleArena::new(),
    };

    let err = PackageAssembler::new()
        .assemble(CONTENT, &resolution, &PackageInfo::new("Book", "en"), &[])
        .unwrap_err();

    assert!(matches!(err, AssemblyError::UnknownRoot(_)));
}

#[tokio::test]
async fn test_invalid_content_rejected() {
    let temp = TempDir::new().unwrap();
    let resolution = resolve_book(&temp).await;

    let err = PackageAssembler::new()
        .assemble("{not json", &resolution, &PackageInfo::new("Book", "en"), &[])
        .unwrap_err();

    assert!(matches!(err, AssemblyError::InvalidContent(_)));
}

#[tokio::test]
async fn test_media_path_collisions() {
    let temp = TempDir::new().unwrap();
    let resolution = resolve_book(&temp).await;
    let info = PackageInfo::new("Book", "en");

    let clash = vec![MediaFile::new("x.json", b"{}".to_vec(), CONTENT_PATH)];
    let err = PackageAssembler::new()
        .assemble(CONTENT, &resolution, &info, &clash)
        .unwrap_err();
    assert!(matches!(err, AssemblyError::DuplicateEntry(path) if path == CONTENT_PATH));

    let escaping = vec![MediaFile::new("x.png", vec![0], "../x.png")];
    let err = PackageAssembler::new()
        .assemble(CONTENT, &resolution, &info, &escaping)
        .unwrap_err();
    assert!(matches!(err, AssemblyError::InvalidPath(_)));
}
