//! Domain types for bookbinder.
//!
//! This module contains the core data structures:
//! - Identity: library addressing and version preferences
//! - Metadata: bundle/library manifests and resolved graph nodes
//! - Package: media files and package-level info for assembly

pub mod identity;
pub mod metadata;
pub mod package;

// Re-export commonly used types
pub use identity::{identity_key, DependencyRef, LibraryIdentity, VersionPreference};
pub use metadata::{AssetPath, LibraryManifest, LibraryMetadata, LibrarySource, PackageManifest};
pub use package::{MediaFile, PackageInfo};
