//! bookbinder - Library dependency resolution and H5P package assembly
//!
//! Turns a root content-type library (e.g. `H5P.InteractiveBook`) into the
//! full set of libraries it needs, then packages them together with a
//! content document and media into a distributable `.h5p` archive.
//!
//! # Architecture
//!
//! Libraries are looked up with three strategies, in order:
//! - the versioned on-disk bundle cache
//! - libraries embedded in bundles already fetched in this run
//! - the remote Hub registry
//!
//! Resolution is all-or-nothing and tolerates dependency cycles.
//!
//! # Modules
//!
//! - `adapters`: External registries (Hub HTTP client)
//! - `core`: Resolution and assembly (Resolver, Assembler, errors)
//! - `domain`: Data structures (LibraryIdentity, LibraryMetadata, MediaFile)
//! - `library`: Bundle cache, arena and archive extraction
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Show what a content type pulls in
//! bookbinder resolve H5P.InteractiveBook
//!
//! # Build a package
//! bookbinder package -l H5P.InteractiveBook -c content.json -t "My Book" -o book.h5p
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod library;

// Re-export main types at crate root for convenience
pub use adapters::{FetchError, HubClient, Registry};
pub use crate::core::{
    AssemblyError, DependencyGraphResolver, PackageAssembler, Resolution, ResolveError,
};
pub use domain::{
    DependencyRef, LibraryIdentity, LibraryMetadata, LibrarySource, MediaFile, PackageInfo,
    VersionPreference,
};
pub use library::{BundleArena, VersionedCacheStore};
