//! Library bundle storage and extraction.
//!
//! # Storage Layout
//!
//! ```text
//! ~/.bookbinder/
//! └── libraries/                        # VersionedCacheStore
//!     ├── H5P.InteractiveBook-1.8.h5p
//!     └── H5P.MultiChoice-1.16.h5p
//! ```
//!
//! A bundle is a ZIP archive:
//!
//! ```text
//! h5p.json                              # mainLibrary + preloadedDependencies
//! H5P.MultiChoice-1.16/
//! │   ├── library.json
//! │   ├── semantics.json                # optional
//! │   └── js/, css/ ...
//! H5P.Image-1.1/                        # vendored dependency
//!     └── library.json
//! ```

pub mod arena;
pub mod bundle;
pub mod cache;

pub use arena::{BundleArena, RetainedBundle};
pub use bundle::{extract_from_parents, extract_metadata};
pub use cache::{CacheEntry, CacheVersion, CachedBundle, VersionedCacheStore};
