//! Errors raised while resolving and assembling packages.

use std::path::PathBuf;

use thiserror::Error;

use crate::adapters::FetchError;

/// One lookup strategy that was tried for a library and came up empty
#[derive(Debug)]
pub enum Attempt {
    /// No matching file in the bundle cache
    NotInCache,

    /// No retained bundle embeds the library
    NotEmbedded,

    /// The registry fetch failed
    Registry(FetchError),
}

impl std::fmt::Display for Attempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Attempt::NotInCache => write!(f, "not in cache"),
            Attempt::NotEmbedded => write!(f, "not embedded in any fetched parent"),
            Attempt::Registry(e) => write!(f, "{}", e),
        }
    }
}

fn describe_attempts(attempts: &[Attempt]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors that abort a dependency resolution
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Library {library} could not be resolved: {}", describe_attempts(.attempts))]
    DependencyNotFound {
        library: String,
        attempts: Vec<Attempt>,
    },

    #[error("Malformed bundle '{bundle}': {reason}")]
    MalformedBundle { bundle: String, reason: String },

    #[error("Cache I/O error at {}: {source}", .path.display())]
    CacheIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Resolution cancelled")]
    Cancelled,
}

impl ResolveError {
    pub(crate) fn malformed(bundle: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedBundle {
            bundle: bundle.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn cache_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::CacheIo {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised while writing the final package
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("No retained bundle '{origin}' for library {library}")]
    MissingBundle { library: String, origin: String },

    #[error("Root library {0} is not part of the resolution")]
    UnknownRoot(String),

    #[error("Duplicate archive entry: {0}")]
    DuplicateEntry(String),

    #[error("Invalid destination path: '{0}'")]
    InvalidPath(String),

    #[error("Content document is not valid JSON: {0}")]
    InvalidContent(#[source] serde_json::Error),

    #[error("Failed to serialize package manifest: {0}")]
    Manifest(#[source] serde_json::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
