//! Dependency graph resolution.
//!
//! Computes the deduplicated transitive closure of a root library's
//! `preloadedDependencies` and `editorDependencies`. Each library is looked
//! up with three strategies, strictly in order:
//!
//! 1. the versioned disk cache
//! 2. libraries embedded in bundles already fetched during this run
//! 3. the registry (Hub)
//!
//! Only when all three come up empty does resolution fail, and it fails as
//! a whole: there is no partial result.
//!
//! # Cycles
//!
//! Sibling libraries routinely reference each other. A node that is reached
//! again while it is still being visited is skipped, not reported. This is
//! intentional; do not turn it into an error.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::adapters::Registry;
use crate::domain::{identity_key, DependencyRef, LibraryMetadata, LibrarySource, VersionPreference};
use crate::library::{extract_from_parents, extract_metadata, BundleArena, VersionedCacheStore};

use super::error::{Attempt, ResolveError};

/// Outcome of one resolution run.
///
/// Owns the bundle arena; the retained bytes are released when the
/// resolution is dropped, normally right after assembly.
#[derive(Debug)]
pub struct Resolution {
    /// Identity key of the root library
    pub root: String,

    /// Resolved libraries by identity key
    pub libraries: BTreeMap<String, LibraryMetadata>,

    /// Raw bytes of every bundle fetched as a top-level library
    pub arena: BundleArena,
}

impl Resolution {
    /// Metadata of the root library
    pub fn root_metadata(&self) -> Option<&LibraryMetadata> {
        self.libraries.get(&self.root)
    }

    /// Look up a resolved library by identity key
    pub fn get(&self, key: &str) -> Option<&LibraryMetadata> {
        self.libraries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.libraries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }

    /// Resolved libraries in identity-key order
    pub fn iter(&self) -> impl Iterator<Item = &LibraryMetadata> {
        self.libraries.values()
    }
}

/// Per-node traversal state. Unvisited nodes have no entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Visiting,
    Resolved,
}

/// A library to look up
#[derive(Debug, Clone)]
struct Request {
    machine_name: String,
    preferred: Option<VersionPreference>,
}

impl Request {
    /// Key used for the node state map before the identity is known
    fn state_key(&self) -> String {
        match self.preferred {
            Some(v) => identity_key(&self.machine_name, v.major, v.minor),
            None => self.machine_name.clone(),
        }
    }

    fn label(&self) -> String {
        match self.preferred {
            Some(v) => format!("{} {}", self.machine_name, v),
            None => format!("{} (latest)", self.machine_name),
        }
    }
}

impl From<&DependencyRef> for Request {
    fn from(dep: &DependencyRef) -> Self {
        Self {
            machine_name: dep.machine_name.clone(),
            preferred: Some(dep.version()),
        }
    }
}

/// Work stack frame for the depth-first walk
enum Frame {
    /// Look up a library and schedule its dependencies
    Enter(Request),

    /// All dependencies of a node are done; mark these state keys resolved
    Exit(Vec<String>),
}

/// Resolves one root library into a [`Resolution`].
///
/// Construct a resolver per run; [`resolve`](Self::resolve) consumes it, so
/// node states and retained bundles never leak between runs.
pub struct DependencyGraphResolver {
    cache: VersionedCacheStore,
    registry: Arc<dyn Registry>,
    cancel: CancellationToken,
    save_downloads: bool,
    states: HashMap<String, NodeState>,
    libraries: BTreeMap<String, LibraryMetadata>,
    arena: BundleArena,
}

impl DependencyGraphResolver {
    /// Create a resolver over a cache and a registry
    pub fn new(cache: VersionedCacheStore, registry: Arc<dyn Registry>) -> Self {
        Self {
            cache,
            registry,
            cancel: CancellationToken::new(),
            save_downloads: true,
            states: HashMap::new(),
            libraries: BTreeMap::new(),
            arena: BundleArena::new(),
        }
    }

    /// Use an external cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Whether registry downloads are written back to the cache (default: true)
    pub fn save_downloads(mut self, save: bool) -> Self {
        self.save_downloads = save;
        self
    }

    /// Resolve `machine_name` and everything it depends on
    #[instrument(skip(self, preferred), fields(root = machine_name))]
    pub async fn resolve(
        mut self,
        machine_name: &str,
        preferred: Option<VersionPreference>,
    ) -> Result<Resolution, ResolveError> {
        let mut root: Option<String> = None;
        let mut stack = vec![Frame::Enter(Request {
            machine_name: machine_name.to_string(),
            preferred,
        })];

        while let Some(frame) = stack.pop() {
            let request = match frame {
                Frame::Exit(keys) => {
                    for key in keys {
                        self.states.insert(key, NodeState::Resolved);
                    }
                    continue;
                }
                Frame::Enter(request) => request,
            };

            if self.cancel.is_cancelled() {
                return Err(ResolveError::Cancelled);
            }

            let request_key = request.state_key();
            match self.states.get(&request_key) {
                Some(NodeState::Resolved) => continue,
                Some(NodeState::Visiting) => {
                    debug!(library = %request_key, "Dependency cycle, skipping");
                    continue;
                }
                None => {}
            }
            self.states.insert(request_key.clone(), NodeState::Visiting);

            let metadata = self.fetch(&request).await?;
            let key = metadata.key();
            root.get_or_insert_with(|| key.clone());

            let mut exit_keys = vec![request_key];
            if key != exit_keys[0] {
                // Version fallback or unversioned request: the real identity
                // may already be known under its own key.
                if self.states.contains_key(&key) {
                    stack.push(Frame::Exit(exit_keys));
                    continue;
                }
                self.states.insert(key.clone(), NodeState::Visiting);
                exit_keys.push(key.clone());
            }

            let dependencies: Vec<Request> =
                metadata.traversed_dependencies().map(Request::from).collect();

            info!(
                library = %metadata.identity,
                source = %metadata.source,
                directory = %metadata.library_directory,
                dependencies = dependencies.len(),
                "Resolved library"
            );
            self.libraries.insert(key, metadata);

            stack.push(Frame::Exit(exit_keys));
            for dependency in dependencies.into_iter().rev() {
                stack.push(Frame::Enter(dependency));
            }
        }

        let root = root.ok_or_else(|| ResolveError::DependencyNotFound {
            library: machine_name.to_string(),
            attempts: Vec::new(),
        })?;

        info!(
            libraries = self.libraries.len(),
            bundles = self.arena.len(),
            retained_bytes = self.arena.total_bytes(),
            "Resolution complete"
        );

        Ok(Resolution {
            root,
            libraries: self.libraries,
            arena: self.arena,
        })
    }

    /// Get one library: cache, then parent bundles, then the registry
    #[instrument(skip(self, request), fields(library = %request.label()))]
    async fn fetch(&mut self, request: &Request) -> Result<LibraryMetadata, ResolveError> {
        let name = request.machine_name.as_str();
        let mut attempts = Vec::with_capacity(3);

        if let Some(hit) = self.cache.try_load(name, request.preferred).await? {
            let label = hit.path.display().to_string();
            let metadata = extract_metadata(&label, &hit.bytes, LibrarySource::Cache)?;
            self.arena.retain(metadata.origin.clone(), hit.bytes)?;
            return Ok(metadata);
        }
        attempts.push(Attempt::NotInCache);

        if let Some(metadata) = extract_from_parents(&self.arena, name, request.preferred)? {
            return Ok(metadata);
        }
        attempts.push(Attempt::NotEmbedded);
        debug!("Not cached or embedded, trying registry");

        let fetched = tokio::select! {
            _ = self.cancel.cancelled() => return Err(ResolveError::Cancelled),
            result = self.registry.fetch(name) => result,
        };

        match fetched {
            Ok(bytes) => {
                let metadata = extract_metadata(name, &bytes, LibrarySource::Registry)?;
                if self.save_downloads {
                    self.cache.save(&metadata.identity, &bytes).await?;
                }
                self.arena.retain(metadata.origin.clone(), bytes)?;
                Ok(metadata)
            }
            Err(e) => {
                warn!(registry = self.registry.name(), error = %e, "Registry fetch failed");
                attempts.push(Attempt::Registry(e));
                Err(ResolveError::DependencyNotFound {
                    library: request.label(),
                    attempts,
                })
            }
        }
    }
}
