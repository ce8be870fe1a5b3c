//! Core resolution and assembly logic.
//!
//! This module contains:
//! - Resolver: dependency graph resolution over cache, parents and registry
//! - Assembler: final package archive construction
//! - Error: resolution and assembly error types

pub mod assembler;
pub mod error;
pub mod resolver;

// Re-export commonly used types
pub use assembler::{PackageAssembler, CONTENT_PATH};
pub use error::{AssemblyError, Attempt, ResolveError};
pub use resolver::{DependencyGraphResolver, Resolution};
