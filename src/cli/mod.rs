//! Command-line interface for bookbinder.
//!
//! Provides commands for resolving library dependencies, assembling
//! packages, inspecting the bundle cache and showing configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config;
use crate::core::{DependencyGraphResolver, PackageAssembler, Resolution};
use crate::domain::{MediaFile, PackageInfo, VersionPreference};

pub mod cache;

/// bookbinder - Library resolution and package assembly for H5P books
#[derive(Parser, Debug)]
#[command(name = "bookbinder")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve a library and print its dependency set
    Resolve {
        /// Root library machine name (e.g. H5P.InteractiveBook)
        library: String,

        /// Preferred MAJOR.MINOR version of the root library
        #[arg(short, long)]
        version: Option<VersionPreference>,

        /// Print the resolved set as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve a library and assemble a package around a content document
    Package {
        /// Root library machine name
        #[arg(short, long)]
        library: String,

        /// Preferred MAJOR.MINOR version of the root library
        #[arg(long)]
        version: Option<VersionPreference>,

        /// Content document (JSON)
        #[arg(short, long)]
        content: PathBuf,

        /// Package title
        #[arg(short, long)]
        title: String,

        /// Package language
        #[arg(long, default_value = "en")]
        language: String,

        /// License code written to h5p.json
        #[arg(long, default_value = "U")]
        license: String,

        /// Directory of media files, added under content/
        #[arg(short, long)]
        media_dir: Option<PathBuf>,

        /// Output package path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Inspect the library bundle cache
    Cache {
        #[command(subcommand)]
        command: cache::CacheCommands,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Resolve {
                library,
                version,
                json,
            } => resolve_library(&library, version, json).await,
            Commands::Package {
                library,
                version,
                content,
                title,
                language,
                license,
                media_dir,
                output,
            } => {
                let info = PackageInfo::new(title, language).with_license(license);
                build_package(&library, version, &content, info, media_dir, &output).await
            }
            Commands::Cache { command } => cache::execute(command).await,
            Commands::Config => show_config().await,
        }
    }
}

/// Cancellation token that fires on Ctrl-C
fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let guard = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling resolution");
            guard.cancel();
        }
    });
    token
}

/// Run a resolution with the configured cache and Hub
async fn run_resolution(
    library: &str,
    version: Option<VersionPreference>,
) -> Result<Resolution> {
    let config = config::config()?;
    let registry = Arc::new(config.hub_client()?);

    let resolution = DependencyGraphResolver::new(config.cache_store(), registry)
        .with_cancellation(ctrl_c_token())
        .resolve(library, version)
        .await
        .with_context(|| format!("Failed to resolve dependencies of {}", library))?;

    Ok(resolution)
}

/// Resolve a library and print the result
async fn resolve_library(
    library: &str,
    version: Option<VersionPreference>,
    json: bool,
) -> Result<()> {
    let resolution = run_resolution(library, version).await?;

    if json {
        let libraries: Vec<_> = resolution.iter().collect();
        println!("{}", serde_json::to_string_pretty(&libraries)?);
        return Ok(());
    }

    println!(
        "{:<36} {:<9} {:<36} {:<14}",
        "LIBRARY", "SOURCE", "ORIGIN", "DIGEST"
    );
    println!("{}", "-".repeat(98));

    for meta in resolution.iter() {
        let digest = resolution
            .arena
            .get(&meta.origin)
            .map(|bundle| bundle.digest()[..12].to_string())
            .unwrap_or_else(|| "-".to_string());
        let marker = if meta.key() == resolution.root { "*" } else { " " };
        println!(
            "{}{:<35} {:<9} {:<36} {:<14}",
            marker,
            meta.key(),
            meta.source.to_string(),
            meta.origin,
            digest
        );
    }

    eprintln!(
        "\n[{} libraries resolved, {} bundles retained]",
        resolution.len(),
        resolution.arena.len()
    );
    Ok(())
}

/// Resolve and assemble a package
async fn build_package(
    library: &str,
    version: Option<VersionPreference>,
    content_path: &Path,
    info: PackageInfo,
    media_dir: Option<PathBuf>,
    output: &Path,
) -> Result<()> {
    let content = tokio::fs::read_to_string(content_path)
        .await
        .with_context(|| format!("Failed to read content file: {}", content_path.display()))?;

    let media = match media_dir {
        Some(dir) => collect_media(&dir).await?,
        None => Vec::new(),
    };

    let resolution = run_resolution(library, version).await?;

    let package = PackageAssembler::new()
        .assemble(&content, &resolution, &info, &media)
        .context("Failed to assemble package")?;
    // Retained bundle bytes are no longer needed
    drop(resolution);

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(output, &package)
        .await
        .with_context(|| format!("Failed to write package: {}", output.display()))?;

    eprintln!(
        "[Package written to {} ({} bytes, {} media files)]",
        output.display(),
        package.len(),
        media.len()
    );
    Ok(())
}

/// Read every file under `dir`, destined for `content/<relative path>`.
/// Sorted by relative path so packages are reproducible.
async fn collect_media(dir: &Path) -> Result<Vec<MediaFile>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current)
            .await
            .with_context(|| format!("Failed to read media directory: {}", current.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                pending.push(path);
            } else {
                files.push(path);
            }
        }
    }

    files.sort();

    let mut media = Vec::with_capacity(files.len());
    for path in files {
        let relative = path
            .strip_prefix(dir)
            .with_context(|| format!("Media file outside media directory: {}", path.display()))?;
        let destination = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read media file: {}", path.display()))?;
        media.push(MediaFile::new(
            path.clone(),
            bytes,
            format!("content/{}", destination),
        ));
    }

    Ok(media)
}

/// Show resolved configuration
async fn show_config() -> Result<()> {
    let config = config::config()?;

    println!("Config file: {}", match &config.config_file {
        Some(path) => path.display().to_string(),
        None => "(none, using defaults)".to_string(),
    });
    println!("Home:        {}", config.home.display());
    println!("Cache:       {}", config.cache_dir.display());
    println!("Extension:   .{}", config.bundle_extension);
    println!("Hub URL:     {}", config.hub.base_url);
    println!("Hub timeout: {}s", config.hub.timeout_seconds);

    Ok(())
}
