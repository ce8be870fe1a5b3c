//! Configuration for bookbinder.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (BOOKBINDER_HOME, BOOKBINDER_CACHE, BOOKBINDER_HUB_URL)
//! 2. Config file (.bookbinder/config.yaml)
//! 3. Defaults (~/.bookbinder, cache in ~/.bookbinder/libraries)
//!
//! Config file discovery:
//! - Searches current directory and parents for .bookbinder/config.yaml
//! - Paths in config file are relative to the project root (parent of .bookbinder/)

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::{HubClient, DEFAULT_HUB_URL, DEFAULT_TIMEOUT_SECS};
use crate::library::cache::DEFAULT_EXTENSION;
use crate::library::VersionedCacheStore;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub hub: Option<HubConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to project root)
    pub home: Option<String>,
    /// Library bundle cache (relative to project root)
    pub cache: Option<String>,
    /// Bundle file extension (default: h5p)
    pub extension: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    pub base_url: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// bookbinder home (state)
    pub home: PathBuf,
    /// Library bundle cache directory
    pub cache_dir: PathBuf,
    /// Bundle file extension
    pub bundle_extension: String,
    /// Hub settings
    pub hub: HubSettings,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct HubSettings {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_HUB_URL.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ResolvedConfig {
    /// Cache store over the configured directory
    pub fn cache_store(&self) -> VersionedCacheStore {
        VersionedCacheStore::with_extension(&self.cache_dir, &self.bundle_extension)
    }

    /// Hub client with the configured URL and timeout
    pub fn hub_client(&self) -> Result<HubClient> {
        HubClient::with_timeout(
            &self.hub.base_url,
            Duration::from_secs(self.hub.timeout_seconds),
        )
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".bookbinder").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let config_file = find_config_file();
    let file = match config_file {
        Some(ref path) => Some(load_config_file(path)?),
        None => None,
    };

    // Project root is the parent of .bookbinder/
    let base_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .and_then(Path::parent)
        .unwrap_or(Path::new("."));

    resolve_config(file.as_ref(), base_dir, config_file.clone(), |key| {
        std::env::var(key).ok()
    })
}

/// Merge env, file and defaults. `env` is injected so tests can stub it.
fn resolve_config(
    file: Option<&ConfigFile>,
    base_dir: &Path,
    config_file: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let paths = file.map(|f| f.paths.clone()).unwrap_or_default();
    let hub = file.and_then(|f| f.hub.clone());

    let home = match (env("BOOKBINDER_HOME"), paths.home.as_deref()) {
        (Some(env_home), _) => PathBuf::from(env_home),
        (None, Some(home)) => resolve_path(base_dir, home),
        (None, None) => dirs::home_dir()
            .context("Failed to determine home directory")?
            .join(".bookbinder"),
    };

    let cache_dir = match (env("BOOKBINDER_CACHE"), paths.cache.as_deref()) {
        (Some(env_cache), _) => PathBuf::from(env_cache),
        (None, Some(cache)) => resolve_path(base_dir, cache),
        (None, None) => home.join("libraries"),
    };

    let defaults = HubSettings::default();
    let hub = HubSettings {
        base_url: env("BOOKBINDER_HUB_URL")
            .or_else(|| hub.as_ref().and_then(|h| h.base_url.clone()))
            .unwrap_or(defaults.base_url),
        timeout_seconds: hub
            .as_ref()
            .and_then(|h| h.timeout_seconds)
            .unwrap_or(defaults.timeout_seconds),
    };

    Ok(ResolvedConfig {
        home,
        cache_dir,
        bundle_extension: paths
            .extension
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string()),
        hub,
        config_file,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_file() {
        let config = resolve_config(None, Path::new("."), None, no_env).unwrap();

        let expected_home = dirs::home_dir().unwrap().join(".bookbinder");
        assert_eq!(config.home, expected_home);
        assert_eq!(config.cache_dir, expected_home.join("libraries"));
        assert_eq!(config.bundle_extension, "h5p");
        assert_eq!(config.hub.base_url, "https://api.h5p.org/v1");
        assert_eq!(config.hub.timeout_seconds, 30);
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".bookbinder");
        std::fs::create_dir_all(&dir).unwrap();

        let config_path = dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1.0"
paths:
  home: ./.bookbinder
  cache: /var/cache/h5p
hub:
  base_url: https://hub.example.org/v1
  timeout_seconds: 10
"#
        )
        .unwrap();

        let parsed = load_config_file(&config_path).unwrap();
        assert_eq!(parsed.version, "1.0");
        assert_eq!(parsed.paths.cache, Some("/var/cache/h5p".to_string()));

        let config =
            resolve_config(Some(&parsed), temp.path(), Some(config_path), no_env).unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/var/cache/h5p"));
        assert_eq!(config.hub.base_url, "https://hub.example.org/v1");
        assert_eq!(config.hub.timeout_seconds, 10);
        assert!(config.home.ends_with(".bookbinder"));
    }

    #[test]
    fn test_env_overrides_file() {
        let parsed: ConfigFile = serde_yaml::from_str(
            r#"
version: "1.0"
paths:
  cache: ./libs
hub:
  base_url: https://file.example.org
"#,
        )
        .unwrap();
        let env: HashMap<&str, &str> = [
            ("BOOKBINDER_CACHE", "/env/cache"),
            ("BOOKBINDER_HUB_URL", "https://env.example.org"),
        ]
        .into_iter()
        .collect();

        let config = resolve_config(Some(&parsed), Path::new("/project"), None, |key| {
            env.get(key).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(config.cache_dir, PathBuf::from("/env/cache"));
        assert_eq!(config.hub.base_url, "https://env.example.org");
        assert_eq!(config.cache_store().dir(), Path::new("/env/cache"));
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/subdir")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}
