//! Cache inspection commands.

use anyhow::Result;
use clap::Subcommand;

use crate::config;

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// List cached library bundles
    List,

    /// Show the cache directory
    Path,
}

/// Execute cache subcommands
pub async fn execute(command: CacheCommands) -> Result<()> {
    let store = config::config()?.cache_store();

    match command {
        CacheCommands::List => {
            let entries = store.list().await?;
            if entries.is_empty() {
                println!("No cached bundles in {}", store.dir().display());
                return Ok(());
            }

            println!("{:<40} {:<12} {}", "LIBRARY", "VERSION", "FILE");
            println!("{}", "-".repeat(80));
            for entry in entries {
                let version = entry
                    .version
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "(legacy)".to_string());
                let file = entry
                    .path
                    .file_name()
                    .map(|f| f.to_string_lossy().to_string())
                    .unwrap_or_default();
                println!("{:<40} {:<12} {}", entry.machine_name, version, file);
            }
        }
        CacheCommands::Path => {
            println!("{}", store.dir().display());
        }
    }

    Ok(())
}
