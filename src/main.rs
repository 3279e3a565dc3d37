use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use tldr_cache::{CacheConfig, CacheManager};

/// Offline cache of tldr command pages
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Custom cache directory path (defaults to ~/.tldr/cache)
    #[arg(long, env = "TLDR_CACHE_DIR")]
    cache_dir: Option<String>,

    /// Preferred page language
    #[arg(long, env = "TLDR_LANG")]
    lang: Option<String>,

    /// Archive to download pages from
    #[arg(long, env = "TLDR_ARCHIVE_URL")]
    archive_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List every cached command in manifest order
    List,
    /// Print the page for a command
    Show {
        /// Command name, e.g. `tar`
        name: String,
    },
    /// Print manifest metadata for a command as JSON
    Info {
        /// Command name, e.g. `tar`
        name: String,
    },
    /// Download the page archive
    Update {
        /// Re-download even if the cache is already populated
        #[arg(long)]
        force: bool,
    },
    /// Show cache location and state
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so page output stays pipeable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let config = CacheConfig::resolve(args.lang, args.cache_dir.as_deref(), args.archive_url)?;
    tracing::debug!("Using cache directory: {}", config.cache_dir.display());

    let manager = CacheManager::new(config)?;

    match args.command {
        Commands::List => {
            manager.update_cache(false).await?;
            for name in manager.commands()? {
                println!("{name}");
            }
        }
        Commands::Show { name } => {
            manager.update_cache(false).await?;
            let page = manager.man(&name)?;
            if page.is_empty() {
                tracing::info!("No page for '{}'", name);
            } else {
                print!("{page}");
            }
        }
        Commands::Info { name } => {
            manager.update_cache(false).await?;
            match manager.command(&name)? {
                Some(metadata) => println!("{}", serde_json::to_string_pretty(&metadata)?),
                None => anyhow::bail!("Unknown command: {name}"),
            }
        }
        Commands::Update { force } => {
            manager.update_cache(force).await?;
            match manager.last_refresh() {
                Some(outcome) => println!("{}", serde_json::to_string_pretty(&outcome)?),
                None => println!("Cache already populated; use --force to re-download"),
            }
        }
        Commands::Status => print_status(&manager)?,
    }

    Ok(())
}

fn print_status(manager: &CacheManager) -> Result<()> {
    let has_index = manager.storage().has_index();
    let command_count = if has_index {
        Some(
            manager
                .commands()
                .context("Failed to load cache index")?
                .len(),
        )
    } else {
        None
    };

    let status = serde_json::json!({
        "cache_dir": PathBuf::from(manager.cache_dir()),
        "language": manager.preferred_language(),
        "has_index": has_index,
        "commands": command_count,
    });
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
