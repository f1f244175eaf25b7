//! mpresolve cache - Manage the artifact cache

use std::env;

use clap::{Args, Subcommand};

use crate::cache::FileCache;
use crate::cli::{output, OutputMode};
use crate::coordinates::Coordinate;
use crate::core::{Config, ResolveResult};

#[derive(Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommands,
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Show cache location and size
    Info,

    /// Clean the entire cache
    Clean,

    /// Print where a coordinate's files are stored
    Path {
        /// Coordinate (group:module:version)
        coordinate: String,
    },
}

pub async fn execute(args: CacheArgs, mode: OutputMode) -> ResolveResult<()> {
    let project_dir = env::current_dir()?;
    let config = Config::load(&project_dir)?;
    let cache = config.file_cache()?;

    match args.command {
        CacheCommands::Info => info(&cache, mode),
        CacheCommands::Clean => clean(&cache, mode),
        CacheCommands::Path { coordinate } => path(&cache, &coordinate.parse()?, mode),
    }
}

fn info(cache: &FileCache, mode: OutputMode) -> ResolveResult<()> {
    let stats = cache.stats()?;

    if mode.json {
        output::json(&serde_json::json!({
            "path": cache.root(),
            "size_bytes": stats.total_size,
            "size_human": output::format_bytes(stats.total_size),
            "downloaded_files": stats.downloaded_files,
            "transformed_files": stats.transformed_files
        }))?;
    } else {
        output::info("Cache Information");
        output::divider();
        println!("  Path: {}", cache.root().display());
        println!("  Size: {}", output::format_bytes(stats.total_size));
        println!("  Downloaded files: {}", stats.downloaded_files);
        println!("  Repackaged files: {}", stats.transformed_files);
    }

    Ok(())
}

fn clean(cache: &FileCache, mode: OutputMode) -> ResolveResult<()> {
    let size = cache.stats()?.total_size;
    cache.clear()?;

    if mode.json {
        output::json(&serde_json::json!({
            "success": true,
            "freed_bytes": size,
            "freed_human": output::format_bytes(size)
        }))?;
    } else if !mode.quiet {
        output::success(&format!("Cleared {} from cache", output::format_bytes(size)));
    }

    Ok(())
}

fn path(cache: &FileCache, coordinate: &Coordinate, mode: OutputMode) -> ResolveResult<()> {
    let jar = cache.download_path(coordinate, &coordinate.file_name(None, "jar"));
    let directory = jar.parent().map(|p| p.to_path_buf()).unwrap_or_else(|| jar.clone());

    if mode.json {
        output::json(&serde_json::json!({
            "coordinate": coordinate.to_string(),
            "directory": directory,
            "jar": jar,
            "exists": jar.exists()
        }))?;
    } else {
        println!("{}", directory.display());
    }

    Ok(())
}
