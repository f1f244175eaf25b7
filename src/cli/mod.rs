//! CLI module for mpresolve
//!
//! Provides command-line interface using clap.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use commands::*;

/// mpresolve - multiplatform Maven dependency resolver
#[derive(Parser)]
#[command(name = "mpresolve")]
#[command(author = "mpresolve Contributors")]
#[command(version)]
#[command(about = "Resolve Maven and Gradle-metadata dependencies per target platform", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve coordinates into a dependency graph
    #[command(visible_alias = "r")]
    Resolve(resolve::ResolveArgs),

    /// Manage the artifact cache
    Cache(cache::CacheArgs),
}

/// Output settings shared by every command
#[derive(Debug, Clone, Copy)]
pub struct OutputMode {
    pub json: bool,
    pub quiet: bool,
}

impl OutputMode {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            json: cli.json,
            quiet: cli.quiet,
        }
    }

    /// Human-readable progress and info lines are printed
    pub fn is_interactive(self) -> bool {
        !self.json && !self.quiet
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_resolve() {
        let cli = Cli::try_parse_from([
            "mpresolve",
            "--json",
            "resolve",
            "g:m:1",
            "--platform",
            "jvm",
            "--platform",
            "iosArm64",
            "--scope",
            "runtime",
            "--format",
            "dot",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Resolve(args) => {
                assert_eq!(args.coordinates, vec!["g:m:1"]);
                assert_eq!(args.platforms, vec!["jvm", "iosArm64"]);
                assert_eq!(args.scope.as_deref(), Some("runtime"));
                assert_eq!(args.format, resolve::GraphFormat::Dot);
            }
            _ => panic!("expected resolve"),
        }
    }

    #[test]
    fn test_resolve_requires_coordinates() {
        assert!(Cli::try_parse_from(["mpresolve", "resolve"]).is_err());
    }
}
