//! mpresolve - multiplatform Maven dependency resolver
//!
//! Thin command-line driver over the resolution core in the library crate.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mpresolve::cli::{self, Cli, Commands, OutputMode};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let mode = OutputMode::from_cli(&cli);

    let result = match cli.command {
        Commands::Resolve(args) => cli::commands::resolve::execute(args, mode).await,
        Commands::Cache(args) => cli::commands::cache::execute(args, mode).await,
    };

    if let Err(e) = result {
        if mode.json {
            let error_json = serde_json::json!({
                "error": true,
                "message": e.to_string()
            });
            match serde_json::to_string_pretty(&error_json) {
                Ok(text) => eprintln!("{}", text),
                Err(_) => eprintln!("{}", e),
            }
        } else {
            eprintln!("{} {}", console::style("error:").red().bold(), e);
        }
        std::process::exit(e.exit_code());
    }
}
