//! mpresolve resolve - Resolve coordinates into a dependency graph

use std::env;
use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, ValueEnum};

use crate::cli::{output, OutputMode};
use crate::coordinates::Coordinate;
use crate::core::{Config, ResolutionLevel, ResolveError, ResolveResult, Severity};
use crate::resolver::Resolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    /// Indented tree
    Tree,
    /// Graphviz DOT
    Dot,
}

#[derive(Args)]
pub struct ResolveArgs {
    /// Coordinates to resolve (group:module:version)
    #[arg(required = true)]
    pub coordinates: Vec<String>,

    /// Target platform, repeatable (default: from configuration)
    #[arg(short, long = "platform")]
    pub platforms: Vec<String>,

    /// Resolution scope: compile or runtime
    #[arg(short, long)]
    pub scope: Option<String>,

    /// Use local caches only
    #[arg(long)]
    pub offline: bool,

    /// Download the resolved artifacts
    #[arg(short, long)]
    pub download: bool,

    /// Also download sources and javadoc jars
    #[arg(long, requires = "download")]
    pub sources: bool,

    /// Resolve only the given coordinates, not their dependencies
    #[arg(long)]
    pub intransitive: bool,

    /// Graph output format
    #[arg(short, long, value_enum, default_value_t = GraphFormat::Tree)]
    pub format: GraphFormat,

    /// Project directory holding mpresolve.toml
    #[arg(long, default_value = ".")]
    pub project: PathBuf,
}

pub async fn execute(args: ResolveArgs, mode: OutputMode) -> ResolveResult<()> {
    let start_time = Instant::now();

    let project_dir = if args.project.is_absolute() {
        args.project.clone()
    } else {
        env::current_dir()?.join(&args.project)
    };

    let mut config = Config::load(&project_dir)?;
    if !args.platforms.is_empty() {
        config.resolution.platforms = args.platforms.clone();
    }
    if let Some(scope) = &args.scope {
        config.resolution.scope = scope.parse()?;
    }
    if args.offline {
        config.cache.offline = true;
    }

    let coordinates = args
        .coordinates
        .iter()
        .map(|c| c.parse())
        .collect::<ResolveResult<Vec<Coordinate>>>()?;
    let level = if config.cache.offline {
        ResolutionLevel::Partial
    } else {
        ResolutionLevel::Network
    };

    let resolver = Resolver::new(config.settings()?)?;
    let root = resolver.add_roots("root", &coordinates);

    let progress = if mode.is_interactive() {
        Some(output::spinner("Resolving dependencies..."))
    } else {
        None
    };

    let mut result = resolver.resolve(root, level, !args.intransitive).await;
    if result.is_ok() && args.download {
        if let Some(ref pb) = progress {
            pb.set_message("Downloading artifacts...");
        }
        result = resolver.download(root, level, args.sources).await;
    }
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
    result?;

    let graph = match args.format {
        GraphFormat::Tree => resolver.pretty_print(root),
        GraphFormat::Dot => resolver.to_dot(root),
    };
    let diagnostics = resolver.messages(root);
    let errors = diagnostics
        .iter()
        .filter(|d| d.message.severity == Severity::Error)
        .count();
    let dependencies = resolver.dependencies(root);
    let files = if args.download {
        resolver.files(root, args.sources)
    } else {
        Vec::new()
    };

    if mode.json {
        output::json(&serde_json::json!({
            "success": errors == 0,
            "graph": graph,
            "dependencies": dependencies.iter().map(|d| d.to_string()).collect::<Vec<_>>(),
            "files": files,
            "diagnostics": diagnostics,
            "duration_ms": start_time.elapsed().as_millis()
        }))?;
    } else {
        if !mode.quiet {
            print!("{}", graph);
        }
        for diagnostic in &diagnostics {
            let line = format!("{}: {}", diagnostic.dependency, diagnostic.message);
            match diagnostic.message.severity {
                Severity::Error => output::error(&line),
                Severity::Warning if !mode.quiet => output::warning(&line),
                Severity::Info if !mode.quiet => output::info(&line),
                _ => {}
            }
        }
        if mode.is_interactive() {
            for file in &files {
                println!("  {}", console::style(file.path.display()).dim());
            }
            output::success(&format!(
                "Resolved {} dependencies in {}",
                dependencies.len(),
                output::format_duration(start_time.elapsed().as_millis())
            ));
        }
    }

    if errors > 0 {
        return Err(ResolveError::other(format!(
            "Resolution finished with {} error(s)",
            errors
        )));
    }
    Ok(())
}
