//! Dependency resolver for mpresolve
//!
//! Builds the node graph for a set of root coordinates, resolves every node concurrently,
//! runs conflict resolution until bindings settle and downloads the resulting artifacts.

pub mod cache;
pub mod conflict;
pub mod dependency;
pub mod file;
pub mod graph;
pub mod kmp;
pub mod variants;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;

use crate::coordinates::Coordinate;
use crate::core::{Context, Message, ResolutionLevel, ResolveError, ResolveResult, Settings, Severity};

pub use cache::ResolutionCache;
pub use conflict::{
    ConflictDecision, ConflictResolutionStrategy, HighestVersionStrategy, PinnedVersionStrategy,
};
pub use dependency::{MavenDependency, MavenDependencyConstraint};
pub use file::DependencyFile;
pub use graph::{DependencyNode, NodeArena, NodeId, NodeKind};
pub use kmp::{IosSiblingVariantFallback, SourceSetFallback, SourceSetRequest};
pub use variants::{select_variants, VariantSelection};

/// Traversal and conflict resolution alternate at most this many times
const MAX_CONFLICT_PASSES: usize = 10;

/// A diagnostic together with the dependency it is attached to
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub dependency: String,
    #[serde(flatten)]
    pub message: Message,
}

/// A located artifact of the resolved graph
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedFile {
    pub coordinate: String,
    pub name: String,
    pub path: PathBuf,
}

/// Entry point for one resolution request
pub struct Resolver {
    context: Arc<Context>,
}

impl Resolver {
    pub fn new(settings: Settings) -> ResolveResult<Self> {
        Ok(Self {
            context: Context::new(settings)?,
        })
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Create a named root holding the given coordinates
    pub fn add_roots(&self, name: &str, coordinates: &[Coordinate]) -> NodeId {
        self.context.graph.add_holder(name, coordinates, &self.context)
    }

    /// Resolve the graph below `root` to `level`
    ///
    /// Without `transitive` only the root coordinates themselves are resolved. Traversal is
    /// repeated after every conflict-resolution pass that rebound a node, so newly selected
    /// dependencies get resolved too.
    pub async fn resolve(
        &self,
        root: NodeId,
        level: ResolutionLevel,
        transitive: bool,
    ) -> ResolveResult<()> {
        let mut pass = 0;
        loop {
            pass += 1;
            self.traverse(root, level, transitive).await?;
            if pass > MAX_CONFLICT_PASSES {
                tracing::warn!("conflict resolution did not settle after {} passes", MAX_CONFLICT_PASSES);
                return Ok(());
            }

            let nodes = self.context.graph.reachable(root);
            let rebound = conflict::resolve_conflicts(&self.context, &nodes)?;
            tracing::debug!(pass, nodes = nodes.len(), rebound, "resolution pass complete");
            if rebound == 0 {
                return Ok(());
            }
        }
    }

    async fn traverse(
        &self,
        root: NodeId,
        level: ResolutionLevel,
        transitive: bool,
    ) -> ResolveResult<()> {
        let mut visited = HashSet::from([root]);
        let mut tasks = JoinSet::new();
        self.spawn_visit(&mut tasks, root, level);

        while let Some(joined) = tasks.join_next().await {
            let (id, result) = joined
                .map_err(|e| ResolveError::other(format!("Resolution task failed: {}", e)))?;
            result?;

            let node = self.context.graph.get(id);
            if !transitive && !matches!(node.kind(), NodeKind::Holder { .. }) {
                continue;
            }
            for child in node.children(&self.context.graph) {
                if visited.insert(child) {
                    self.spawn_visit(&mut tasks, child, level);
                }
            }
        }
        Ok(())
    }

    fn spawn_visit(
        &self,
        tasks: &mut JoinSet<(NodeId, ResolveResult<()>)>,
        id: NodeId,
        level: ResolutionLevel,
    ) {
        let context = self.context.clone();
        tasks.spawn(async move {
            let node = context.graph.get(id);
            let result = node.resolve_children(&context, level).await;
            (id, result)
        });
    }

    /// Distinct dependencies bound to nodes below `root`
    pub fn dependencies(&self, root: NodeId) -> Vec<Arc<MavenDependency>> {
        let mut unique: Vec<Arc<MavenDependency>> = Vec::new();
        for id in self.context.graph.reachable(root) {
            if let Some(dependency) = self.context.graph.get(id).dependency() {
                if !unique.iter().any(|d| Arc::ptr_eq(d, &dependency)) {
                    unique.push(dependency);
                }
            }
        }
        unique
    }

    /// Download the artifacts of every dependency below `root`; below
    /// [`ResolutionLevel::Network`] only local copies are located
    pub async fn download(
        &self,
        root: NodeId,
        level: ResolutionLevel,
        with_sources: bool,
    ) -> ResolveResult<()> {
        let mut tasks = JoinSet::new();
        for dependency in self.dependencies(root) {
            let context = self.context.clone();
            tasks.spawn(async move {
                dependency
                    .download_dependencies(&context, level, with_sources)
                    .await
            });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.map_err(|e| ResolveError::other(format!("Download task failed: {}", e)))??;
        }
        Ok(())
    }

    /// Every diagnostic recorded below `root`
    pub fn messages(&self, root: NodeId) -> Vec<Diagnostic> {
        self.dependencies(root)
            .into_iter()
            .flat_map(|dependency| {
                let name = dependency.to_string();
                dependency.messages().into_iter().map(move |message| Diagnostic {
                    dependency: name.clone(),
                    message,
                })
            })
            .collect()
    }

    pub fn has_errors(&self, root: NodeId) -> bool {
        self.messages(root)
            .iter()
            .any(|d| d.message.severity == Severity::Error)
    }

    /// Located files of every dependency below `root`
    pub fn files(&self, root: NodeId, with_sources: bool) -> Vec<ResolvedFile> {
        self.dependencies(root)
            .iter()
            .flat_map(|dependency| dependency.files(with_sources))
            .filter_map(|file| {
                file.path().map(|path| ResolvedFile {
                    coordinate: file.coordinate().to_string(),
                    name: file.name().to_string(),
                    path,
                })
            })
            .collect()
    }

    pub fn pretty_print(&self, root: NodeId) -> String {
        self.context.graph.pretty_print(root)
    }

    pub fn to_dot(&self, root: NodeId) -> String {
        self.context.graph.to_dot(root)
    }
}
