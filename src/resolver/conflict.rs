//! Conflict resolution
//!
//! After traversal, dependency nodes are grouped by `group:module`. The configured strategies
//! are asked in order which of the group's dependencies every node should be bound to; a later
//! `Select` overrides an earlier one and a `Veto` leaves the group untouched.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::coordinates::Key;
use crate::core::{Context, ResolveResult};
use crate::resolver::dependency::MavenDependency;
use crate::resolver::graph::{DependencyNode, NodeId};

/// What a strategy decided for one group
#[derive(Debug, Clone)]
pub enum ConflictDecision {
    /// No opinion
    Pass,
    /// Bind every node of the group to this dependency
    Select(Arc<MavenDependency>),
    /// Keep the group as it is, whatever earlier strategies chose
    Veto,
}

pub trait ConflictResolutionStrategy: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Decide for the distinct dependencies bound to nodes sharing `key`
    fn resolve(&self, key: &Key, candidates: &[Arc<MavenDependency>]) -> ConflictDecision;
}

/// Picks the highest version by Maven version ordering
#[derive(Debug, Clone, Copy, Default)]
pub struct HighestVersionStrategy;

impl ConflictResolutionStrategy for HighestVersionStrategy {
    fn name(&self) -> &str {
        "highest-version"
    }

    fn resolve(&self, _key: &Key, candidates: &[Arc<MavenDependency>]) -> ConflictDecision {
        candidates
            .iter()
            .max_by(|a, b| {
                a.coordinate()
                    .maven_version()
                    .cmp(&b.coordinate().maven_version())
            })
            .map_or(ConflictDecision::Pass, |d| ConflictDecision::Select(d.clone()))
    }
}

/// Selects a configured version for `group:module` when it is among the candidates
#[derive(Debug, Clone, Default)]
pub struct PinnedVersionStrategy {
    pins: HashMap<String, String>,
}

impl PinnedVersionStrategy {
    pub fn new(pins: HashMap<String, String>) -> Self {
        Self { pins }
    }
}

impl ConflictResolutionStrategy for PinnedVersionStrategy {
    fn name(&self) -> &str {
        "pinned-version"
    }

    fn resolve(&self, key: &Key, candidates: &[Arc<MavenDependency>]) -> ConflictDecision {
        let Some(version) = self.pins.get(&key.to_string()) else {
            return ConflictDecision::Pass;
        };
        match candidates
            .iter()
            .find(|d| &d.coordinate().version == version)
        {
            Some(pinned) => ConflictDecision::Select(pinned.clone()),
            None => {
                tracing::warn!(%key, %version, "pinned version is not part of the graph");
                ConflictDecision::Pass
            }
        }
    }
}

/// Rebind the given dependency nodes so each group shares one dependency
///
/// Returns the number of nodes whose binding changed.
pub fn resolve_conflicts(context: &Context, nodes: &[NodeId]) -> ResolveResult<usize> {
    let mut groups: BTreeMap<Key, Vec<(Arc<DependencyNode>, Arc<MavenDependency>)>> =
        BTreeMap::new();
    for id in nodes {
        let node = context.graph.get(*id);
        if let Some(dependency) = node.dependency() {
            groups
                .entry(dependency.key())
                .or_default()
                .push((node, dependency));
        }
    }

    let strategies = &context.settings.conflict_resolution_strategies;
    let mut rebound = 0;
    for (key, members) in groups {
        let mut candidates: Vec<Arc<MavenDependency>> = Vec::new();
        for (_, dependency) in &members {
            if !candidates.iter().any(|c| Arc::ptr_eq(c, dependency)) {
                candidates.push(dependency.clone());
            }
        }
        if candidates.len() < 2 {
            continue;
        }

        let mut selected = None;
        for strategy in strategies {
            match strategy.resolve(&key, &candidates) {
                ConflictDecision::Pass => {}
                ConflictDecision::Select(dependency) => selected = Some(dependency),
                ConflictDecision::Veto => {
                    tracing::debug!(%key, strategy = strategy.name(), "conflict resolution vetoed");
                    selected = None;
                    break;
                }
            }
        }

        let Some(selected) = selected else {
            continue;
        };
        tracing::debug!(%key, selected = %selected, candidates = candidates.len(), "conflict resolved");
        for (node, _) in &members {
            if node.rebind(selected.clone())? {
                rebound += 1;
            }
        }
    }
    Ok(rebound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FileCache;
    use crate::coordinates::Coordinate;
    use crate::core::Settings;
    use crate::resolver::dependency::ResolvedData;
    use tempfile::tempdir;

    fn context(strategies: Vec<Arc<dyn ConflictResolutionStrategy>>) -> (tempfile::TempDir, Arc<Context>) {
        let dir = tempdir().unwrap();
        let settings = Settings::builder(FileCache::isolated(dir.path()))
            .conflict_resolution_strategies(strategies)
            .build()
            .unwrap();
        (dir, Context::new(settings).unwrap())
    }

    /// Root depends on three libraries, each pulling in a different version of `g:lib`
    fn three_versions(context: &Context) -> NodeId {
        let mut roots = Vec::new();
        for (i, version) in ["1.0", "1.2", "1.1"].iter().enumerate() {
            let parent = Coordinate::new("g", format!("p{}", i), "1");
            let lib = context.cache.dependency(&Coordinate::new("g", "lib", *version));
            context
                .cache
                .dependency(&parent)
                .set_resolved_data(ResolvedData {
                    children: Arc::new(vec![lib]),
                    ..Default::default()
                });
            roots.push(parent);
        }
        context.graph.add_holder("root", &roots, context)
    }

    fn lib_nodes(context: &Context, root: NodeId) -> Vec<Arc<DependencyNode>> {
        context
            .graph
            .reachable(root)
            .into_iter()
            .map(|id| context.graph.get(id))
            .filter(|n| n.requested().map_or(false, |c| c.module == "lib"))
            .collect()
    }

    #[test]
    fn test_highest_version_wins() {
        let (_dir, context) = context(vec![Arc::new(HighestVersionStrategy)]);
        let root = three_versions(&context);

        let rebound = resolve_conflicts(&context, &context.graph.reachable(root)).unwrap();
        assert_eq!(rebound, 2);

        let nodes = lib_nodes(&context, root);
        assert_eq!(nodes.len(), 3);
        let winner = nodes[0].dependency().unwrap();
        assert_eq!(winner.coordinate().version, "1.2");
        for node in &nodes {
            assert!(Arc::ptr_eq(&node.dependency().unwrap(), &winner));
        }

        let again = resolve_conflicts(&context, &context.graph.reachable(root)).unwrap();
        assert_eq!(again, 0);
    }

    #[test]
    fn test_pin_overrides_highest() {
        let pins = HashMap::from([("g:lib".to_string(), "1.1".to_string())]);
        let (_dir, context) = context(vec![
            Arc::new(HighestVersionStrategy),
            Arc::new(PinnedVersionStrategy::new(pins)),
        ]);
        let root = three_versions(&context);
        resolve_conflicts(&context, &context.graph.reachable(root)).unwrap();

        for node in lib_nodes(&context, root) {
            assert_eq!(node.dependency().unwrap().coordinate().version, "1.1");
        }
    }

    #[derive(Debug)]
    struct VetoAll;

    impl ConflictResolutionStrategy for VetoAll {
        fn name(&self) -> &str {
            "veto"
        }

        fn resolve(&self, _key: &Key, _candidates: &[Arc<MavenDependency>]) -> ConflictDecision {
            ConflictDecision::Veto
        }
    }

    #[test]
    fn test_veto_keeps_bindings() {
        let (_dir, context) = context(vec![Arc::new(HighestVersionStrategy), Arc::new(VetoAll)]);
        let root = three_versions(&context);
        let rebound = resolve_conflicts(&context, &context.graph.reachable(root)).unwrap();
        assert_eq!(rebound, 0);

        let mut versions: Vec<String> = lib_nodes(&context, root)
            .iter()
            .map(|n| n.dependency().unwrap().coordinate().version.clone())
            .collect();
        versions.sort();
        assert_eq!(versions, vec!["1.0", "1.1", "1.2"]);
    }
}
