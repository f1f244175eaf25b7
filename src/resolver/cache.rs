//! Per-context deduplication of dependencies and constraints

use std::sync::Arc;

use dashmap::DashMap;

use crate::coordinates::{Coordinate, Key, VersionRequirement};
use crate::resolver::dependency::{MavenDependency, MavenDependencyConstraint};

/// Hands out the single shared instance per coordinate for one resolution context
#[derive(Debug, Default)]
pub struct ResolutionCache {
    dependencies: DashMap<Coordinate, Arc<MavenDependency>>,
    constraints: DashMap<(Key, VersionRequirement), Arc<MavenDependencyConstraint>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The dependency for `coordinate`, created on first request
    pub fn dependency(&self, coordinate: &Coordinate) -> Arc<MavenDependency> {
        self.dependencies
            .entry(coordinate.clone())
            .or_insert_with(|| Arc::new(MavenDependency::new(coordinate.clone())))
            .value()
            .clone()
    }

    pub fn constraint(&self, key: Key, version: VersionRequirement) -> Arc<MavenDependencyConstraint> {
        self.constraints
            .entry((key.clone(), version.clone()))
            .or_insert_with(|| Arc::new(MavenDependencyConstraint::new(key, version)))
            .value()
            .clone()
    }

    /// Every dependency created so far
    pub fn dependencies(&self) -> Vec<Arc<MavenDependency>> {
        self.dependencies.iter().map(|e| e.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}
