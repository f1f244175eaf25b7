//! Dependency node graph with cycle protection
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. A node is created once per
//! requested coordinate and context, so a coordinate requested from several places is one
//! node with several parents. Parent links are plain ids used for ancestry queries only.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};

use crate::coordinates::{Coordinate, Key};
use crate::core::{Context, Message, ResolutionLevel, ResolveError, ResolveResult};
use crate::resolver::dependency::{MavenDependency, MavenDependencyConstraint};

/// Index of a node in the [`NodeArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

pub enum NodeKind {
    /// Named grouping of root dependencies
    Holder { name: String, roots: Vec<NodeId> },
    /// A requested coordinate, bound to the dependency conflict resolution chose for it
    Dependency {
        requested: Coordinate,
        binding: RwLock<Arc<MavenDependency>>,
    },
    /// A version constraint; never has children
    Constraint(Arc<MavenDependencyConstraint>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ViewSource {
    dependency: usize,
    children: usize,
    constraints: usize,
}

#[derive(Default)]
struct ChildrenView {
    source: Option<ViewSource>,
    children: Vec<NodeId>,
}

pub struct DependencyNode {
    id: NodeId,
    kind: NodeKind,
    parents: RwLock<Vec<NodeId>>,
    view: Mutex<ChildrenView>,
}

impl DependencyNode {
    fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            parents: RwLock::new(Vec::new()),
            view: Mutex::new(ChildrenView::default()),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Conflict-resolution identity; holders have none
    pub fn key(&self) -> Option<Key> {
        match &self.kind {
            NodeKind::Holder { .. } => None,
            NodeKind::Dependency { requested, .. } => Some(requested.key()),
            NodeKind::Constraint(constraint) => Some(constraint.key.clone()),
        }
    }

    pub fn parents(&self) -> Vec<NodeId> {
        self.parents.read().clone()
    }

    /// The currently bound dependency of a dependency node
    pub fn dependency(&self) -> Option<Arc<MavenDependency>> {
        match &self.kind {
            NodeKind::Dependency { binding, .. } => Some(binding.read().clone()),
            _ => None,
        }
    }

    pub fn requested(&self) -> Option<&Coordinate> {
        match &self.kind {
            NodeKind::Dependency { requested, .. } => Some(requested),
            _ => None,
        }
    }

    /// Swap the bound dependency, keeping the node itself
    ///
    /// Returns whether the binding changed. Binding a dependency of another `group:module`
    /// is a programming error.
    pub fn rebind(&self, dependency: Arc<MavenDependency>) -> ResolveResult<bool> {
        let NodeKind::Dependency { requested, binding } = &self.kind else {
            return Err(ResolveError::IdentityMismatch {
                node: self.to_string(),
                actual: dependency.to_string(),
            });
        };
        if !dependency.coordinate().has_key(&requested.key()) {
            return Err(ResolveError::IdentityMismatch {
                node: self.to_string(),
                actual: dependency.to_string(),
            });
        }

        let mut current = binding.write();
        if Arc::ptr_eq(&current, &dependency) {
            return Ok(false);
        }
        tracing::debug!(node = %requested, to = %dependency, "rebinding");
        *current = dependency;
        Ok(true)
    }

    /// Child nodes, recomputed when the bound dependency or its children changed
    pub fn children(&self, arena: &NodeArena) -> Vec<NodeId> {
        let dependency = match &self.kind {
            NodeKind::Holder { roots, .. } => return roots.clone(),
            NodeKind::Constraint(_) => return Vec::new(),
            NodeKind::Dependency { binding, .. } => binding.read().clone(),
        };

        let children = dependency.children();
        let constraints = dependency.constraints();
        let source = ViewSource {
            dependency: Arc::as_ptr(&dependency) as usize,
            children: Arc::as_ptr(&children) as usize,
            constraints: Arc::as_ptr(&constraints) as usize,
        };

        let mut view = self.view.lock();
        if view.source == Some(source) {
            return view.children.clone();
        }

        let mut ids = Vec::with_capacity(children.len() + constraints.len());
        for child in children.iter() {
            let id = arena.dependency_node(child.coordinate(), child);
            if !ids.contains(&id) && arena.link(self.id, id) {
                ids.push(id);
            }
        }
        for constraint in constraints.iter() {
            let id = arena.constraint_node(constraint);
            if !ids.contains(&id) {
                arena.link_unchecked(self.id, id);
                ids.push(id);
            }
        }
        for stale in view.children.iter().filter(|old| !ids.contains(old)) {
            arena.unlink(self.id, *stale);
        }

        view.source = Some(source);
        view.children = ids.clone();
        ids
    }

    /// Resolve the bound dependency to `level`; other node kinds have nothing to resolve
    pub async fn resolve_children(
        &self,
        context: &Context,
        level: ResolutionLevel,
    ) -> ResolveResult<()> {
        match self.dependency() {
            Some(dependency) => dependency.resolve_children(context, level).await,
            None => Ok(()),
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        self.dependency()
            .map(|dependency| dependency.messages())
            .unwrap_or_default()
    }
}

impl fmt::Display for DependencyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Holder { name, .. } => f.write_str(name),
            NodeKind::Dependency { requested, binding } => {
                let bound = binding.read();
                let version = &bound.coordinate().version;
                if *version == requested.version {
                    write!(f, "{}", requested)
                } else {
                    write!(f, "{} -> {}", requested, version)
                }
            }
            NodeKind::Constraint(constraint) => write!(f, "{}", constraint),
        }
    }
}

/// Arena owning every node of one resolution context
#[derive(Default)]
pub struct NodeArena {
    nodes: RwLock<Vec<Arc<DependencyNode>>>,
    by_coordinate: DashMap<Coordinate, NodeId>,
    by_constraint: DashMap<String, NodeId>,
    // Serializes the ancestry check with the edge insertion it guards
    edges: Mutex<()>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// The node with the given id
    ///
    /// Ids are only handed out by this arena, so a lookup can not miss.
    pub fn get(&self, id: NodeId) -> Arc<DependencyNode> {
        self.nodes.read()[id.0].clone()
    }

    fn push(&self, kind: NodeKind) -> NodeId {
        let mut nodes = self.nodes.write();
        let id = NodeId(nodes.len());
        nodes.push(Arc::new(DependencyNode::new(id, kind)));
        id
    }

    /// A holder for a set of root coordinates, resolved through `context`
    pub fn add_holder(&self, name: &str, roots: &[Coordinate], context: &Context) -> NodeId {
        let roots: Vec<NodeId> = roots
            .iter()
            .map(|c| self.dependency_node(c, &context.cache.dependency(c)))
            .collect();
        let holder = self.push(NodeKind::Holder {
            name: name.to_string(),
            roots: roots.clone(),
        });
        for root in roots {
            self.link_unchecked(holder, root);
        }
        holder
    }

    /// The node for a requested coordinate, created bound to `dependency` on first request
    pub fn dependency_node(&self, requested: &Coordinate, dependency: &Arc<MavenDependency>) -> NodeId {
        *self
            .by_coordinate
            .entry(requested.clone())
            .or_insert_with(|| {
                self.push(NodeKind::Dependency {
                    requested: requested.clone(),
                    binding: RwLock::new(dependency.clone()),
                })
            })
            .value()
    }

    fn constraint_node(&self, constraint: &Arc<MavenDependencyConstraint>) -> NodeId {
        *self
            .by_constraint
            .entry(constraint.to_string())
            .or_insert_with(|| self.push(NodeKind::Constraint(constraint.clone())))
            .value()
    }

    /// Add `parent` to the parents of `child` unless that closes a cycle
    ///
    /// A child whose key equals the key of `parent` or of any of its ancestors is pruned.
    fn link(&self, parent: NodeId, child: NodeId) -> bool {
        let _edges = self.edges.lock();
        let child_node = self.get(child);
        if let Some(key) = child_node.key() {
            if child == parent || self.has_ancestor_or_self_with_key(parent, &key) {
                tracing::debug!(node = %child_node, "pruning cyclic child");
                return false;
            }
        }
        let mut parents = child_node.parents.write();
        if !parents.contains(&parent) {
            parents.push(parent);
        }
        true
    }

    fn link_unchecked(&self, parent: NodeId, child: NodeId) {
        let _edges = self.edges.lock();
        let child_node = self.get(child);
        let mut parents = child_node.parents.write();
        if !parents.contains(&parent) {
            parents.push(parent);
        }
    }

    fn unlink(&self, parent: NodeId, child: NodeId) {
        let _edges = self.edges.lock();
        self.get(child).parents.write().retain(|p| *p != parent);
    }

    fn has_ancestor_or_self_with_key(&self, id: NodeId, key: &Key) -> bool {
        if self.get(id).key().as_ref() == Some(key) {
            return true;
        }
        self.ancestors(id)
            .into_iter()
            .any(|ancestor| self.get(ancestor).key().as_ref() == Some(key))
    }

    /// Transitive parents of a node
    pub fn ancestors(&self, id: NodeId) -> HashSet<NodeId> {
        let mut visited = HashSet::new();
        let mut queue: VecDeque<NodeId> = self.get(id).parents().into();
        while let Some(next) = queue.pop_front() {
            if visited.insert(next) {
                queue.extend(self.get(next).parents());
            }
        }
        visited
    }

    /// Every node reachable from `root`, breadth-first, `root` included
    pub fn reachable(&self, root: NodeId) -> Vec<NodeId> {
        let mut visited = HashSet::from([root]);
        let mut order = vec![root];
        let mut queue = VecDeque::from([root]);
        while let Some(next) = queue.pop_front() {
            for child in self.get(next).children(self) {
                if visited.insert(child) {
                    order.push(child);
                    queue.push_back(child);
                }
            }
        }
        order
    }

    /// Gradle-style tree rendering; repeated subtrees are printed once and marked `(*)`
    pub fn pretty_print(&self, root: NodeId) -> String {
        let mut out = String::new();
        let mut visited = HashSet::new();
        self.pretty_print_node(root, &mut out, "", "", &mut visited);
        out
    }

    fn pretty_print_node(
        &self,
        id: NodeId,
        out: &mut String,
        prefix: &str,
        child_prefix: &str,
        visited: &mut HashSet<NodeId>,
    ) {
        let node = self.get(id);
        let children = node.children(self);
        let first_visit = visited.insert(id);

        out.push_str(prefix);
        out.push_str(&node.to_string());
        if !first_visit && !children.is_empty() {
            out.push_str(" (*)");
        }
        out.push('\n');
        if !first_visit {
            return;
        }

        for (i, child) in children.iter().enumerate() {
            let last = i + 1 == children.len();
            let (branch, indent) = if last {
                ("\\--- ", "     ")
            } else {
                ("+--- ", "|    ")
            };
            self.pretty_print_node(
                *child,
                out,
                &format!("{}{}", child_prefix, branch),
                &format!("{}{}", child_prefix, indent),
                visited,
            );
        }
    }

    /// Snapshot of the graph below `root` as a petgraph graph
    pub fn to_petgraph(&self, root: NodeId) -> DiGraph<String, ()> {
        let mut graph = DiGraph::new();
        let mut indices: HashMap<NodeId, NodeIndex> = HashMap::new();
        for id in self.reachable(root) {
            indices.insert(id, graph.add_node(self.get(id).to_string()));
        }
        for (&id, &from) in &indices {
            for child in self.get(id).children(self) {
                if let Some(&to) = indices.get(&child) {
                    if !graph.contains_edge(from, to) {
                        graph.add_edge(from, to, ());
                    }
                }
            }
        }
        graph
    }

    /// Graphviz rendering of the graph below `root`
    pub fn to_dot(&self, root: NodeId) -> String {
        let graph = self.to_petgraph(root);
        format!("{:?}", Dot::with_config(&graph, &[Config::EdgeNoLabel]))
    }
}

impl fmt::Debug for NodeArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeArena").field("nodes", &self.len()).finish()
    }
}
