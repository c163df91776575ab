//! Directed acyclic graph of resource descriptors.
//!
//! Resources reference each other by [`LogicalId`]. The graph records those
//! references as edges and derives the build order from them, so the order in
//! which a stack happens to declare its resources is never load-bearing.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::error::{GraphError, GraphResult};
use crate::id::{LogicalId, ResourceKind};

/// A resource descriptor that can live in a [`StackGraph`].
pub trait GraphNode: fmt::Debug {
    /// The kind of this resource.
    fn kind(&self) -> ResourceKind;

    /// Ids of the resources this one references.
    fn dependencies(&self) -> Vec<LogicalId>;
}

/// A resource together with its logical id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceNode<R> {
    /// Logical id.
    pub id: LogicalId,
    /// The descriptor.
    pub resource: R,
}

impl<R: GraphNode> ResourceNode<R> {
    /// Kind of the wrapped resource.
    pub fn kind(&self) -> ResourceKind {
        self.resource.kind()
    }

    /// Deduplicated dependencies, in reference order.
    pub fn dependencies(&self) -> Vec<LogicalId> {
        let mut seen = BTreeSet::new();
        self.resource
            .dependencies()
            .into_iter()
            .filter(|dep| seen.insert(dep.clone()))
            .collect()
    }
}

/// The resource graph of a stack.
///
/// Nodes keep their declaration order; [`StackGraph::topological_order`]
/// uses it to break ties so the derived order is deterministic.
#[derive(Debug, Clone, Serialize)]
pub struct StackGraph<R> {
    nodes: Vec<ResourceNode<R>>,
    #[serde(skip)]
    index: HashMap<LogicalId, usize>,
}

impl<R> Default for StackGraph<R> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<R: PartialEq> PartialEq for StackGraph<R> {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
    }
}

impl<R: GraphNode> StackGraph<R> {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a resource.
    ///
    /// Every dependency must already be declared, which keeps the graph
    /// acyclic by construction.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is taken or a dependency is unknown.
    pub fn insert(&mut self, id: LogicalId, resource: R) -> GraphResult<()> {
        if self.index.contains_key(&id) {
            return Err(GraphError::DuplicateResource(id));
        }

        let node = ResourceNode { id, resource };
        for dep in node.dependencies() {
            if !self.index.contains_key(&dep) {
                return Err(GraphError::UnknownReference {
                    from: node.id.clone(),
                    to: dep,
                });
            }
            debug!(from = %node.id, to = %dep, "Dependency edge");
        }

        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    /// Assemble a graph from nodes in any order.
    ///
    /// Forward references are allowed here; cycles are reported by
    /// [`StackGraph::topological_order`].
    pub fn from_nodes(nodes: Vec<ResourceNode<R>>) -> GraphResult<Self> {
        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.id.clone(), i).is_some() {
                return Err(GraphError::DuplicateResource(node.id.clone()));
            }
        }

        for node in &nodes {
            for dep in node.dependencies() {
                if !index.contains_key(&dep) {
                    return Err(GraphError::UnknownReference {
                        from: node.id.clone(),
                        to: dep,
                    });
                }
            }
        }

        Ok(Self { nodes, index })
    }

    /// Get a resource by id.
    pub fn get(&self, id: &LogicalId) -> Option<&R> {
        self.node(id).map(|n| &n.resource)
    }

    /// Get a node by id.
    pub fn node(&self, id: &LogicalId) -> Option<&ResourceNode<R>> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Check whether an id is declared.
    pub fn contains(&self, id: &LogicalId) -> bool {
        self.index.contains_key(id)
    }

    /// Number of resources.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate nodes in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ResourceNode<R>> + '_ {
        self.nodes.iter()
    }

    /// All ids in declaration order.
    pub fn ids(&self) -> Vec<LogicalId> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }

    /// Nodes of a given kind, in declaration order.
    pub fn by_kind(&self, kind: ResourceKind) -> Vec<&ResourceNode<R>> {
        self.nodes.iter().filter(|n| n.kind() == kind).collect()
    }

    /// Direct dependencies of a resource.
    pub fn dependencies_of(&self, id: &LogicalId) -> Vec<LogicalId> {
        self.node(id).map(|n| n.dependencies()).unwrap_or_default()
    }

    /// Resources that directly reference `id`.
    pub fn dependents_of(&self, id: &LogicalId) -> Vec<LogicalId> {
        self.nodes
            .iter()
            .filter(|n| n.dependencies().contains(id))
            .map(|n| n.id.clone())
            .collect()
    }

    /// Check whether `id` depends on `target`, directly or transitively.
    pub fn depends_on(&self, id: &LogicalId, target: &LogicalId) -> bool {
        let mut stack = self.dependencies_of(id);
        let mut visited = BTreeSet::new();
        while let Some(next) = stack.pop() {
            if &next == target {
                return true;
            }
            if visited.insert(next.clone()) {
                stack.extend(self.dependencies_of(&next));
            }
        }
        false
    }

    /// All edges as `(dependent, dependency)` pairs.
    pub fn edges(&self) -> Vec<(LogicalId, LogicalId)> {
        self.nodes
            .iter()
            .flat_map(|n| {
                n.dependencies()
                    .into_iter()
                    .map(move |dep| (n.id.clone(), dep))
            })
            .collect()
    }

    /// Derive the build order from the dependency edges.
    ///
    /// Every resource appears after all of its dependencies. Among resources
    /// that are ready at the same time, the one declared first wins.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Cycle`] with the unresolved ids if the edges
    /// contain a cycle.
    pub fn topological_order(&self) -> GraphResult<Vec<LogicalId>> {
        let deps: Vec<Vec<usize>> = self
            .nodes
            .iter()
            .map(|n| n.dependencies().iter().map(|d| self.index[d]).collect())
            .collect();

        let mut remaining: Vec<usize> = deps.iter().map(Vec::len).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for (i, node_deps) in deps.iter().enumerate() {
            for &d in node_deps {
                dependents[d].push(i);
            }
        }

        let mut ready: BTreeSet<usize> = remaining
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == 0)
            .map(|(i, _)| i)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(next) = ready.pop_first() {
            order.push(self.nodes[next].id.clone());
            for &dependent in &dependents[next] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() != self.nodes.len() {
            let stuck = remaining
                .iter()
                .enumerate()
                .filter(|(_, count)| **count > 0)
                .map(|(i, _)| self.nodes[i].id.clone())
                .collect();
            return Err(GraphError::Cycle(stuck));
        }

        Ok(order)
    }
}
