//! Role graph for one domain
//!
//! Nodes are identities, edges point from a member to the role it is a member
//! of. Traversal is breadth-first and depth-bounded, so cycles in the grouping
//! rules terminate instead of looping.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, HashSet, VecDeque};

/// Directed membership graph
#[derive(Debug, Clone, Default)]
pub struct RoleGraph {
    /// Petgraph directed graph (member -> role)
    graph: DiGraph<String, ()>,

    /// Node index mapping (identity -> NodeIndex)
    nodes: HashMap<String, NodeIndex>,
}

impl RoleGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    fn node_or_insert(&mut self, name: &str) -> NodeIndex {
        if let Some(idx) = self.nodes.get(name) {
            return *idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.nodes.insert(name.to_string(), idx);
        idx
    }

    /// Record that `child` is a member of `parent`
    pub fn add_link(&mut self, child: &str, parent: &str) {
        let from = self.node_or_insert(child);
        let to = self.node_or_insert(parent);
        self.graph.update_edge(from, to, ());
    }

    /// Index of an identity
    pub fn node(&self, name: &str) -> Option<NodeIndex> {
        self.nodes.get(name).copied()
    }

    /// Identity stored at `idx`
    pub fn name(&self, idx: NodeIndex) -> &str {
        &self.graph[idx]
    }

    /// Every identity with its index
    pub fn nodes(&self) -> impl Iterator<Item = (&str, NodeIndex)> {
        self.nodes.iter().map(|(name, idx)| (name.as_str(), *idx))
    }

    /// Number of identities
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of membership edges
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Direct neighbours of `idx` (roles for `Outgoing`, members for `Incoming`)
    pub fn neighbors(&self, idx: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
        self.graph.neighbors_directed(idx, direction).collect()
    }

    /// Nodes reachable from `starts` within `max_depth` hops, excluding hop 0
    ///
    /// A start node is included only if it is reached again through an edge.
    pub fn reachable(
        &self,
        starts: &[NodeIndex],
        direction: Direction,
        max_depth: usize,
    ) -> Vec<NodeIndex> {
        self.reachable_with(starts, direction, max_depth, |_| Vec::new())
    }

    /// Like [`RoleGraph::reachable`], but every expanded node also follows
    /// the edges of the nodes `aliases` returns for it, at the same depth
    ///
    /// Aliases are not reported unless reached through an edge.
    pub fn reachable_with<F>(
        &self,
        starts: &[NodeIndex],
        direction: Direction,
        max_depth: usize,
        aliases: F,
    ) -> Vec<NodeIndex>
    where
        F: Fn(NodeIndex) -> Vec<NodeIndex>,
    {
        let mut expanded: HashSet<NodeIndex> = HashSet::new();
        let mut seen: HashSet<NodeIndex> = HashSet::new();
        let mut reached = Vec::new();
        let mut queue: VecDeque<(NodeIndex, usize)> =
            starts.iter().map(|idx| (*idx, 0)).collect();

        // Queue stays ordered by depth: aliases go to the front at the
        // current depth, neighbours to the back one hop deeper.
        while let Some((current, depth)) = queue.pop_front() {
            if !expanded.insert(current) {
                continue;
            }

            for alias in aliases(current) {
                if !expanded.contains(&alias) {
                    queue.push_front((alias, depth));
                }
            }

            if depth >= max_depth {
                continue;
            }

            for next in self.graph.neighbors_directed(current, direction) {
                if seen.insert(next) {
                    reached.push(next);
                }
                if !expanded.contains(&next) {
                    queue.push_back((next, depth + 1));
                }
            }
        }

        reached
    }
}
