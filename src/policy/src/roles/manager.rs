//! Role manager for one grouping ptype

use super::graph::RoleGraph;
use crate::config::DEFAULT_MAX_HIERARCHY_LEVEL;
use crate::error::{PolicyError, Result};
use crate::functions::Function;
use crate::rule::{Rule, DOMAIN_INDEX, ROLE_INDEX};
use petgraph::graph::NodeIndex;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Domain key used when grouping rules carry no domain column
const NO_DOMAIN: &str = "";

/// A registered predicate remembered together with its name
#[derive(Clone)]
pub struct NamedFunction {
    /// Registry name
    pub name: String,
    /// Predicate called as `f(value, pattern)`
    pub function: Function,
}

impl NamedFunction {
    /// Pair a name with its predicate
    pub fn new(name: impl Into<String>, function: Function) -> Self {
        Self {
            name: name.into(),
            function,
        }
    }

    fn matches(&self, value: &str, pattern: &str) -> bool {
        (self.function)(&[value, pattern])
    }
}

impl std::fmt::Debug for NamedFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("NamedFunction").field(&self.name).finish()
    }
}

/// Transitive has-role relation for one grouping ptype
///
/// Grouping rules `(child, parent)` link identities in the default domain;
/// rules `(child, parent, domain, ...)` link them inside `domain`. The domain
/// column defaults to the third and other extra columns are ignored. The graph is only ever rebuilt as a whole.
#[derive(Debug, Clone)]
pub struct RoleManager {
    /// One graph per domain
    domains: HashMap<String, RoleGraph>,

    /// Maximum number of hops followed by queries
    max_hierarchy_level: usize,

    /// Pattern matcher for identities, if pattern mode is on
    matching_fn: Option<NamedFunction>,

    /// Pattern matcher for domains, if pattern mode is on
    domain_matching_fn: Option<NamedFunction>,
}

impl RoleManager {
    /// Create an empty manager following at most `max_hierarchy_level` hops
    pub fn new(max_hierarchy_level: usize) -> Self {
        Self {
            domains: HashMap::new(),
            max_hierarchy_level,
            matching_fn: None,
            domain_matching_fn: None,
        }
    }

    /// Clear and reconstruct every graph from `rules`
    ///
    /// Validation runs first, so a rejected rule set leaves the previous
    /// graphs untouched.
    pub fn rebuild(&mut self, rules: &[Rule]) -> Result<()> {
        self.rebuild_with_domain(rules, DOMAIN_INDEX)
    }

    /// Like [`RoleManager::rebuild`], reading the domain from column
    /// `domain_index` instead of the third one
    pub fn rebuild_with_domain(&mut self, rules: &[Rule], domain_index: usize) -> Result<()> {
        if domain_index <= ROLE_INDEX {
            return Err(PolicyError::InvalidArgument(format!(
                "domain column {} overlaps the member or role column",
                domain_index
            )));
        }
        if let Some(bad) = rules.iter().find(|rule| rule.len() < 2) {
            return Err(PolicyError::InvalidArgument(format!(
                "grouping rule {:?} needs at least 2 fields",
                bad
            )));
        }

        self.clear();
        for rule in rules {
            let domain = rule.get(domain_index).map_or(NO_DOMAIN, String::as_str);
            self.add_link(&rule[0], &rule[1], Some(domain));
        }

        debug!(
            "Role graph rebuilt from {} rules across {} domains",
            rules.len(),
            self.domains.len()
        );
        Ok(())
    }

    /// Record that `child` holds `parent` (optionally inside `domain`)
    pub fn add_link(&mut self, child: &str, parent: &str, domain: Option<&str>) {
        self.domains
            .entry(domain.unwrap_or(NO_DOMAIN).to_string())
            .or_default()
            .add_link(child, parent);
    }

    /// Drop every link
    pub fn clear(&mut self) {
        self.domains.clear();
    }

    /// Switch identity matching to pattern mode
    pub fn add_matching_fn(&mut self, function: NamedFunction) {
        self.matching_fn = Some(function);
    }

    /// Switch domain matching to pattern mode
    pub fn add_domain_matching_fn(&mut self, function: NamedFunction) {
        self.domain_matching_fn = Some(function);
    }

    /// Name of the identity matcher, if pattern mode is on
    pub fn matching_fn_name(&self) -> Option<&str> {
        self.matching_fn.as_ref().map(|f| f.name.as_str())
    }

    /// Name of the domain matcher, if pattern mode is on
    pub fn domain_matching_fn_name(&self) -> Option<&str> {
        self.domain_matching_fn.as_ref().map(|f| f.name.as_str())
    }

    /// Hop limit
    pub fn max_hierarchy_level(&self) -> usize {
        self.max_hierarchy_level
    }

    /// Whether `parent` is reachable from `child` (always true when equal)
    pub fn has_link(&self, child: &str, parent: &str, domain: Option<&str>) -> bool {
        if child == parent {
            return true;
        }

        self.graphs_for(domain)
            .into_iter()
            .any(|graph| self.graph_has_link(graph, child, parent))
    }

    /// Roles held directly or transitively by `identity`
    pub fn get_roles(&self, identity: &str, domain: Option<&str>) -> BTreeSet<String> {
        self.collect(identity, domain, Direction::Outgoing, self.max_hierarchy_level)
    }

    /// Roles held directly by `identity`
    pub fn get_direct_roles(&self, identity: &str, domain: Option<&str>) -> BTreeSet<String> {
        self.collect(identity, domain, Direction::Outgoing, 1)
    }

    /// Identities holding `role` directly or transitively
    ///
    /// In pattern mode this is every identity of the graph for which
    /// [`RoleManager::has_link`] holds, so both queries always agree.
    pub fn get_users(&self, role: &str, domain: Option<&str>) -> BTreeSet<String> {
        if self.matching_fn.is_none() {
            return self.collect(role, domain, Direction::Incoming, self.max_hierarchy_level);
        }

        let mut found = BTreeSet::new();
        for graph in self.graphs_for(domain) {
            for (node, _) in graph.nodes() {
                if node != role && self.graph_has_link(graph, node, role) {
                    found.insert(node.to_string());
                }
            }
        }
        found
    }

    /// Domains in which `identity` takes part in any link
    pub fn get_domains(&self, identity: &str) -> BTreeSet<String> {
        self.domains
            .iter()
            .filter(|(domain, _)| domain.as_str() != NO_DOMAIN)
            .filter(|(_, graph)| !self.matching_nodes(graph, identity).is_empty())
            .map(|(domain, _)| domain.clone())
            .collect()
    }

    /// Number of domains holding at least one link
    pub fn domain_count(&self) -> usize {
        self.domains.len()
    }

    fn collect(
        &self,
        name: &str,
        domain: Option<&str>,
        direction: Direction,
        max_depth: usize,
    ) -> BTreeSet<String> {
        let mut found = BTreeSet::new();

        for graph in self.graphs_for(domain) {
            let starts = self.matching_nodes(graph, name);
            for idx in self.reachable(graph, &starts, direction, max_depth) {
                let other = graph.name(idx);
                if other != name {
                    found.insert(other.to_string());
                }
            }
        }

        found
    }

    fn graph_has_link(&self, graph: &RoleGraph, child: &str, parent: &str) -> bool {
        let starts = self.matching_nodes(graph, child);
        starts
            .iter()
            .copied()
            .chain(self.reachable(graph, &starts, Direction::Outgoing, self.max_hierarchy_level))
            .any(|idx| self.identity_matches(parent, graph.name(idx)))
    }

    /// Bounded traversal; in pattern mode every visited identity also takes
    /// the links of the pattern nodes matching it
    fn reachable(
        &self,
        graph: &RoleGraph,
        starts: &[NodeIndex],
        direction: Direction,
        max_depth: usize,
    ) -> Vec<NodeIndex> {
        match self.matching_fn {
            None => graph.reachable(starts, direction, max_depth),
            Some(_) => graph.reachable_with(starts, direction, max_depth, |idx| {
                self.matching_nodes(graph, graph.name(idx))
            }),
        }
    }

    /// Graphs a query in `domain` consults
    fn graphs_for(&self, domain: Option<&str>) -> Vec<&RoleGraph> {
        let domain = domain.unwrap_or(NO_DOMAIN);

        match &self.domain_matching_fn {
            None => self.domains.get(domain).into_iter().collect(),
            Some(matcher) => self
                .domains
                .iter()
                .filter(|(key, _)| key.as_str() == domain || matcher.matches(domain, key))
                .map(|(_, graph)| graph)
                .collect(),
        }
    }

    /// Nodes standing for `name`: the exact node plus, in pattern mode, every
    /// pattern node matching it
    fn matching_nodes(&self, graph: &RoleGraph, name: &str) -> Vec<NodeIndex> {
        match &self.matching_fn {
            None => graph.node(name).into_iter().collect(),
            Some(matcher) => graph
                .nodes()
                .filter(|(node, _)| *node == name || matcher.matches(name, node))
                .map(|(_, idx)| idx)
                .collect(),
        }
    }

    fn identity_matches(&self, wanted: &str, node: &str) -> bool {
        wanted == node
            || self
                .matching_fn
                .as_ref()
                .map_or(false, |matcher| matcher.matches(wanted, node))
    }
}

impl Default for RoleManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HIERARCHY_LEVEL)
    }
}
