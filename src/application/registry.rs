//! Registry: the facade owning every node and tree.
//!
//! All mutations go through here. Operations on keys that were never created
//! are tolerated and logged, since UI-driven calls can race against teardown.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, instrument, warn};

use crate::config::Settings;
use crate::domain::{
    Count, DomainError, DomainResult, Graph, Node, NodeEvent, NodeId, NodeKey, TreeId,
    TreeMembership, TreeStats,
};

/// Handle returned by [`Registry::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken {
    node: NodeId,
    id: u64,
}

#[derive(Debug, Default)]
pub struct Registry {
    graph: Graph,
    nodes: HashMap<NodeKey, NodeId>,
    trees: BTreeMap<String, TreeId>,
    settings: Settings,
    next_listener: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            graph: Graph::new(),
            nodes: HashMap::new(),
            trees: BTreeMap::new(),
            settings,
            next_listener: 0,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Creates a tree rooted at `root`, creating the root node if needed.
    #[instrument(level = "debug", skip(self, root))]
    pub fn create_tree(&mut self, name: &str, root: impl Into<NodeKey>) -> DomainResult<TreeId> {
        let root = root.into();
        if name.is_empty() {
            return Err(DomainError::EmptyTreeName);
        }
        if root.is_none() {
            return Err(DomainError::InvalidRootKey(root));
        }
        if self.trees.contains_key(name) {
            return Err(DomainError::DuplicateTree(name.to_string()));
        }
        let root_id = self.get_or_create_node(root.clone());
        let tree_id = self.graph.insert_tree(name.to_string(), root, root_id);
        self.trees.insert(name.to_string(), tree_id);
        debug!(tree = name, "tree created");
        Ok(tree_id)
    }

    /// Returns the node for `key`, creating a zero-valued detached node first if needed.
    pub fn get_or_create_node(&mut self, key: impl Into<NodeKey>) -> NodeId {
        let key = key.into();
        if let Some(id) = self.nodes.get(&key) {
            return *id;
        }
        let id = self.graph.insert_node(key.clone());
        self.nodes.insert(key, id);
        id
    }

    pub fn node_id(&self, key: &str) -> Option<NodeId> {
        self.nodes.get(key).copied()
    }

    pub fn get_node(&self, key: &str) -> Option<&Node> {
        self.node_id(key).and_then(|id| self.graph.node(id))
    }

    pub fn tree_id(&self, name: &str) -> Option<TreeId> {
        self.trees.get(name).copied()
    }

    pub fn get_tree(&self, name: &str) -> Option<&TreeMembership> {
        self.tree_id(name).and_then(|id| self.graph.tree(id))
    }

    /// Total count of `key`, 0 if unknown.
    pub fn get_count(&self, key: &str) -> Count {
        self.get_node(key).map(Node::count).unwrap_or(0)
    }

    pub fn display_mode(&self, key: &str) -> bool {
        self.get_node(key).map(Node::display_mode).unwrap_or(false)
    }

    /// Adds the edge `child -> parent`, creating both nodes if needed.
    ///
    /// Returns `Ok(false)` if the edge already existed. With the cycle guard
    /// enabled an edge closing a cycle is rejected and nothing is linked.
    #[instrument(level = "debug", skip(self, child, parent))]
    pub fn add_parent(
        &mut self,
        child: impl Into<NodeKey>,
        parent: impl Into<NodeKey>,
    ) -> DomainResult<bool> {
        let child = child.into();
        let parent = parent.into();
        let child_id = self.get_or_create_node(child.clone());
        let parent_id = self.get_or_create_node(parent.clone());
        if self.settings.cycle_guard && self.graph.is_descendant(child_id, parent_id) {
            warn!(%child, %parent, "rejecting edge that closes a cycle");
            return Err(DomainError::CycleDetected { child, parent });
        }
        Ok(self.graph.add_edge(child_id, parent_id))
    }

    #[instrument(level = "debug", skip(self))]
    pub fn remove_parent(&mut self, child: &str, parent: &str) -> bool {
        match (self.node_id(child), self.node_id(parent)) {
            (Some(child_id), Some(parent_id)) => self.graph.remove_edge(child_id, parent_id),
            (None, _) => {
                self.unknown_key("remove_parent", child);
                false
            }
            (Some(_), None) => {
                self.unknown_key("remove_parent", parent);
                false
            }
        }
    }

    /// Sets the base count of `key`. Returns true if the value changed.
    #[instrument(level = "trace", skip(self))]
    pub fn set_count(&mut self, key: &str, value: Count) -> bool {
        match self.node_id(key) {
            Some(id) => self.graph.set_count(id, value),
            None => {
                self.unknown_key("set_count", key);
                false
            }
        }
    }

    pub fn set_display_mode(&mut self, key: &str, mode: bool) -> bool {
        match self.node_id(key) {
            Some(id) => self.graph.set_display_mode(id, mode),
            None => {
                self.unknown_key("set_display_mode", key);
                false
            }
        }
    }

    /// Registers a change listener on `key`, creating the node if needed so a
    /// view can bind before its value is known.
    pub fn subscribe<F>(&mut self, key: impl Into<NodeKey>, listener: F) -> SubscriptionToken
    where
        F: FnMut(&NodeEvent) + Send + 'static,
    {
        let node = self.get_or_create_node(key);
        let id = self.next_listener;
        self.next_listener += 1;
        if let Some(n) = self.graph.node_mut(node) {
            n.add_listener(id, Box::new(listener));
        }
        SubscriptionToken { node, id }
    }

    /// Returns false if the token is stale (already removed or cleared).
    pub fn unsubscribe(&mut self, token: SubscriptionToken) -> bool {
        self.graph
            .node_mut(token.node)
            .map(|n| n.remove_listener(token.id))
            .unwrap_or(false)
    }

    pub fn parent_keys(&self, key: &str) -> Vec<NodeKey> {
        self.get_node(key)
            .map(|n| self.keys_of(n.parents()))
            .unwrap_or_default()
    }

    pub fn child_keys(&self, key: &str) -> Vec<NodeKey> {
        self.get_node(key)
            .map(|n| self.keys_of(n.children()))
            .unwrap_or_default()
    }

    /// Names of the trees `key` currently belongs to.
    pub fn tree_names_of(&self, key: &str) -> Vec<String> {
        self.get_node(key)
            .map(|n| {
                n.trees()
                    .iter()
                    .filter_map(|t| self.graph.tree(*t))
                    .map(|t| t.name().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Puts an existing node into a tree's member table. Edges are untouched.
    pub fn add_to_tree(&mut self, name: &str, key: &str) -> bool {
        match (self.tree_id(name), self.node_id(key)) {
            (Some(tree), Some(node)) => self.graph.attach_to_tree(tree, node),
            (None, _) => {
                self.unknown_tree("add_to_tree", name);
                false
            }
            (Some(_), None) => {
                self.unknown_key("add_to_tree", key);
                false
            }
        }
    }

    /// Takes a node out of a tree's member table. Edges are untouched and the
    /// root can never be removed.
    pub fn remove_from_tree(&mut self, name: &str, key: &str) -> bool {
        match (self.tree_id(name), self.node_id(key)) {
            (Some(tree), Some(node)) => self.graph.detach_from_tree(tree, node),
            (None, _) => {
                self.unknown_tree("remove_from_tree", name);
                false
            }
            (Some(_), None) => {
                self.unknown_key("remove_from_tree", key);
                false
            }
        }
    }

    /// Empties a tree down to its root and resets the root's own count.
    pub fn clear_tree(&mut self, name: &str) -> bool {
        match self.tree_id(name) {
            Some(tree) => self.graph.clear_tree(tree),
            None => {
                self.unknown_tree("clear_tree", name);
                false
            }
        }
    }

    pub fn tree_stats(&self, name: &str) -> Option<TreeStats> {
        let tree = self.get_tree(name)?;
        let total_count = tree
            .members()
            .filter_map(|(_, id)| self.graph.node(id))
            .map(Node::count)
            .fold(0, Count::saturating_add);
        Some(TreeStats {
            member_count: tree.len(),
            total_count,
            max_depth: self.graph.max_depth(tree.root()),
        })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn tree_names(&self) -> impl Iterator<Item = &str> {
        self.trees.keys().map(String::as_str)
    }

    /// Discards every node, tree and listener.
    #[instrument(level = "debug", skip(self))]
    pub fn clear(&mut self) {
        self.graph.clear();
        self.nodes.clear();
        self.trees.clear();
    }

    fn keys_of(&self, ids: &[NodeId]) -> Vec<NodeKey> {
        ids.iter()
            .filter_map(|id| self.graph.node(*id))
            .map(|n| n.key().clone())
            .collect()
    }

    fn unknown_key(&self, operation: &str, key: &str) {
        if self.settings.warn_unknown_keys {
            warn!(operation, key = %key, "unknown node key, ignoring");
        } else {
            debug!(operation, key = %key, "unknown node key, ignoring");
        }
    }

    fn unknown_tree(&self, operation: &str, name: &str) {
        if self.settings.warn_unknown_keys {
            warn!(operation, tree = %name, "unknown tree, ignoring");
        } else {
            debug!(operation, tree = %name, "unknown tree, ignoring");
        }
    }
}
