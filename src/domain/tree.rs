use std::collections::BTreeMap;

use generational_arena::Index;

use crate::domain::key::NodeKey;
use crate::domain::node::{Count, NodeId};

/// Stable handle of a tree inside the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeId(pub(crate) Index);

/// Named grouping of nodes rooted at one designated node.
///
/// Membership of non-root nodes is derived from their parents by the graph.
/// The member table can also be edited directly; such edits never touch edges.
#[derive(Debug, Clone)]
pub struct TreeMembership {
    name: String,
    root_key: NodeKey,
    root: NodeId,
    members: BTreeMap<NodeKey, NodeId>,
}

/// Aggregate numbers for one tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeStats {
    pub member_count: usize,
    /// Sum of every member's total count
    pub total_count: Count,
    /// Levels below and including the root; a lone root has depth 1
    pub max_depth: usize,
}

impl TreeMembership {
    pub(crate) fn new(name: String, root_key: NodeKey, root: NodeId) -> Self {
        let mut members = BTreeMap::new();
        members.insert(root_key.clone(), root);
        Self {
            name,
            root_key,
            root,
            members,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_key(&self) -> &NodeKey {
        &self.root_key
    }

    pub fn get_node(&self, key: &str) -> Option<NodeId> {
        self.members.get(key).copied()
    }

    pub fn has_node(&self, key: &str) -> bool {
        self.members.contains_key(key)
    }

    /// Member keys in key order.
    pub fn keys(&self) -> impl Iterator<Item = &NodeKey> {
        self.members.keys()
    }

    pub fn members(&self) -> impl Iterator<Item = (&NodeKey, NodeId)> {
        self.members.iter().map(|(k, id)| (k, *id))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false: the root is a permanent member.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub(crate) fn add_node(&mut self, key: NodeKey, id: NodeId) -> bool {
        self.members.insert(key, id).is_none()
    }

    /// The root can never be removed.
    pub(crate) fn remove_node(&mut self, key: &str) -> bool {
        if key == self.root_key.as_str() {
            return false;
        }
        self.members.remove(key).is_some()
    }

    /// Drops every member except the root and returns what was removed.
    pub(crate) fn retain_root(&mut self) -> Vec<NodeId> {
        let root_key = self.root_key.clone();
        let removed = self
            .members
            .iter()
            .filter(|(k, _)| **k != root_key)
            .map(|(_, id)| *id)
            .collect();
        self.members.retain(|k, _| *k == root_key);
        removed
    }
}
