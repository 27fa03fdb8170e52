//! Arena-backed aggregation graph.
//!
//! All nodes and trees live in generational arenas; edges are lists of handles
//! stored on both endpoints. Values propagate bottom-up: a change to a node's
//! total makes each parent recompute its children sum from scratch, and
//! propagation stops at the first ancestor whose sum comes out unchanged.
//!
//! Propagation is not deduplicated across paths. In a diamond a shared
//! ancestor is revisited once per path; every revisit after the first finds
//! an already-correct sum and stops there.
//!
//! Tree membership is re-derived for the whole subtree below an edge change
//! instead of being patched incrementally. The subtree is visited once, parents
//! before children, so each descendant is derived exactly once per edge change.
//!
//! Counter arithmetic saturates at the `Count` bounds.

use std::collections::{HashMap, HashSet, VecDeque};

use generational_arena::Arena;
use tracing::{debug, instrument, trace};

use crate::domain::key::NodeKey;
use crate::domain::node::{Count, Node, NodeId};
use crate::domain::tree::{TreeId, TreeMembership};

#[derive(Debug)]
pub struct Graph {
    nodes: Arena<Node>,
    trees: Arena<TreeMembership>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self {
            nodes: Arena::new(),
            trees: Arena::new(),
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn tree(&self, id: TreeId) -> Option<&TreeMembership> {
        self.trees.get(id.0)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().map(|(idx, node)| (NodeId(idx), node))
    }

    pub fn node_len(&self) -> usize {
        self.nodes.len()
    }

    pub fn tree_len(&self) -> usize {
        self.trees.len()
    }

    #[instrument(level = "trace", skip(self))]
    pub fn insert_node(&mut self, key: NodeKey) -> NodeId {
        NodeId(self.nodes.insert(Node::new(key)))
    }

    /// Registers a tree rooted at `root` and derives membership below it.
    #[instrument(level = "debug", skip(self))]
    pub fn insert_tree(&mut self, name: String, root_key: NodeKey, root: NodeId) -> TreeId {
        let tree_id = TreeId(self.trees.insert(TreeMembership::new(name, root_key, root)));
        if let Some(node) = self.node_mut(root) {
            node.rooted.push(tree_id);
        }
        self.refresh_trees(root);
        tree_id
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.trees.clear();
    }

    /// Sets the base count and propagates upward. No-op for an unchanged value.
    #[instrument(level = "trace", skip(self))]
    pub fn set_count(&mut self, id: NodeId, value: Count) -> bool {
        let changed = match self.node_mut(id) {
            Some(node) => node.set_base_count(value),
            None => false,
        };
        if changed {
            self.update_parents(id);
        }
        changed
    }

    pub fn set_display_mode(&mut self, id: NodeId, mode: bool) -> bool {
        match self.node_mut(id) {
            Some(node) => node.set_display_mode(mode),
            None => false,
        }
    }

    /// Adds the edge `child -> parent`.
    ///
    /// Returns false if either node is gone or the edge already exists.
    /// The caller guarantees the edge does not close a cycle.
    #[instrument(level = "debug", skip(self))]
    pub fn add_edge(&mut self, child: NodeId, parent: NodeId) -> bool {
        if self.node(parent).is_none() {
            return false;
        }
        match self.node_mut(child) {
            Some(node) if !node.has_parent(parent) => node.parents.push(parent),
            _ => return false,
        }
        if let Some(node) = self.node_mut(parent) {
            node.children.push(child);
        }
        self.refresh_trees(child);
        self.update_from_children(parent);
        true
    }

    #[instrument(level = "debug", skip(self))]
    pub fn remove_edge(&mut self, child: NodeId, parent: NodeId) -> bool {
        match self.node_mut(child) {
            Some(node) if node.has_parent(parent) => node.parents.retain(|p| *p != parent),
            _ => return false,
        }
        if let Some(node) = self.node_mut(parent) {
            node.children.retain(|c| *c != child);
        }
        self.refresh_trees(child);
        self.update_from_children(parent);
        true
    }

    /// Recomputes this node's children sum from its direct children.
    ///
    /// Children are assumed to hold correct totals already. Recurses into the
    /// parents only when the sum actually changed.
    pub fn update_from_children(&mut self, id: NodeId) {
        let sum: Count = match self.node(id) {
            Some(node) => node
                .children
                .iter()
                .filter_map(|c| self.node(*c))
                .map(Node::count)
                .fold(0, Count::saturating_add),
            None => return,
        };
        let changed = match self.node_mut(id) {
            Some(node) => node.set_children_sum(sum),
            None => false,
        };
        if changed {
            trace!(node = ?id, sum, "children sum changed");
            self.update_parents(id);
        }
    }

    fn update_parents(&mut self, id: NodeId) {
        let parents = match self.node(id) {
            Some(node) => node.parents.clone(),
            None => return,
        };
        for parent in parents {
            self.update_from_children(parent);
        }
    }

    /// Re-derives tree membership for `id` and every descendant.
    pub fn refresh_trees(&mut self, id: NodeId) {
        for current in self.subtree_order(id) {
            self.refresh_node_trees(current);
        }
    }

    fn refresh_node_trees(&mut self, id: NodeId) {
        let derived = self.derive_trees(id);
        let (key, previous) = match self.node_mut(id) {
            Some(node) => (
                node.key().clone(),
                std::mem::replace(&mut node.trees, derived.clone()),
            ),
            None => return,
        };

        for tree_id in previous.iter().filter(|t| !derived.contains(t)) {
            if let Some(tree) = self.trees.get_mut(tree_id.0) {
                tree.remove_node(key.as_str());
            }
        }
        for tree_id in &derived {
            if let Some(tree) = self.trees.get_mut(tree_id.0) {
                tree.add_node(key.clone(), id);
            }
        }
        if previous != derived {
            debug!(node = %key, trees = derived.len(), "tree membership changed");
        }
    }

    /// `id` and all of its descendants, every node after all of its parents
    /// inside the subtree.
    fn subtree_order(&self, id: NodeId) -> Vec<NodeId> {
        let mut members = HashSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !members.insert(current) {
                continue;
            }
            if let Some(node) = self.node(current) {
                stack.extend(node.children.iter().copied());
            }
        }

        let mut pending: HashMap<NodeId, usize> = members
            .iter()
            .map(|member| {
                let parents = self
                    .node(*member)
                    .map(|node| node.parents.iter().filter(|p| members.contains(p)).count())
                    .unwrap_or(0);
                (*member, parents)
            })
            .collect();
        // start node goes first even if a cycle leads back into it
        pending.insert(id, 0);

        let mut ordered = Vec::with_capacity(members.len());
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            ordered.push(current);
            if let Some(node) = self.node(current) {
                for child in &node.children {
                    if let Some(count) = pending.get_mut(child) {
                        if *count > 0 {
                            *count -= 1;
                            if *count == 0 {
                                queue.push_back(*child);
                            }
                        }
                    }
                }
            }
        }

        // only reachable with a cycle below `id`
        if ordered.len() < members.len() {
            let emitted: HashSet<NodeId> = ordered.iter().copied().collect();
            ordered.extend(members.into_iter().filter(|m| !emitted.contains(m)));
        }
        ordered
    }

    /// Own rooted trees first, then the parents' trees in parent order.
    fn derive_trees(&self, id: NodeId) -> Vec<TreeId> {
        let mut derived: Vec<TreeId> = Vec::new();
        if let Some(node) = self.node(id) {
            let inherited = node
                .parents
                .iter()
                .filter_map(|p| self.node(*p))
                .flat_map(|p| p.trees.iter().copied());
            for tree_id in node.rooted.iter().copied().chain(inherited) {
                if !derived.contains(&tree_id) {
                    derived.push(tree_id);
                }
            }
        }
        derived
    }

    /// True if `to` can be reached from `from` following child edges,
    /// or if both are the same node.
    pub fn is_descendant(&self, from: NodeId, to: NodeId) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(node) = self.node(current) {
                stack.extend(node.children.iter().copied());
            }
        }
        false
    }

    /// Longest chain of levels starting at `root`, memoized over shared nodes.
    pub fn max_depth(&self, root: NodeId) -> usize {
        let mut memo = HashMap::new();
        self.depth_of(root, &mut memo)
    }

    fn depth_of(&self, id: NodeId, memo: &mut HashMap<NodeId, usize>) -> usize {
        if let Some(depth) = memo.get(&id) {
            return *depth;
        }
        // placeholder terminates the walk on a cycle
        memo.insert(id, 1);
        let depth = match self.node(id) {
            Some(node) => {
                1 + node
                    .children
                    .iter()
                    .map(|child| self.depth_of(*child, memo))
                    .max()
                    .unwrap_or(0)
            }
            None => 0,
        };
        memo.insert(id, depth);
        depth
    }

    /// Adds a node to a tree's member table and to the node's tree list.
    pub fn attach_to_tree(&mut self, tree_id: TreeId, id: NodeId) -> bool {
        let key = match self.node_mut(id) {
            Some(node) => {
                if !node.trees.contains(&tree_id) {
                    node.trees.push(tree_id);
                }
                node.key().clone()
            }
            None => return false,
        };
        match self.trees.get_mut(tree_id.0) {
            Some(tree) => tree.add_node(key, id),
            None => false,
        }
    }

    /// Removes a node from a tree's member table without touching edges.
    ///
    /// Descendants keep their membership until the next re-derivation.
    pub fn detach_from_tree(&mut self, tree_id: TreeId, id: NodeId) -> bool {
        let key = match self.node(id) {
            Some(node) => node.key().clone(),
            None => return false,
        };
        let removed = match self.trees.get_mut(tree_id.0) {
            Some(tree) => tree.remove_node(key.as_str()),
            None => false,
        };
        if removed {
            if let Some(node) = self.node_mut(id) {
                node.trees.retain(|t| *t != tree_id);
            }
        }
        removed
    }

    /// Drops every member except the root and resets the root's base count.
    #[instrument(level = "debug", skip(self))]
    pub fn clear_tree(&mut self, tree_id: TreeId) -> bool {
        let (root, removed) = match self.trees.get_mut(tree_id.0) {
            Some(tree) => (tree.root(), tree.retain_root()),
            None => return false,
        };
        for id in removed {
            if let Some(node) = self.node_mut(id) {
                node.trees.retain(|t| *t != tree_id);
            }
        }
        self.set_count(root, 0);
        true
    }
}
