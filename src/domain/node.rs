use std::fmt;

use generational_arena::Index;

use crate::domain::key::NodeKey;
use crate::domain::tree::TreeId;

/// Counter value type.
pub type Count = i64;

/// Stable handle of a node inside the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) Index);

/// What changed on a node when its listeners fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Count,
    DisplayMode,
}

/// Snapshot handed to listeners, enough for a badge to redraw itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEvent {
    pub key: NodeKey,
    pub count: Count,
    pub display_mode: bool,
    pub kind: ChangeKind,
}

/// Change listener. Runs synchronously inside the mutation that triggered it.
pub type Listener = Box<dyn FnMut(&NodeEvent) + Send>;

/// Counter node of the aggregation graph.
///
/// A node owns its base count and caches the sum of its children's totals.
/// Edges are stored on both ends as arena handles; the graph owns every node.
pub struct Node {
    key: NodeKey,
    base_count: Count,
    children_sum: Count,
    display_mode: bool,
    pub(crate) parents: Vec<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// Derived tree membership
    pub(crate) trees: Vec<TreeId>,
    /// Trees this node is the root of
    pub(crate) rooted: Vec<TreeId>,
    listeners: Vec<(u64, Listener)>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("key", &self.key)
            .field("base_count", &self.base_count)
            .field("children_sum", &self.children_sum)
            .field("display_mode", &self.display_mode)
            .field("parents", &self.parents)
            .field("children", &self.children)
            .field("trees", &self.trees)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Node {
    pub fn new(key: NodeKey) -> Self {
        Self {
            key,
            base_count: 0,
            children_sum: 0,
            display_mode: false,
            parents: Vec::new(),
            children: Vec::new(),
            trees: Vec::new(),
            rooted: Vec::new(),
            listeners: Vec::new(),
        }
    }

    pub fn key(&self) -> &NodeKey {
        &self.key
    }

    /// Total shown to the user: own contribution plus children, saturating.
    pub fn count(&self) -> Count {
        self.base_count.saturating_add(self.children_sum)
    }

    pub fn base_count(&self) -> Count {
        self.base_count
    }

    pub fn children_sum(&self) -> Count {
        self.children_sum
    }

    pub fn display_mode(&self) -> bool {
        self.display_mode
    }

    pub fn parents(&self) -> &[NodeId] {
        &self.parents
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn trees(&self) -> &[TreeId] {
        &self.trees
    }

    pub fn is_root(&self) -> bool {
        !self.rooted.is_empty()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Returns false (and stays silent) when the value is unchanged.
    pub(crate) fn set_base_count(&mut self, value: Count) -> bool {
        if self.base_count == value {
            return false;
        }
        self.base_count = value;
        self.notify(ChangeKind::Count);
        true
    }

    pub(crate) fn set_children_sum(&mut self, sum: Count) -> bool {
        if self.children_sum == sum {
            return false;
        }
        self.children_sum = sum;
        self.notify(ChangeKind::Count);
        true
    }

    pub(crate) fn set_display_mode(&mut self, mode: bool) -> bool {
        if self.display_mode == mode {
            return false;
        }
        self.display_mode = mode;
        self.notify(ChangeKind::DisplayMode);
        true
    }

    pub(crate) fn has_parent(&self, parent: NodeId) -> bool {
        self.parents.contains(&parent)
    }

    pub(crate) fn add_listener(&mut self, id: u64, listener: Listener) {
        self.listeners.push((id, listener));
    }

    pub(crate) fn remove_listener(&mut self, id: u64) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    fn notify(&mut self, kind: ChangeKind) {
        if self.listeners.is_empty() {
            return;
        }
        let event = NodeEvent {
            key: self.key.clone(),
            count: self.count(),
            display_mode: self.display_mode,
            kind,
        };
        for (_, listener) in self.listeners.iter_mut() {
            listener(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording_node() -> (Node, Arc<Mutex<Vec<NodeEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let mut node = Node::new(NodeKey::from("Mail"));
        node.add_listener(
            1,
            Box::new(move |e: &NodeEvent| sink.lock().unwrap().push(e.clone())),
        );
        (node, events)
    }

    #[test]
    fn given_new_node_when_inspected_then_is_zero_valued_and_detached() {
        let node = Node::new(NodeKey::from("Mail"));
        assert_eq!(node.count(), 0);
        assert!(node.parents().is_empty());
        assert!(node.children().is_empty());
        assert!(node.trees().is_empty());
        assert!(node.is_leaf());
        assert!(!node.display_mode());
    }

    #[test]
    fn given_same_base_count_when_set_twice_then_notifies_once() {
        let (mut node, events) = recording_node();
        assert!(node.set_base_count(4));
        assert!(!node.set_base_count(4));
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].count, 4);
        assert_eq!(events[0].kind, ChangeKind::Count);
    }

    #[test]
    fn given_children_sum_when_changed_then_count_includes_it() {
        let (mut node, events) = recording_node();
        node.set_base_count(1);
        node.set_children_sum(6);
        assert_eq!(node.count(), 7);
        assert_eq!(events.lock().unwrap().last().map(|e| e.count), Some(7));
    }

    #[test]
    fn given_extreme_values_when_summed_then_count_saturates() {
        let mut node = Node::new(NodeKey::from("Mail"));
        node.set_base_count(Count::MAX);
        node.set_children_sum(1);
        assert_eq!(node.count(), Count::MAX);

        node.set_base_count(Count::MIN);
        node.set_children_sum(-1);
        assert_eq!(node.count(), Count::MIN);
    }

    #[test]
    fn given_display_mode_when_toggled_then_reports_display_change() {
        let (mut node, events) = recording_node();
        assert!(node.set_display_mode(true));
        assert!(!node.set_display_mode(true));
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ChangeKind::DisplayMode);
        assert!(events[0].display_mode);
    }

    #[test]
    fn given_removed_listener_when_value_changes_then_stays_silent() {
        let (mut node, events) = recording_node();
        assert!(node.remove_listener(1));
        assert!(!node.remove_listener(1));
        node.set_base_count(2);
        assert!(events.lock().unwrap().is_empty());
    }
}
