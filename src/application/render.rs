/*
Text rendering of a tree for inspection and debugging.
Nodes shared by several parents show up once under each of them.
 */
use termtree::Tree;
use tracing::instrument;

use crate::application::registry::Registry;
use crate::domain::{Graph, NodeId};

pub trait TreeRender {
    /// Renders the tree `name` as `key (count)` lines, or None if it does not exist.
    fn render_tree(&self, name: &str) -> Option<Tree<String>>;
}

impl TreeRender for Registry {
    #[instrument(level = "debug", skip(self))]
    fn render_tree(&self, name: &str) -> Option<Tree<String>> {
        let root = self.get_tree(name)?.root();
        let mut path = Vec::new();
        build_tree(self.graph(), root, &mut path)
    }
}

fn build_tree(graph: &Graph, id: NodeId, path: &mut Vec<NodeId>) -> Option<Tree<String>> {
    let node = graph.node(id)?;
    let mut tree = Tree::new(format!("{} ({})", node.key(), node.count()));
    path.push(id);
    for &child in node.children() {
        // an edge back onto the current path would never end
        if path.contains(&child) {
            continue;
        }
        if let Some(subtree) = build_tree(graph, child, path) {
            tree.push(subtree);
        }
    }
    path.pop();
    Some(tree)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_small_tree_when_rendered_then_lists_keys_with_counts() {
        let mut registry = Registry::new();
        registry.create_tree("Main", "Inbox").unwrap();
        registry.add_parent("Mail", "Inbox").unwrap();
        registry.set_count("Mail", 2);

        let rendered = registry.render_tree("Main").unwrap().to_string();

        assert!(rendered.starts_with("Inbox (2)"));
        assert!(rendered.contains("Mail (2)"));
    }

    #[test]
    fn given_unknown_tree_when_rendered_then_returns_none() {
        let registry = Registry::new();
        assert!(registry.render_tree("Missing").is_none());
    }
}
