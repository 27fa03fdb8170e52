//! Declarative graph description consumed by the initialization pipeline.
//!
//! How a description is produced (authored by hand, generated by an editor,
//! deserialized from a file) is up to the host; the types only derive serde.

use serde::{Deserialize, Serialize};

use crate::domain::NodeKey;

/// Ordered list of trees to build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphDescription {
    pub trees: Vec<TreeDescription>,
}

/// One named tree with its root and the relations declared under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeDescription {
    pub name: String,
    pub root: NodeKey,
    #[serde(default)]
    pub relations: Vec<NodeRelation>,
}

/// A node, its initial value, display mode and declared parents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRelation {
    pub key: NodeKey,
    #[serde(default)]
    pub initial_value: u32,
    #[serde(default)]
    pub display_mode: bool,
    #[serde(default)]
    pub parents: Vec<NodeKey>,
}

impl GraphDescription {
    pub fn new(trees: Vec<TreeDescription>) -> Self {
        Self { trees }
    }
}

impl TreeDescription {
    pub fn new(
        name: impl Into<String>,
        root: impl Into<NodeKey>,
        relations: Vec<NodeRelation>,
    ) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            relations,
        }
    }
}

impl NodeRelation {
    pub fn new<I, K>(key: impl Into<NodeKey>, initial_value: u32, parents: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<NodeKey>,
    {
        Self {
            key: key.into(),
            initial_value,
            display_mode: false,
            parents: parents.into_iter().map(Into::into).collect(),
        }
    }

    /// Relation with no declared parents, typically a tree root.
    pub fn without_parents(key: impl Into<NodeKey>, initial_value: u32) -> Self {
        Self::new(key, initial_value, Vec::<NodeKey>::new())
    }

    pub fn with_display_mode(mut self, display_mode: bool) -> Self {
        self.display_mode = display_mode;
        self
    }
}
