//! Domain layer: the aggregation graph
//!
//! This layer is independent of external concerns (no I/O, no config loading).

pub mod error;
pub mod graph;
pub mod key;
pub mod node;
pub mod tree;

pub use error::{DomainError, DomainResult};
pub use graph::Graph;
pub use key::NodeKey;
pub use node::{ChangeKind, Count, Listener, Node, NodeEvent, NodeId};
pub use tree::{TreeId, TreeMembership, TreeStats};
