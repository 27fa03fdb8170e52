//! Attention-badge aggregation graph.
//!
//! Named counters form a DAG: each node shows its own count plus the totals of
//! its children, may feed several parents, and belongs to every named tree one
//! of its parents belongs to. Writes propagate upward and stop at the first
//! ancestor whose total does not change.
//!
//! ```
//! use reddot::Registry;
//!
//! let mut registry = Registry::new();
//! registry.create_tree("Main", "Inbox").unwrap();
//! registry.add_parent("Mail", "Inbox").unwrap();
//! registry.add_parent("Chat", "Inbox").unwrap();
//! registry.set_count("Mail", 1);
//! registry.set_count("Chat", 2);
//! assert_eq!(registry.get_count("Inbox"), 3);
//! ```

pub mod application;
pub mod config;
pub mod domain;
pub mod util;

pub use application::{
    ApplicationError, ApplicationResult, GraphDescription, InitializationPipeline, LoadReport,
    NodeRelation, Registry, SkippedTree, SubscriptionToken, TreeDescription, TreeRender,
};
pub use config::{InitOrder, Settings};
pub use domain::{
    ChangeKind, Count, DomainError, DomainResult, Node, NodeEvent, NodeId, NodeKey, TreeId,
    TreeMembership, TreeStats,
};
