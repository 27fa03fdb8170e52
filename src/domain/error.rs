//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::key::NodeKey;

/// Domain errors represent rejected graph mutations.
/// Tolerated misuse (unknown keys) is logged instead and never ends up here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("tree name must not be empty")]
    EmptyTreeName,

    #[error("invalid tree root key: {0}")]
    InvalidRootKey(NodeKey),

    #[error("tree already exists: {0}")]
    DuplicateTree(String),

    #[error("edge {child} -> {parent} would create a cycle")]
    CycleDetected { child: NodeKey, parent: NodeKey },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
