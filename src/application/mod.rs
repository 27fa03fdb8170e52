//! Application layer: registry facade, bulk loading and inspection
//!
//! This layer orchestrates the domain graph and is the only entry point for hosts.

pub mod description;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod render;

pub use description::{GraphDescription, NodeRelation, TreeDescription};
pub use error::{ApplicationError, ApplicationResult};
pub use pipeline::{InitializationPipeline, LoadReport, SkippedTree};
pub use registry::{Registry, SubscriptionToken};
pub use render::TreeRender;
