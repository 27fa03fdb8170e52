//! Two-phase bulk loader.
//!
//! Phase one wires every node and edge of every accepted tree. Phase two
//! assigns initial values, each key exactly once. Wiring has to finish first:
//! a node's total is only right once all of its children are attached.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet, VecDeque};

use itertools::Itertools;
use tracing::{debug, info, instrument, warn};

use crate::application::description::{GraphDescription, NodeRelation, TreeDescription};
use crate::application::registry::Registry;
use crate::config::{InitOrder, Settings};
use crate::domain::{Count, DomainError, NodeKey};

/// A tree the pipeline refused to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedTree {
    pub name: String,
    pub reason: DomainError,
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub trees_created: Vec<String>,
    pub trees_skipped: Vec<SkippedTree>,
    pub rejected_edges: Vec<DomainError>,
    /// Keys in the order their initial value was assigned
    pub initialized: Vec<NodeKey>,
}

impl LoadReport {
    pub fn nodes_initialized(&self) -> usize {
        self.initialized.len()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InitializationPipeline {
    order: InitOrder,
}

impl InitializationPipeline {
    pub fn new(order: InitOrder) -> Self {
        Self { order }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.init_order)
    }

    pub fn order(&self) -> InitOrder {
        self.order
    }

    /// Clears the registry, then loads the description into it.
    pub fn reload(&self, registry: &mut Registry, description: &GraphDescription) -> LoadReport {
        registry.clear();
        self.run(registry, description)
    }

    /// Loads the description into the registry. Never aborts: rejected trees
    /// and edges are logged and listed in the report.
    #[instrument(level = "debug", skip_all, fields(order = ?self.order))]
    pub fn run(&self, registry: &mut Registry, description: &GraphDescription) -> LoadReport {
        let mut report = LoadReport::default();

        let mut accepted: Vec<&TreeDescription> = Vec::new();
        for tree in &description.trees {
            match registry.create_tree(&tree.name, tree.root.clone()) {
                Ok(_) => {
                    report.trees_created.push(tree.name.clone());
                    accepted.push(tree);
                }
                Err(reason) => {
                    warn!(tree = %tree.name, %reason, "skipping tree");
                    report.trees_skipped.push(SkippedTree {
                        name: tree.name.clone(),
                        reason,
                    });
                }
            }
        }

        let relations: Vec<&NodeRelation> = accepted
            .iter()
            .flat_map(|tree| tree.relations.iter())
            .filter(|relation| {
                if relation.key.is_none() {
                    warn!("skipping relation without key");
                }
                !relation.key.is_none()
            })
            .collect();

        // edges first, for everything
        for relation in &relations {
            registry.get_or_create_node(relation.key.clone());
            registry.set_display_mode(relation.key.as_str(), relation.display_mode);
            for parent in &relation.parents {
                if let Err(e) = registry.add_parent(relation.key.clone(), parent.clone()) {
                    warn!(error = %e, "edge rejected during load");
                    report.rejected_edges.push(e);
                }
            }
        }

        let ordered = match self.order {
            InitOrder::Heuristic => heuristic_order(&relations),
            InitOrder::Topological => topological_order(registry, &relations),
        };

        let mut assigned: HashSet<&NodeKey> = HashSet::new();
        for relation in ordered {
            if !assigned.insert(&relation.key) {
                continue;
            }
            debug!(key = %relation.key, value = relation.initial_value, "initial value");
            registry.set_count(relation.key.as_str(), Count::from(relation.initial_value));
            report.initialized.push(relation.key.clone());
        }

        info!(
            trees = report.trees_created.len(),
            skipped = report.trees_skipped.len(),
            nodes = report.nodes_initialized(),
            "graph loaded"
        );
        report
    }
}

/// Descending parent count, stable. Approximates "leaves first" but does not
/// look at real depth: a long single-parent chain is not ordered bottom-up.
fn heuristic_order<'a>(relations: &[&'a NodeRelation]) -> Vec<&'a NodeRelation> {
    relations
        .iter()
        .copied()
        .sorted_by_key(|relation| Reverse(relation.parents.len()))
        .collect()
}

/// Children before parents over the wired graph, ties in description order.
///
/// Only described keys take part; the first relation of a key supplies its value.
fn topological_order<'a>(
    registry: &Registry,
    relations: &[&'a NodeRelation],
) -> Vec<&'a NodeRelation> {
    let firsts: Vec<&NodeRelation> = relations
        .iter()
        .copied()
        .unique_by(|relation| relation.key.clone())
        .collect();
    let position: HashMap<&NodeKey, usize> = firsts
        .iter()
        .enumerate()
        .map(|(i, relation)| (&relation.key, i))
        .collect();

    let mut pending: Vec<usize> = firsts
        .iter()
        .map(|relation| {
            registry
                .child_keys(relation.key.as_str())
                .iter()
                .filter(|child| position.contains_key(child))
                .count()
        })
        .collect();

    let mut queue: VecDeque<usize> = (0..firsts.len()).filter(|i| pending[*i] == 0).collect();
    let mut emitted = vec![false; firsts.len()];
    let mut ordered = Vec::with_capacity(firsts.len());

    while let Some(i) = queue.pop_front() {
        emitted[i] = true;
        ordered.push(firsts[i]);
        for parent in registry.parent_keys(firsts[i].key.as_str()) {
            if let Some(&p) = position.get(&parent) {
                pending[p] -= 1;
                if pending[p] == 0 {
                    queue.push_back(p);
                }
            }
        }
    }

    // only reachable with a cycle in the described part of the graph
    ordered.extend((0..firsts.len()).filter(|i| !emitted[*i]).map(|i| firsts[i]));
    ordered
}
