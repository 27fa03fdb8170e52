//! Tests for bottom-up value propagation and the graph-wide invariants

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use rstest::{fixture, rstest};

use reddot::util::testing;
use reddot::{Count, Node, NodeEvent, Registry};

type Events = Arc<Mutex<Vec<NodeEvent>>>;

fn record(registry: &mut Registry, key: &str) -> Events {
    let events: Events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    registry.subscribe(key, move |e: &NodeEvent| sink.lock().unwrap().push(e.clone()));
    events
}

fn counts(events: &Events) -> Vec<Count> {
    events.lock().unwrap().iter().map(|e| e.count).collect()
}

/// Checks both at-rest invariants for every node in the registry.
fn assert_invariants(registry: &Registry) {
    let graph = registry.graph();
    for (_, node) in graph.nodes() {
        let children: Count = node
            .children()
            .iter()
            .filter_map(|c| graph.node(*c))
            .map(Node::count)
            .sum();
        assert_eq!(node.children_sum(), children, "stale sum on {}", node.key());
        assert_eq!(node.count(), node.base_count() + node.children_sum());

        if node.is_root() {
            continue;
        }
        let inherited: BTreeSet<String> = node
            .parents()
            .iter()
            .filter_map(|p| graph.node(*p))
            .flat_map(|p| registry.tree_names_of(p.key().as_str()))
            .collect();
        let own: BTreeSet<String> = registry
            .tree_names_of(node.key().as_str())
            .into_iter()
            .collect();
        assert_eq!(own, inherited, "tree set of {}", node.key());
    }
}

#[fixture]
fn registry() -> Registry {
    testing::init_test_setup();
    Registry::new()
}

// ============================================================
// Chain Tests
// ============================================================

#[rstest]
fn given_chain_when_leaf_set_then_every_ancestor_carries_value(mut registry: Registry) {
    // C is parent of B, B is parent of A
    registry.add_parent("A", "B").unwrap();
    registry.add_parent("B", "C").unwrap();

    registry.set_count("A", 5);

    assert_eq!(registry.get_count("B"), 5);
    assert_eq!(registry.get_count("C"), 5);
    assert_invariants(&registry);
}

#[rstest]
fn given_chain_when_leaf_changes_then_each_node_notified_exactly_once(mut registry: Registry) {
    registry.add_parent("A", "B").unwrap();
    registry.add_parent("B", "C").unwrap();
    registry.set_count("A", 5);
    let a = record(&mut registry, "A");
    let b = record(&mut registry, "B");
    let c = record(&mut registry, "C");

    registry.set_count("A", 3);

    assert_eq!(registry.get_count("B"), 3);
    assert_eq!(registry.get_count("C"), 3);
    assert_eq!(counts(&a), vec![3]);
    assert_eq!(counts(&b), vec![3]);
    assert_eq!(counts(&c), vec![3]);
}

#[rstest]
fn given_same_value_when_set_twice_then_only_first_call_notifies(mut registry: Registry) {
    registry.add_parent("A", "B").unwrap();
    let a = record(&mut registry, "A");
    let b = record(&mut registry, "B");

    assert!(registry.set_count("A", 7));
    assert!(!registry.set_count("A", 7));

    assert_eq!(counts(&a), vec![7]);
    assert_eq!(counts(&b), vec![7]);
}

// ============================================================
// Fan-in and Multi-parent Tests
// ============================================================

#[rstest]
fn given_two_children_when_both_set_then_parent_sums_them(mut registry: Registry) {
    registry.add_parent("X", "P").unwrap();
    registry.add_parent("Y", "P").unwrap();

    registry.set_count("X", 2);
    registry.set_count("Y", 3);
    assert_eq!(registry.get_count("P"), 5);

    let p = record(&mut registry, "P");
    registry.set_count("X", 2);
    assert!(p.lock().unwrap().is_empty());
    assert_invariants(&registry);
}

#[rstest]
fn given_node_under_two_tree_roots_when_set_then_both_roots_update(mut registry: Registry) {
    registry.create_tree("T1", "P1").unwrap();
    registry.create_tree("T2", "P2").unwrap();
    registry.add_parent("N", "P1").unwrap();
    registry.add_parent("N", "P2").unwrap();

    registry.set_count("N", 4);

    assert_eq!(registry.get_count("P1"), 4);
    assert_eq!(registry.get_count("P2"), 4);
    assert_eq!(registry.tree_names_of("N"), vec!["T1", "T2"]);
    assert_invariants(&registry);
}

#[rstest]
fn given_diamond_when_leaf_changes_then_shared_ancestor_settles_on_correct_total(
    mut registry: Registry,
) {
    registry.create_tree("Main", "Top").unwrap();
    registry.add_parent("Left", "Top").unwrap();
    registry.add_parent("Right", "Top").unwrap();
    registry.add_parent("Leaf", "Left").unwrap();
    registry.add_parent("Leaf", "Right").unwrap();
    let top = record(&mut registry, "Top");

    registry.set_count("Leaf", 1);

    // one path at a time: Top is revisited, never double counted
    assert_eq!(counts(&top), vec![1, 2]);
    assert_eq!(registry.get_count("Top"), 2);
    assert_invariants(&registry);
}

#[rstest]
fn given_own_value_and_children_when_both_set_then_count_is_their_sum(mut registry: Registry) {
    registry.add_parent("Mail", "Inbox").unwrap();

    registry.set_count("Inbox", 10);
    registry.set_count("Mail", 1);

    let inbox = registry.get_node("Inbox").unwrap();
    assert_eq!(inbox.base_count(), 10);
    assert_eq!(inbox.children_sum(), 1);
    assert_eq!(inbox.count(), 11);
}

#[rstest]
fn given_siblings_at_counter_bounds_when_set_then_ancestors_saturate(mut registry: Registry) {
    registry.add_parent("A", "P").unwrap();
    registry.add_parent("B", "P").unwrap();
    registry.add_parent("P", "G").unwrap();

    registry.set_count("A", Count::MAX);
    registry.set_count("B", 1);

    assert_eq!(registry.get_count("P"), Count::MAX);
    assert_eq!(registry.get_count("G"), Count::MAX);

    registry.set_count("B", -1);

    assert_eq!(registry.get_count("P"), Count::MAX - 1);
    assert_eq!(registry.get_count("G"), Count::MAX - 1);
}

// ============================================================
// Edge Change Tests
// ============================================================

#[rstest]
fn given_valued_child_when_detached_then_ancestors_drop_its_value(mut registry: Registry) {
    registry.add_parent("A", "B").unwrap();
    registry.add_parent("B", "C").unwrap();
    registry.set_count("A", 5);
    let c = record(&mut registry, "C");

    assert!(registry.remove_parent("A", "B"));

    assert_eq!(registry.get_count("B"), 0);
    assert_eq!(registry.get_count("C"), 0);
    assert_eq!(counts(&c), vec![0]);
    assert!(!registry.remove_parent("A", "B"));
    assert_invariants(&registry);
}

#[rstest]
fn given_valued_subtree_when_attached_later_then_parent_picks_up_total(mut registry: Registry) {
    registry.add_parent("Leaf", "Mid").unwrap();
    registry.set_count("Leaf", 2);
    registry.set_count("Mid", 1);

    registry.add_parent("Mid", "Root").unwrap();

    assert_eq!(registry.get_count("Root"), 3);
    assert_invariants(&registry);
}

#[rstest]
fn given_negative_delta_when_set_then_propagates_like_any_value(mut registry: Registry) {
    registry.add_parent("A", "B").unwrap();

    registry.set_count("A", -2);

    assert_eq!(registry.get_count("B"), -2);
}

// ============================================================
// Mixed Workload Tests
// ============================================================

#[rstest]
fn given_layered_graph_when_mixed_writes_applied_then_invariants_hold(mut registry: Registry) {
    registry.create_tree("Main", "Root").unwrap();
    registry.create_tree("Side", "SideRoot").unwrap();
    let layers: [&[&str]; 3] = [&["L1a", "L1b"], &["L2a", "L2b", "L2c"], &["L3a", "L3b"]];
    let mut above: Vec<&str> = vec!["Root", "SideRoot"];
    for layer in layers {
        for (i, key) in layer.iter().enumerate() {
            registry.add_parent(*key, above[i % above.len()]).unwrap();
            registry
                .add_parent(*key, above[(i + 1) % above.len()])
                .unwrap();
        }
        above = layer.to_vec();
    }

    let mut expected: HashMap<&str, Count> = HashMap::new();
    for (step, key) in ["L3a", "L2b", "L3b", "L1a", "L3a", "L2c", "L1b"]
        .into_iter()
        .enumerate()
    {
        let value = (step as Count % 4) + 1;
        registry.set_count(key, value);
        expected.insert(key, value);
        assert_invariants(&registry);
    }
    registry.remove_parent("L2b", "L1a");
    assert_invariants(&registry);
    registry.add_parent("L2b", "SideRoot").unwrap();
    assert_invariants(&registry);

    for (key, value) in expected {
        assert_eq!(registry.get_node(key).unwrap().base_count(), value);
    }
}
