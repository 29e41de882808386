#![allow(clippy::unwrap_used, clippy::expect_used)]

/// Scenario 2: Tweak Identity and Snapshot Sharing
///
/// Tweaking is idempotent, and snapshots of unchanged subtrees keep their
/// identity across reads and across mutations elsewhere in the tree.
mod common;

use arbor_core::{ArborError, NodeKind, Snapshot, Value};
use common::{create_todo, create_todo_list, todo_store, tracked};
use serde_json::json;

#[test]
fn test_scenario_02_tweak_is_idempotent() {
    // GIVEN a tracked object
    let mut store = todo_store();
    let node = tracked(&mut store, json!({"a": [1, 2]}));
    let count = store.node_count();

    // WHEN tweaking the handle again
    let again = store.tweak(node).unwrap();

    // THEN the same node comes back and nothing new is allocated
    assert_eq!(again, Value::Node(node));
    assert_eq!(store.node_count(), count);
}

#[test]
fn test_scenario_02_primitives_tweak_to_themselves() {
    let mut store = todo_store();
    assert_eq!(store.tweak(json!(3)).unwrap(), Value::from(3));
    assert_eq!(store.tweak(json!("x")).unwrap(), Value::from("x"));
    assert_eq!(store.tweak(json!(null)).unwrap(), Value::Null);
}

#[test]
fn test_scenario_02_tweak_builds_parented_nodes() {
    let mut store = todo_store();
    let root = tracked(
        &mut store,
        json!({"todo": {"$modelType": "Todo", "text": "x"}, "blob": {"$frozen": true, "data": {"k": [1]}}}),
    );
    let todo = store.get(root, "todo").unwrap().as_node().unwrap();
    let blob = store.get(root, "blob").unwrap().as_node().unwrap();

    assert_eq!(store.kind(todo).unwrap(), NodeKind::Model);
    assert_eq!(store.kind(blob).unwrap(), NodeKind::Frozen);
    assert_eq!(store.get_parent(todo).unwrap(), Some(root));
    assert_eq!(store.get(todo, "done").unwrap(), Value::Bool(false));
}

#[test]
fn test_scenario_02_unchanged_snapshot_is_same_reference() {
    // GIVEN a list with two todos
    let mut store = todo_store();
    let list = create_todo_list(&mut store);
    for text in ["a", "b"] {
        let todo = create_todo(&mut store, text);
        store.call_action(list, "add", vec![Value::Node(todo)]).unwrap();
    }

    // WHEN reading the snapshot twice without mutation
    let first = store.get_snapshot(list).unwrap();
    let second = store.get_snapshot(list).unwrap();

    // THEN both reads return the same reference
    assert!(Snapshot::ptr_eq(&first, &second));
}

#[test]
fn test_scenario_02_mutation_keeps_sibling_snapshots_shared() {
    // GIVEN a list with two todos and a snapshot of it
    let mut store = todo_store();
    let list = create_todo_list(&mut store);
    let a = create_todo(&mut store, "a");
    let b = create_todo(&mut store, "b");
    store.call_action(list, "add", vec![Value::Node(a)]).unwrap();
    store.call_action(list, "add", vec![Value::Node(b)]).unwrap();
    let before = store.get_snapshot(list).unwrap();

    // WHEN only the second todo changes
    store.call_action(b, "setDone", vec![Value::Bool(true)]).unwrap();
    let after = store.get_snapshot(list).unwrap();

    // THEN the list and the changed todo get new snapshots
    assert!(!Snapshot::ptr_eq(&before, &after));
    let todos_before = before.get("todos").unwrap();
    let todos_after = after.get("todos").unwrap();
    assert!(!Snapshot::ptr_eq(todos_before.at(1).unwrap(), todos_after.at(1).unwrap()));

    // AND the untouched todo keeps its snapshot
    assert!(Snapshot::ptr_eq(todos_before.at(0).unwrap(), todos_after.at(0).unwrap()));
}

#[test]
fn test_scenario_02_node_cannot_be_its_own_descendant() {
    let mut store = todo_store();
    let root = tracked(&mut store, json!({"child": {"grandchild": {}}}));
    let child = store.get(root, "child").unwrap().as_node().unwrap();
    let grandchild = store.get(child, "grandchild").unwrap().as_node().unwrap();

    let err = store
        .run_in_action(root, "cycle", |s| {
            s.set(grandchild, "loop", root)?;
            Ok(Value::Null)
        })
        .unwrap_err();

    assert!(matches!(err, ArborError::Hierarchy { .. }));
    assert_eq!(store.get_root(grandchild).unwrap(), root);
}

#[test]
fn test_scenario_02_snapshot_round_trip_rebuilds_equal_tree() {
    let mut store = todo_store();
    let list = create_todo_list(&mut store);
    let todo = create_todo(&mut store, "a");
    store.call_action(list, "add", vec![Value::Node(todo)]).unwrap();
    let snapshot = store.get_snapshot_json(list).unwrap();

    let rebuilt = store.from_snapshot(&snapshot).unwrap();

    assert_ne!(rebuilt, list);
    assert_eq!(store.get_snapshot_json(rebuilt).unwrap(), snapshot);
}

#[test]
fn test_scenario_02_released_replacements_keep_the_arena_bounded() {
    // GIVEN a tracked object holding a nested config
    let mut store = todo_store();
    let root = tracked(&mut store, json!({"config": {"n": 0}}));
    let baseline = store.node_count();

    // WHEN the config is replaced many times and each old one released
    for n in 1..=1000 {
        let old = store.get(root, "config").unwrap().as_node().unwrap();
        store
            .run_in_action(root, "replace", |s| {
                s.set(root, "config", json!({"n": n}))?;
                Ok(Value::Null)
            })
            .unwrap();
        store.release(old).unwrap();
    }

    // THEN the arena holds as many nodes as before
    assert_eq!(store.node_count(), baseline);
    assert_eq!(store.get_snapshot_json(root).unwrap(), json!({"config": {"n": 1000}}));
}

#[test]
fn test_scenario_02_release_drops_listeners_and_refuses_attached_nodes() {
    // GIVEN a list with one todo and a detached todo carrying a patch listener
    let mut store = todo_store();
    let list = create_todo_list(&mut store);
    let kept = create_todo(&mut store, "kept");
    store.call_action(list, "add", vec![Value::Node(kept)]).unwrap();
    let loose = create_todo(&mut store, "loose");
    store.on_patches(loose, |_| {}).unwrap();

    // WHEN releasing the attached todo and then the detached one
    let attached = store.release(kept).unwrap_err();
    store.release(loose).unwrap();

    // THEN only the detached todo is gone
    assert!(matches!(attached, ArborError::Hierarchy { .. }));
    assert!(store.contains(kept));
    assert!(!store.contains(loose));
    assert!(matches!(
        store.get(loose, "text"),
        Err(ArborError::NodeNotFound { .. })
    ));
    store.release(loose).unwrap();
}
