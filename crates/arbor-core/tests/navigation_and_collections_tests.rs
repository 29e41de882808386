#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use arbor_core::collections::{ARRAY_SET_TYPE, OBJECT_MAP_TYPE};
use arbor_core::model::{PropTransform, TimestampToDate};
use arbor_core::{NodeId, Path, Store, Value, WalkOrder};
use chrono::{TimeZone, Utc};
use common::{create_todo, create_todo_list, todo_store, tracked};
use serde_json::json;

fn list_with_todos(store: &mut Store, texts: &[&str]) -> (NodeId, Vec<NodeId>) {
    let list = create_todo_list(store);
    let todos: Vec<NodeId> = texts
        .iter()
        .map(|text| {
            let todo = create_todo(store, text);
            store.call_action(list, "add", vec![Value::Node(todo)]).unwrap();
            todo
        })
        .collect();
    (list, todos)
}

#[test]
fn test_root_path_and_relationships() {
    // GIVEN a list with two todos
    let mut store = todo_store();
    let (list, todos) = list_with_todos(&mut store, &["a", "b"]);
    let array = store.get(list, "todos").unwrap().as_node().unwrap();

    // WHEN locating the second todo
    let root_path = store.get_root_path(todos[1]).unwrap();

    // THEN path and visited nodes lead down from the list
    let expected: Path = vec!["todos".into(), 1usize.into()];
    assert_eq!(root_path.root, list);
    assert_eq!(root_path.path, expected);
    assert_eq!(root_path.path_nodes, vec![list, array, todos[1]]);
    assert_eq!(store.get_root(todos[1]).unwrap(), list);
    assert!(store.is_child_of(todos[1], list).unwrap());
    assert!(store.is_parent_of(array, todos[0]).unwrap());
    assert!(!store.is_child_of(list, list).unwrap());
    assert_eq!(
        store.resolve_path(list, &expected).unwrap(),
        Some(Value::Node(todos[1]))
    );
    let from_array: Path = vec![1usize.into()];
    assert_eq!(store.get_path_from(array, todos[1]).unwrap(), Some(from_array));
    assert_eq!(store.get_path_from(todos[0], todos[1]).unwrap(), None);
}

#[test]
fn test_find_parent_respects_max_depth() {
    let mut store = todo_store();
    let (list, todos) = list_with_todos(&mut store, &["a"]);
    let is_list = |s: &Store, n: NodeId| s.model_type(n).is_ok_and(|t| t == "TodoList");

    assert_eq!(store.find_parent(todos[0], is_list, 0).unwrap(), Some(list));
    assert_eq!(store.find_parent(todos[0], is_list, 1).unwrap(), None);
    assert_eq!(store.find_parent(todos[0], is_list, 2).unwrap(), Some(list));
}

#[test]
fn test_walk_orders() {
    // GIVEN a small tree
    let mut store = todo_store();
    let root = tracked(&mut store, json!({"left": {"leaf": [1]}, "right": {}}));
    let left = store.get(root, "left").unwrap().as_node().unwrap();
    let leaf = store.get(left, "leaf").unwrap().as_node().unwrap();
    let right = store.get(root, "right").unwrap().as_node().unwrap();

    // WHEN walking in both orders
    let parent_first: Vec<_> = store.walk_tree(root, WalkOrder::ParentFirst).collect();
    let children_first: Vec<_> = store.walk_tree(root, WalkOrder::ChildrenFirst).collect();

    // THEN nodes appear in tree order around their children
    assert_eq!(parent_first, vec![root, left, leaf, right]);
    assert_eq!(children_first, vec![leaf, left, right, root]);
}

#[test]
fn test_walk_can_be_restarted_from_a_clone() {
    let mut store = todo_store();
    let root = tracked(&mut store, json!({"a": {}, "b": {}}));
    let walk = store.walk_tree(root, WalkOrder::ParentFirst);
    let replay = walk.clone();

    let first: Vec<_> = walk.collect();
    let second: Vec<_> = replay.collect();

    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
}

#[test]
fn test_collections_inside_a_tree() {
    // GIVEN a tree holding an object map and an array set
    let mut store = todo_store();
    let map = store.create_object_map(json!({"x": 1})).unwrap();
    let set = store.create_array_set(json!(["red"])).unwrap();
    let root = tracked(&mut store, json!({}));
    store
        .run_in_action(root, "attach", |s| {
            s.set(root, "map", map)?;
            s.set(root, "tags", set)?;
            Ok(Value::Null)
        })
        .unwrap();

    // WHEN both are changed through their own actions
    store.object_map_set(map, "y", 2).unwrap();
    assert!(store.array_set_add(set, "blue").unwrap());
    assert!(!store.array_set_add(set, "red").unwrap());

    // THEN the snapshot carries the collection wire format
    let snapshot = store.get_snapshot_json(root).unwrap();
    assert_eq!(snapshot["map"]["$modelType"], json!(OBJECT_MAP_TYPE));
    assert_eq!(snapshot["map"]["items"], json!({"x": 1, "y": 2}));
    assert_eq!(snapshot["tags"]["$modelType"], json!(ARRAY_SET_TYPE));
    assert_eq!(snapshot["tags"]["items"], json!(["red", "blue"]));
    assert_eq!(store.get_root(map).unwrap(), root);
}

#[test]
fn test_timestamp_transform_over_a_prop() {
    // GIVEN an object with a stored timestamp
    let mut store = todo_store();
    let node = tracked(&mut store, json!({"createdAt": 1234}));

    // WHEN reading and writing through the transform
    let read = store.get_as(node, "createdAt", &TimestampToDate).unwrap();
    let later = Utc.timestamp_millis_opt(5000).unwrap();
    store
        .run_in_action(node, "touch", |s| {
            s.set_as(node, "createdAt", &TimestampToDate, &later)?;
            Ok(Value::Null)
        })
        .unwrap();

    // THEN the view is a date and the tree keeps the number
    assert_eq!(read.timestamp_millis(), 1234);
    assert_eq!(
        TimestampToDate.untransform(&TimestampToDate.transform(&Value::from(1234)).unwrap()),
        Value::from(1234)
    );
    assert_eq!(store.get_snapshot_json(node).unwrap(), json!({"createdAt": 5000}));
}
