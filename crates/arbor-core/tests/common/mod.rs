use arbor_core::{
    types, ArborError, AutoTypeChecking, Config, ModelClass, NodeId, Patch, PropDef, Props,
    Registry, Result, Store, Value,
};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

/// `Todo { text: string, done: boolean = false }` with a `setDone` action
#[allow(dead_code)]
pub fn todo_class() -> ModelClass {
    ModelClass::builder("Todo")
        .prop("text", PropDef::new().typed(types::string()))
        .prop("done", PropDef::with_default(false).typed(types::boolean()))
        .action("setDone", |store, this, args| {
            let done = args.first().cloned().unwrap_or(Value::Bool(true));
            store.set(this, "done", done)?;
            Ok(Value::Null)
        })
        .action("setText", |store, this, args| {
            let text = args.first().cloned().unwrap_or(Value::Null);
            store.set(this, "text", text)?;
            Ok(Value::Null)
        })
        .build()
}

/// `TodoList { todos: Todo[] = [] }` with `add` and `remove` actions
#[allow(dead_code)]
pub fn todo_list_class() -> ModelClass {
    ModelClass::builder("TodoList")
        .prop(
            "todos",
            PropDef::with_default_fn(|| json!([])).typed(types::array(types::model("Todo"))),
        )
        .action("add", |store, this, args| {
            let todo = args.first().cloned().unwrap_or(Value::Null);
            let todos = todos_of(store, this)?;
            store.array_push(todos, todo)?;
            Ok(Value::Null)
        })
        .action("remove", |store, this, args| {
            let index = args.first().and_then(Value::as_i64).unwrap_or(0) as usize;
            let todos = todos_of(store, this)?;
            store.array_remove(todos, index)
        })
        .build()
}

#[allow(dead_code)]
fn todos_of(store: &Store, list: NodeId) -> Result<NodeId> {
    store
        .get(list, "todos")?
        .as_node()
        .ok_or_else(|| ArborError::action_failed("todos", "todos is not a node"))
}

/// A private registry holding the todo model types
#[allow(dead_code)]
pub fn todo_registry() -> Rc<Registry> {
    let registry = Registry::new();
    registry
        .register(todo_class())
        .expect("Todo should register");
    registry
        .register(todo_list_class())
        .expect("TodoList should register");
    Rc::new(registry)
}

/// Store over [`todo_registry`] with prop type checking always on
#[allow(dead_code)]
pub fn todo_store() -> Store {
    let config = Config::new().with_auto_type_checking(AutoTypeChecking::AlwaysOn);
    Store::with_registry_and_config(todo_registry(), config)
}

/// Create a detached todo with the given text
#[allow(dead_code)]
pub fn create_todo(store: &mut Store, text: &str) -> NodeId {
    store
        .create_model("Todo", Props::new().set("text", text))
        .expect("Todo should be created")
}

/// Create a detached, empty todo list
#[allow(dead_code)]
pub fn create_todo_list(store: &mut Store) -> NodeId {
    store
        .create_model("TodoList", Props::new())
        .expect("TodoList should be created")
}

/// Tweak plain JSON into a tracked node
#[allow(dead_code)]
pub fn tracked(store: &mut Store, json: serde_json::Value) -> NodeId {
    store
        .tweak(json)
        .expect("JSON should tweak")
        .as_node()
        .expect("containers tweak into nodes")
}

/// Collect every patch emitted under `root`; returns the shared buffer
#[allow(dead_code)]
pub fn collect_patches(store: &mut Store, root: NodeId) -> Rc<RefCell<Vec<Patch>>> {
    let patches = Rc::new(RefCell::new(Vec::new()));
    let sink = patches.clone();
    store
        .on_patches(root, move |event| sink.borrow_mut().extend(event.patches.iter().cloned()))
        .expect("patch listener should register");
    patches
}
