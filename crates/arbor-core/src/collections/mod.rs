//! Built-in collection models.
//!
//! Both collections are ordinary model types registered in every
//! [`Registry`](crate::Registry). Their data lives in an `items` prop, so
//! snapshots look like `{ "$modelType": "arbor/ObjectMap", "$modelId": .., "items": {..} }`.

pub mod array_set;
pub mod object_map;

use crate::errors::{ArborError, Result};
use crate::ops::Store;
use crate::value::{Input, NodeId, Value};

pub const OBJECT_MAP_TYPE: &str = "arbor/ObjectMap";
pub const ARRAY_SET_TYPE: &str = "arbor/ArraySet";
pub const ITEMS_PROP: &str = "items";

/// The node behind the `items` prop of a collection model
pub(crate) fn items_node(store: &Store, collection: NodeId, model_type: &str) -> Result<NodeId> {
    let actual = store.model_type(collection)?;
    if actual != model_type {
        return Err(ArborError::WrongNodeKind {
            node: collection,
            expected: model_type.to_string(),
            actual,
        });
    }
    store
        .get(collection, ITEMS_PROP)?
        .as_node()
        .ok_or_else(|| ArborError::Internal {
            message: format!("{} of {} holds no node", ITEMS_PROP, collection),
        })
}

pub(crate) fn string_arg(args: &[Value], index: usize, action: &str) -> Result<String> {
    args.get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ArborError::action_failed(action, format!("argument {} must be a string", index)))
}

impl Store {
    /// Tweak `input`, then call `action` with the tweaked value appended to `args`.
    ///
    /// Nodes created from JSON are discarded again if the action fails.
    pub(crate) fn call_with_input(
        &mut self,
        target: NodeId,
        action: &str,
        mut args: Vec<Value>,
        input: Input,
    ) -> Result<Value> {
        let (value, created) = self.prepare_input(input, crate::ops::tweak::IdMode::Keep)?;
        args.push(value.clone());
        match self.call_action(target, action, args) {
            Ok(result) => Ok(result),
            Err(e) => {
                let still_detached = value
                    .as_node()
                    .is_some_and(|n| matches!(self.get_parent(n), Ok(None)));
                self.reject_input(&value, created && still_detached, e)
            }
        }
    }
}
