use super::{Type, TypeCheckError, TypeKind};
use crate::collections::{ARRAY_SET_TYPE, ITEMS_PROP, OBJECT_MAP_TYPE};
use crate::ops::store::{NodeData, Store};
use crate::value::{Path, PathSegment, Value};

fn mismatch(t: &Type, store: &Store, value: &Value, path: &Path) -> Option<TypeCheckError> {
    Some(TypeCheckError {
        path: path.clone(),
        expected: t.describe(),
        actual: store.value_json(value).unwrap_or(serde_json::Value::Null),
    })
}

fn node_data<'a>(store: &'a Store, value: &Value) -> Option<&'a NodeData> {
    value
        .as_node()
        .and_then(|id| store.node(id).ok())
        .map(|node| &node.data)
}

fn check_child(
    t: &Type,
    store: &Store,
    child: &Value,
    segment: PathSegment,
    path: &mut Path,
) -> Option<TypeCheckError> {
    path.push(segment);
    let result = check(t, store, child, path);
    path.pop();
    result
}

fn check_items<'v>(
    item_type: &Type,
    store: &Store,
    items: impl Iterator<Item = (PathSegment, &'v Value)>,
    path: &mut Path,
) -> Option<TypeCheckError> {
    for (segment, child) in items {
        if let Some(err) = check_child(item_type, store, child, segment, path) {
            return Some(err);
        }
    }
    None
}

/// Fail-fast structural check of `value` against `t`.
pub(super) fn check(t: &Type, store: &Store, value: &Value, path: &mut Path) -> Option<TypeCheckError> {
    match t.0.as_ref() {
        TypeKind::Unchecked => None,

        TypeKind::String => match value {
            Value::String(_) => None,
            _ => mismatch(t, store, value, path),
        },

        TypeKind::Number => match value {
            Value::Number(_) => None,
            _ => mismatch(t, store, value, path),
        },

        TypeKind::Integer => match value {
            Value::Number(n)
                if n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0) =>
            {
                None
            }
            _ => mismatch(t, store, value, path),
        },

        TypeKind::Boolean => match value {
            Value::Bool(_) => None,
            _ => mismatch(t, store, value, path),
        },

        TypeKind::Null => match value {
            Value::Null => None,
            _ => mismatch(t, store, value, path),
        },

        TypeKind::Literal(expected) => {
            if value.to_json().as_ref() == Some(expected) {
                None
            } else {
                mismatch(t, store, value, path)
            }
        }

        TypeKind::Object(fields) => match node_data(store, value) {
            Some(NodeData::Object(map)) => {
                for (key, field_type) in fields {
                    let child = map.get(key).cloned().unwrap_or(Value::Null);
                    if let Some(err) =
                        check_child(field_type, store, &child, PathSegment::from(key), path)
                    {
                        return Some(err);
                    }
                }
                None
            }
            _ => mismatch(t, store, value, path),
        },

        TypeKind::Array(item_type) => match node_data(store, value) {
            Some(NodeData::Array(items)) => check_items(
                item_type,
                store,
                items.iter().enumerate().map(|(i, v)| (PathSegment::Index(i), v)),
                path,
            ),
            _ => mismatch(t, store, value, path),
        },

        TypeKind::Record(value_type) => match node_data(store, value) {
            Some(NodeData::Object(map)) => check_items(
                value_type,
                store,
                map.iter().map(|(k, v)| (PathSegment::from(k), v)),
                path,
            ),
            _ => mismatch(t, store, value, path),
        },

        TypeKind::MapOf(value_type) => {
            match collection_items(store, value, OBJECT_MAP_TYPE) {
                Some(NodeData::Object(map)) => {
                    path.push(PathSegment::from(ITEMS_PROP));
                    let result = check_items(
                        value_type,
                        store,
                        map.iter().map(|(k, v)| (PathSegment::from(k), v)),
                        path,
                    );
                    path.pop();
                    result
                }
                _ => mismatch(t, store, value, path),
            }
        }

        TypeKind::SetOf(value_type) => match collection_items(store, value, ARRAY_SET_TYPE) {
            Some(NodeData::Array(items)) => {
                path.push(PathSegment::from(ITEMS_PROP));
                let result = check_items(
                    value_type,
                    store,
                    items.iter().enumerate().map(|(i, v)| (PathSegment::Index(i), v)),
                    path,
                );
                path.pop();
                result
            }
            _ => mismatch(t, store, value, path),
        },

        TypeKind::Union(options) => {
            if options.iter().any(|option| check(option, store, value, path).is_none()) {
                None
            } else {
                mismatch(t, store, value, path)
            }
        }

        TypeKind::Intersection(parts) => parts
            .iter()
            .find_map(|part| check(part, store, value, path)),

        TypeKind::Refinement {
            base, predicate, ..
        } => {
            if let Some(err) = check(base, store, value, path) {
                return Some(err);
            }
            if predicate(store, value) {
                None
            } else {
                mismatch(t, store, value, path)
            }
        }

        TypeKind::Late(late) => check(late.get(), store, value, path),

        TypeKind::Model(name) => match node_data(store, value) {
            Some(NodeData::Model(model)) if model.class.name == *name => {
                for (prop, def) in model.class.props.iter() {
                    let Some(prop_type) = &def.prop_type else {
                        continue;
                    };
                    let child = model.props.get(prop).cloned().unwrap_or(Value::Null);
                    if let Some(err) =
                        check_child(prop_type, store, &child, PathSegment::from(prop), path)
                    {
                        return Some(err);
                    }
                }
                None
            }
            _ => mismatch(t, store, value, path),
        },

        TypeKind::Maybe(inner) => match value {
            Value::Null => None,
            _ => check(inner, store, value, path),
        },

        TypeKind::Frozen => match node_data(store, value) {
            Some(NodeData::Frozen(_)) => None,
            _ => mismatch(t, store, value, path),
        },
    }
}

/// The `items` container of a built-in collection model of the given type
fn collection_items<'a>(store: &'a Store, value: &Value, model_type: &str) -> Option<&'a NodeData> {
    match node_data(store, value)? {
        NodeData::Model(model) if model.class.name == model_type => {
            let items = model.props.get(ITEMS_PROP)?;
            node_data(store, items)
        }
        _ => None,
    }
}
