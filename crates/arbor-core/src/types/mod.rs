//! Runtime types for model props.
//!
//! A [`Type`] is an immutable, cheaply clonable descriptor. Checking walks the
//! value alongside the type and reports the first mismatch with its path.

mod check;

use crate::ops::Store;
use crate::registry::Registry;
use crate::value::{path_to_pointer, Path, Value};
use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

/// A failed type check: where, what was expected, what was found.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeCheckError {
    pub path: Path,
    pub expected: String,
    pub actual: serde_json::Value,
}

impl fmt::Display for TypeCheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let at = path_to_pointer(&self.path);
        write!(
            f,
            "[{}] expected {}, got {}",
            if at.is_empty() { "/" } else { &at },
            self.expected,
            self.actual
        )
    }
}

pub(crate) type Predicate = Rc<dyn Fn(&Store, &Value) -> bool>;

pub(crate) struct LateType {
    thunk: Rc<dyn Fn() -> Type>,
    resolved: OnceCell<Type>,
}

impl LateType {
    pub(crate) fn get(&self) -> &Type {
        self.resolved.get_or_init(|| (self.thunk)())
    }
}

pub(crate) enum TypeKind {
    String,
    Number,
    Integer,
    Boolean,
    Null,
    Literal(serde_json::Value),
    /// Plain object with (at least) these keys
    Object(Vec<(String, Type)>),
    Array(Type),
    /// Plain object whose every value has one type
    Record(Type),
    /// Built-in object map model
    MapOf(Type),
    /// Built-in array set model
    SetOf(Type),
    Union(Vec<Type>),
    Intersection(Vec<Type>),
    Refinement {
        base: Type,
        name: String,
        predicate: Predicate,
    },
    Late(LateType),
    Model(String),
    Maybe(Type),
    Frozen,
    Unchecked,
}

/// Runtime type descriptor.
#[derive(Clone)]
pub struct Type(pub(crate) Rc<TypeKind>);

impl Type {
    fn from_kind(kind: TypeKind) -> Self {
        Type(Rc::new(kind))
    }

    pub(crate) fn model_uncached(name: &str) -> Self {
        Type::from_kind(TypeKind::Model(name.to_string()))
    }

    pub fn ptr_eq(a: &Type, b: &Type) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }

    /// Check `value`, reporting the first mismatch found.
    ///
    /// `path` is the location of `value` and prefixes every reported path.
    pub fn check(&self, store: &Store, value: &Value, path: &[crate::PathSegment]) -> Option<TypeCheckError> {
        check::check(self, store, value, &mut path.to_vec())
    }

    pub fn is(&self, store: &Store, value: &Value) -> bool {
        self.check(store, value, &[]).is_none()
    }

    /// Human readable name, used as `expected` in errors
    pub fn describe(&self) -> String {
        match self.0.as_ref() {
            TypeKind::String => "string".to_string(),
            TypeKind::Number => "number".to_string(),
            TypeKind::Integer => "integer".to_string(),
            TypeKind::Boolean => "boolean".to_string(),
            TypeKind::Null => "null".to_string(),
            TypeKind::Literal(v) => v.to_string(),
            TypeKind::Object(fields) => format!(
                "{{ {} }}",
                fields
                    .iter()
                    .map(|(k, t)| format!("{}: {}", k, t.describe()))
                    .collect::<Vec<_>>()
                    .join("; ")
            ),
            TypeKind::Array(t) => format!("Array<{}>", t.describe()),
            TypeKind::Record(t) => format!("Record<{}>", t.describe()),
            TypeKind::MapOf(t) => format!("ObjectMap<{}>", t.describe()),
            TypeKind::SetOf(t) => format!("ArraySet<{}>", t.describe()),
            TypeKind::Union(ts) => ts.iter().map(Type::describe).collect::<Vec<_>>().join(" | "),
            TypeKind::Intersection(ts) => {
                ts.iter().map(Type::describe).collect::<Vec<_>>().join(" & ")
            }
            TypeKind::Refinement { name, .. } => name.clone(),
            TypeKind::Late(_) => "late".to_string(),
            TypeKind::Model(name) => format!("Model({})", name),
            TypeKind::Maybe(t) => format!("{} | null", t.describe()),
            TypeKind::Frozen => "frozen".to_string(),
            TypeKind::Unchecked => "any".to_string(),
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({})", self.describe())
    }
}

pub fn string() -> Type {
    Type::from_kind(TypeKind::String)
}

pub fn number() -> Type {
    Type::from_kind(TypeKind::Number)
}

pub fn integer() -> Type {
    Type::from_kind(TypeKind::Integer)
}

pub fn boolean() -> Type {
    Type::from_kind(TypeKind::Boolean)
}

pub fn null() -> Type {
    Type::from_kind(TypeKind::Null)
}

pub fn literal(value: impl Into<serde_json::Value>) -> Type {
    Type::from_kind(TypeKind::Literal(value.into()))
}

pub fn object<K: Into<String>>(fields: Vec<(K, Type)>) -> Type {
    Type::from_kind(TypeKind::Object(
        fields.into_iter().map(|(k, t)| (k.into(), t)).collect(),
    ))
}

pub fn array(item: Type) -> Type {
    Type::from_kind(TypeKind::Array(item))
}

pub fn record(value: Type) -> Type {
    Type::from_kind(TypeKind::Record(value))
}

pub fn map_of(value: Type) -> Type {
    Type::from_kind(TypeKind::MapOf(value))
}

pub fn set_of(value: Type) -> Type {
    Type::from_kind(TypeKind::SetOf(value))
}

/// Value must match at least one of `options`
pub fn or(options: Vec<Type>) -> Type {
    Type::from_kind(TypeKind::Union(options))
}

/// Value must match every one of `parts`
pub fn and(parts: Vec<Type>) -> Type {
    Type::from_kind(TypeKind::Intersection(parts))
}

/// `base` narrowed by a predicate; `name` is reported on failure
pub fn refinement<F>(base: Type, name: impl Into<String>, predicate: F) -> Type
where
    F: Fn(&Store, &Value) -> bool + 'static,
{
    Type::from_kind(TypeKind::Refinement {
        base,
        name: name.into(),
        predicate: Rc::new(predicate),
    })
}

/// Resolved on first use, for recursive types
pub fn late<F>(thunk: F) -> Type
where
    F: Fn() -> Type + 'static,
{
    Type::from_kind(TypeKind::Late(LateType {
        thunk: Rc::new(thunk),
        resolved: OnceCell::new(),
    }))
}

/// Instance of the named model type (cached in the global registry)
pub fn model(name: &str) -> Type {
    Registry::global().model_type(name)
}

pub fn maybe(inner: Type) -> Type {
    Type::from_kind(TypeKind::Maybe(inner))
}

pub fn frozen() -> Type {
    Type::from_kind(TypeKind::Frozen)
}

pub fn unchecked() -> Type {
    Type::from_kind(TypeKind::Unchecked)
}

impl Store {
    /// Check every declared prop type of a model subtree.
    ///
    /// Runs regardless of the auto type checking setting.
    ///
    /// # Errors
    ///
    /// Returns `NotAModel` if `node` is not a model, or `TypeCheck` with the first mismatch.
    pub fn type_check(&self, node: crate::NodeId) -> crate::Result<()> {
        let class = self.model_class(node)?;
        match model(class.name()).check(self, &Value::Node(node), &[]) {
            Some(err) => Err(crate::ArborError::TypeCheck(err)),
            None => Ok(()),
        }
    }
}
