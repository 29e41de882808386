//! Model type registry: maps `$modelType` names to model classes.

use crate::collections;
use crate::errors::{ArborError, Result};
use crate::model::ModelClass;
use crate::reference::RefType;
use crate::types::Type;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Registry of model classes keyed by type name.
///
/// Each thread has one global registry (see [`Registry::global`]); stores
/// can also be given a private one so that independent trees (and tests)
/// do not see each other's registrations.
pub struct Registry {
    classes: RefCell<HashMap<String, Rc<ModelClass>>>,
    model_types: RefCell<HashMap<String, Type>>,
}

thread_local! {
    static GLOBAL: Rc<Registry> = Rc::new(Registry::new());
}

impl Registry {
    /// A registry holding only the built-in collection models
    pub fn new() -> Self {
        let registry = Self {
            classes: RefCell::new(HashMap::new()),
            model_types: RefCell::new(HashMap::new()),
        };
        registry.register_builtins();
        registry
    }

    /// The calling thread's global registry
    pub fn global() -> Rc<Registry> {
        GLOBAL.with(Rc::clone)
    }

    fn register_builtins(&self) {
        for class in [
            collections::object_map::object_map_class(),
            collections::array_set::array_set_class(),
        ] {
            self.classes
                .borrow_mut()
                .insert(class.name.clone(), Rc::new(class));
        }
    }

    /// Register a model class under its name.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateModelType` if the name is taken.
    pub fn register(&self, class: ModelClass) -> Result<Rc<ModelClass>> {
        let mut classes = self.classes.borrow_mut();
        if classes.contains_key(&class.name) {
            return Err(ArborError::DuplicateModelType { name: class.name });
        }
        let class = Rc::new(class);
        classes.insert(class.name.clone(), class.clone());
        tracing::debug!(model_type = %class.name, "registered model type");
        Ok(class)
    }

    /// Register a reference type (it is a model class under the hood).
    ///
    /// # Errors
    ///
    /// Returns `DuplicateModelType` if the name is taken.
    pub fn register_ref(&self, ref_type: RefType) -> Result<Rc<ModelClass>> {
        self.register(ref_type.into_class())
    }

    pub fn get(&self, name: &str) -> Option<Rc<ModelClass>> {
        self.classes.borrow().get(name).cloned()
    }

    /// # Errors
    ///
    /// Returns `UnknownModelType` if nothing is registered under `name`.
    pub fn require(&self, name: &str) -> Result<Rc<ModelClass>> {
        self.get(name).ok_or_else(|| ArborError::UnknownModelType {
            name: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.borrow().contains_key(name)
    }

    /// Registered type names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.classes.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// The runtime type for a model type name.
    ///
    /// Repeated calls with the same name return the same `Type` instance.
    pub fn model_type(&self, name: &str) -> Type {
        self.model_types
            .borrow_mut()
            .entry(name.to_string())
            .or_insert_with(|| Type::model_uncached(name))
            .clone()
    }

    /// Drop every registration and cached type, keeping the built-ins.
    pub fn reset(&self) {
        self.classes.borrow_mut().clear();
        self.model_types.borrow_mut().clear();
        self.register_builtins();
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("classes", &self.names())
            .finish()
    }
}
