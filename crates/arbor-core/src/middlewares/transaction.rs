use crate::action::{ActionContext, ActionMiddleware, Next};
use crate::errors::Result;
use crate::ops::Store;
use crate::value::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// Undoes every change made by an action that fails.
///
/// Changes are tracked in the whole tree the target lives in when the
/// action starts, and are reverted by applying their inverse patches.
/// Without an action filter, top-level actions are wrapped.
///
/// The action's own error is always the one returned. A rollback that
/// cannot complete is logged at error level.
#[derive(Debug, Clone, Default)]
pub struct TransactionMiddleware {
    actions: Option<Vec<String>>,
}

impl TransactionMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap only actions with these names, at any nesting depth
    pub fn for_actions<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            actions: Some(names.into_iter().map(Into::into).collect()),
        }
    }
}

impl ActionMiddleware for TransactionMiddleware {
    fn filter(&self, _store: &Store, ctx: &ActionContext) -> bool {
        match &self.actions {
            Some(names) => names.iter().any(|name| name == ctx.action_name()),
            None => ctx.is_top_level(),
        }
    }

    fn intercept(&self, store: &mut Store, ctx: &Rc<ActionContext>, next: Next<'_>) -> Result<Value> {
        let root = store.get_root(ctx.target())?;
        let inverse = Rc::new(RefCell::new(Vec::new()));
        let sink = inverse.clone();
        let listener = store.on_patches(root, move |event| {
            sink.borrow_mut().extend(event.inverse_patches.iter().cloned());
        })?;

        let result = next.run(store);
        store.remove_patch_listener(listener);

        if let Err(err) = &result {
            let inverse = inverse.take();
            if !inverse.is_empty() && store.contains(root) {
                let reverted = store
                    .with_deferred_type_checks(|store| store.apply_patches(root, &inverse, true));
                match reverted {
                    Ok(()) => tracing::debug!(
                        op = ctx.action_name(),
                        call_id = %ctx.call_id(),
                        reverted = inverse.len(),
                        error = %err,
                        "rolled back failed action"
                    ),
                    Err(rollback_err) => tracing::error!(
                        op = ctx.action_name(),
                        call_id = %ctx.call_id(),
                        error = %err,
                        rollback_error = %rollback_err,
                        "rollback of failed action did not complete"
                    ),
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::errors::ArborError;
    use crate::registry::Registry;
    use serde_json::json;

    #[test]
    fn test_failed_action_rolls_back() {
        let mut store = Store::with_registry(Rc::new(Registry::new()));
        let root = store
            .tweak(json!({"balance": 10, "log": []}))
            .unwrap()
            .as_node()
            .unwrap();
        let log = store.get(root, "log").unwrap().as_node().unwrap();
        store
            .add_middleware(root, Rc::new(TransactionMiddleware::new()))
            .unwrap();
        let before = store.get_snapshot_json(root).unwrap();

        let err = store
            .run_in_action(root, "withdraw", |s| {
                s.set(root, "balance", -5)?;
                s.array_push(log, json!({"amount": 15}))?;
                Err(ArborError::action_failed("withdraw", "insufficient funds"))
            })
            .unwrap_err();

        assert!(matches!(err, ArborError::ActionFailed { .. }));
        assert_eq!(store.get_snapshot_json(root).unwrap(), before);
    }

    #[test]
    fn test_failed_rollback_keeps_the_action_error() {
        let mut store = Store::with_registry(Rc::new(Registry::new()));
        let root = store.tweak(json!({"n": 1})).unwrap().as_node().unwrap();
        store
            .add_middleware(root, Rc::new(TransactionMiddleware::new()))
            .unwrap();
        store
            .add_middleware(
                root,
                crate::action::middleware_fn(|store, ctx, next| {
                    if ctx.action_name() == crate::action::BUILTIN_APPLY_PATCHES {
                        return Err(ArborError::action_failed(ctx.action_name(), "patches blocked"));
                    }
                    next.run(store)
                }),
            )
            .unwrap();

        let err = store
            .run_in_action(root, "bump", |s| {
                s.set(root, "n", 2)?;
                Err(ArborError::action_failed("bump", "original failure"))
            })
            .unwrap_err();

        assert!(err.to_string().contains("original failure"));
        assert_eq!(store.get(root, "n").unwrap(), Value::from(2));
        assert!(!store.is_recording_patches());
    }

    #[test]
    fn test_successful_action_is_kept() {
        let mut store = Store::with_registry(Rc::new(Registry::new()));
        let root = store.tweak(json!({"n": 1})).unwrap().as_node().unwrap();
        store
            .add_middleware(root, Rc::new(TransactionMiddleware::for_actions(["bump"])))
            .unwrap();

        store
            .run_in_action(root, "bump", |s| {
                s.set(root, "n", 2)?;
                Ok(Value::Null)
            })
            .unwrap();
        assert_eq!(store.get(root, "n").unwrap(), Value::from(2));
        assert!(!store.is_recording_patches());
    }

    #[test]
    fn test_filter_by_name_applies_when_nested() {
        let mut store = Store::with_registry(Rc::new(Registry::new()));
        let root = store.tweak(json!({"a": 0, "b": 0})).unwrap().as_node().unwrap();
        store
            .add_middleware(root, Rc::new(TransactionMiddleware::for_actions(["risky"])))
            .unwrap();

        store
            .run_in_action(root, "outer", |s| {
                s.set(root, "a", 1)?;
                let inner = s.run_in_action(root, "risky", |s| {
                    s.set(root, "b", 1)?;
                    Err(ArborError::action_failed("risky", "boom"))
                });
                assert!(inner.is_err());
                Ok(Value::Null)
            })
            .unwrap();

        assert_eq!(store.get(root, "a").unwrap(), Value::from(1));
        assert_eq!(store.get(root, "b").unwrap(), Value::from(0));
    }
}
