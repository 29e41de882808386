use crate::action::context::ActionContext;
use crate::errors::{ArborError, Result};
use crate::ops::Store;
use crate::value::{NodeId, Value};
use std::fmt;
use std::rc::Rc;

/// Handle returned by [`Store::add_middleware`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MiddlewareId(pub(crate) u64);

/// A handler wrapped around action execution.
///
/// `intercept` receives the call context and the rest of the chain. It may
/// run `next`, skip it and return its own result, or fail on either side of it.
pub trait ActionMiddleware {
    /// Whether this middleware takes part in the call
    fn filter(&self, _store: &Store, _ctx: &ActionContext) -> bool {
        true
    }

    /// # Errors
    ///
    /// Whatever the middleware or the rest of the chain fails with.
    fn intercept(&self, store: &mut Store, ctx: &Rc<ActionContext>, next: Next<'_>) -> Result<Value>;
}

/// Continuation into the remaining middlewares and the action body.
pub struct Next<'a> {
    chain: &'a [Rc<dyn ActionMiddleware>],
    ctx: &'a Rc<ActionContext>,
    body: &'a mut dyn FnMut(&mut Store) -> Result<Value>,
}

impl<'a> Next<'a> {
    pub(crate) fn new(
        chain: &'a [Rc<dyn ActionMiddleware>],
        ctx: &'a Rc<ActionContext>,
        body: &'a mut dyn FnMut(&mut Store) -> Result<Value>,
    ) -> Self {
        Self { chain, ctx, body }
    }

    /// Run the rest of the chain.
    ///
    /// # Errors
    ///
    /// Errors raised by inner middlewares or the action body.
    pub fn run(self, store: &mut Store) -> Result<Value> {
        match self.chain.split_first() {
            Some((first, rest)) => first.intercept(
                store,
                self.ctx,
                Next {
                    chain: rest,
                    ctx: self.ctx,
                    body: self.body,
                },
            ),
            None => (self.body)(store),
        }
    }
}

struct FnMiddleware<F> {
    intercept: F,
}

impl<F> ActionMiddleware for FnMiddleware<F>
where
    F: Fn(&mut Store, &Rc<ActionContext>, Next<'_>) -> Result<Value>,
{
    fn intercept(&self, store: &mut Store, ctx: &Rc<ActionContext>, next: Next<'_>) -> Result<Value> {
        (self.intercept)(store, ctx, next)
    }
}

/// Middleware from a closure that sees every call
pub fn middleware_fn<F>(intercept: F) -> Rc<dyn ActionMiddleware>
where
    F: Fn(&mut Store, &Rc<ActionContext>, Next<'_>) -> Result<Value> + 'static,
{
    Rc::new(FnMiddleware { intercept })
}

pub(crate) struct MiddlewareEntry {
    pub(crate) id: MiddlewareId,
    pub(crate) root: NodeId,
    pub(crate) middleware: Rc<dyn ActionMiddleware>,
}

impl fmt::Debug for MiddlewareEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareEntry")
            .field("id", &self.id)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Register a middleware for actions on `root` and its descendants.
    ///
    /// Middlewares registered earlier wrap the ones registered later.
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` for an unknown root.
    pub fn add_middleware(&mut self, root: NodeId, middleware: Rc<dyn ActionMiddleware>) -> Result<MiddlewareId> {
        self.node(root)?;
        let id = MiddlewareId(self.next_handle());
        self.middlewares.push(MiddlewareEntry {
            id,
            root,
            middleware,
        });
        tracing::debug!(root = %root, middleware = id.0, "added middleware");
        Ok(id)
    }

    /// Returns whether the middleware was registered
    pub fn remove_middleware(&mut self, id: MiddlewareId) -> bool {
        let before = self.middlewares.len();
        self.middlewares.retain(|entry| entry.id != id);
        before != self.middlewares.len()
    }

    /// Middlewares that apply to a call, outermost first
    pub(crate) fn middleware_chain(&self, ctx: &ActionContext) -> Vec<Rc<dyn ActionMiddleware>> {
        self.middlewares
            .iter()
            .filter(|entry| {
                self.is_ancestor_or_self(entry.root, ctx.target)
                    .unwrap_or(false)
            })
            .filter(|entry| entry.middleware.filter(self, ctx))
            .map(|entry| entry.middleware.clone())
            .collect()
    }
}

/// Error for a body that was asked to run twice
pub(crate) fn body_already_ran(action: &str) -> ArborError {
    ArborError::Internal {
        message: format!("body of action '{}' already ran", action),
    }
}
