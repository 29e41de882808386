//! Running action bodies through the middleware chain.

use crate::action::context::{ActionContext, ActionType};
use crate::action::middleware::{body_already_ran, Next};
use crate::errors::{ArborError, Result};
use crate::model::ActionKind;
use crate::ops::Store;
use crate::value::{NodeId, Value};
use crate::{log_op_end, log_op_error, log_op_start};
use std::rc::Rc;
use std::time::Instant;

impl Store {
    /// Invoke a synchronous action declared on the target's model class.
    ///
    /// # Arguments
    /// * `target` - Model instance the action runs on
    /// * `name` - Action name from the class registration table
    /// * `args` - Positional arguments handed to the body
    ///
    /// # Errors
    /// * `NotAModel` - If `target` is not a model
    /// * `UnknownAction` - If the class declares no such action
    /// * `ActionFailed` - If the action is a flow (use [`Store::start_flow`])
    /// * Any error raised by a middleware or the body
    pub fn call_action(&mut self, target: NodeId, name: &str, args: Vec<Value>) -> Result<Value> {
        let class = self.model_class(target)?;
        match class.action(name) {
            Some(ActionKind::Sync(body)) => {
                let body = body.clone();
                let call_args = args.clone();
                let ctx = self.new_context(target, name, ActionType::Sync, args);
                self.run_in_context(ctx, move |store| body(store, target, &call_args))
            }
            Some(ActionKind::Flow(_)) => Err(ArborError::action_failed(
                name,
                "flow actions are started with start_flow",
            )),
            None => Err(ArborError::UnknownAction {
                model_type: class.name().to_string(),
                action: name.to_string(),
            }),
        }
    }

    /// Run a closure as an ad-hoc action on `target`.
    ///
    /// Middlewares see the call like any declared action.
    ///
    /// # Errors
    ///
    /// `NodeNotFound` for an unknown target, otherwise errors raised by
    /// middlewares or the closure.
    pub fn run_in_action<F>(&mut self, target: NodeId, name: &str, body: F) -> Result<Value>
    where
        F: FnOnce(&mut Store) -> Result<Value>,
    {
        self.run_builtin(target, name, Vec::new(), body)
    }

    pub(crate) fn run_builtin<F>(&mut self, target: NodeId, name: &str, args: Vec<Value>, body: F) -> Result<Value>
    where
        F: FnOnce(&mut Store) -> Result<Value>,
    {
        self.node(target)?;
        let ctx = self.new_context(target, name, ActionType::Sync, args);
        self.run_in_context(ctx, body)
    }

    pub(crate) fn new_context(
        &self,
        target: NodeId,
        name: &str,
        action_type: ActionType,
        args: Vec<Value>,
    ) -> ActionContext {
        ActionContext::new(target, name, action_type, args, self.action_stack.last().cloned())
    }

    /// Run `body` under `ctx`, wrapped by every applicable middleware.
    ///
    /// When the outermost action finishes, snapshot listeners are notified.
    pub(crate) fn run_in_context<F>(&mut self, ctx: impl Into<Rc<ActionContext>>, body: F) -> Result<Value>
    where
        F: FnOnce(&mut Store) -> Result<Value>,
    {
        let ctx: Rc<ActionContext> = ctx.into();
        let outermost = self.action_stack.is_empty();
        let started = Instant::now();
        let step = ctx.async_step().map(|s| s.as_str()).unwrap_or("sync");
        if ctx.is_top_level() {
            log_op_start!(
                ctx.action_name(),
                call_id = %ctx.call_id(),
                target = %ctx.target(),
                flow_step = step,
            );
        } else {
            tracing::debug!(
                op = ctx.action_name(),
                call_id = %ctx.call_id(),
                root_call_id = %ctx.group_id(),
                target = %ctx.target(),
                flow_step = step,
                "nested action start"
            );
        }

        let chain = self.middleware_chain(&ctx);
        self.action_stack.push(ctx.clone());
        let mut body = Some(body);
        let name = ctx.action_name().to_string();
        let mut run_once = |store: &mut Store| match body.take() {
            Some(body) => body(store),
            None => Err(body_already_ran(&name)),
        };
        let result = Next::new(&chain, &ctx, &mut run_once).run(self);
        self.action_stack.pop();

        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) if ctx.is_top_level() => {
                log_op_end!(ctx.action_name(), duration_ms = duration_ms, call_id = %ctx.call_id());
            }
            Err(err) if ctx.is_top_level() => {
                log_op_error!(ctx.action_name(), err.clone(), duration_ms = duration_ms, call_id = %ctx.call_id());
            }
            Ok(_) => tracing::debug!(op = ctx.action_name(), duration_ms, "nested action end"),
            Err(err) => tracing::debug!(op = ctx.action_name(), duration_ms, error = %err, "nested action failed"),
        }

        if outermost {
            let notified = self.notify_snapshot_listeners();
            if let (Ok(_), Err(err)) = (&result, notified) {
                return Err(err);
            }
        }
        result
    }

    /// Context of the innermost running action
    pub fn current_action(&self) -> Option<Rc<ActionContext>> {
        self.action_stack.last().cloned()
    }

    pub fn is_in_action(&self) -> bool {
        !self.action_stack.is_empty()
    }
}
