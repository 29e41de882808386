//! Start/finish tracking of action calls.
//!
//! A flow is reported as a single call: `on_start` when it spawns,
//! `on_suspend`/`on_resume` around each await, and `on_finish` once with the
//! value it returns or the error it throws.

use crate::action::{ActionContext, ActionMiddleware, AsyncStepType, Next};
use crate::errors::{ArborError, Result};
use crate::ops::Store;
use crate::value::Value;
use std::rc::Rc;

/// What `on_start` wants done with the call.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackingDecision {
    Proceed,
    /// Skip the body and return this value instead
    Return(Value),
    /// Skip the body and fail with this error
    Throw(ArborError),
}

/// Callbacks for [`ActionTrackingMiddleware`].
///
/// `ctx` is the context of the segment being run; for flows use
/// [`ActionContext::root_context`] to get the spawn context shared by all
/// segments.
pub trait ActionTracker {
    fn filter(&self, _store: &Store, _ctx: &ActionContext) -> bool {
        true
    }

    fn on_start(&self, _store: &mut Store, _ctx: &ActionContext) -> TrackingDecision {
        TrackingDecision::Proceed
    }

    fn on_suspend(&self, _store: &mut Store, _ctx: &ActionContext) {}

    fn on_resume(&self, _store: &mut Store, _ctx: &ActionContext) {}

    /// May replace the outcome of the call
    fn on_finish(&self, _store: &mut Store, _ctx: &ActionContext, _result: &mut Result<Value>) {}
}

/// Adapts an [`ActionTracker`] into a middleware.
pub struct ActionTrackingMiddleware<T> {
    tracker: T,
}

impl<T: ActionTracker> ActionTrackingMiddleware<T> {
    pub fn new(tracker: T) -> Self {
        Self { tracker }
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }
}

impl<T: ActionTracker> ActionMiddleware for ActionTrackingMiddleware<T> {
    fn filter(&self, store: &Store, ctx: &ActionContext) -> bool {
        self.tracker.filter(store, ctx)
    }

    fn intercept(&self, store: &mut Store, ctx: &Rc<ActionContext>, next: Next<'_>) -> Result<Value> {
        match ctx.async_step() {
            None => {
                let mut result = match self.tracker.on_start(store, ctx) {
                    TrackingDecision::Proceed => next.run(store),
                    TrackingDecision::Return(value) => Ok(value),
                    TrackingDecision::Throw(err) => Err(err),
                };
                self.tracker.on_finish(store, ctx, &mut result);
                result
            }
            Some(AsyncStepType::Spawn) => match self.tracker.on_start(store, ctx) {
                TrackingDecision::Proceed => {
                    let result = next.run(store);
                    self.tracker.on_suspend(store, ctx);
                    result
                }
                // Answering the spawn segment ends the flow; the return or
                // throw segment reports the finish.
                TrackingDecision::Return(value) => Ok(value),
                TrackingDecision::Throw(err) => Err(err),
            },
            Some(AsyncStepType::Resume) | Some(AsyncStepType::ResumeError) => {
                self.tracker.on_resume(store, ctx);
                let result = next.run(store);
                self.tracker.on_suspend(store, ctx);
                result
            }
            Some(AsyncStepType::Return) | Some(AsyncStepType::Throw) => {
                self.tracker.on_resume(store, ctx);
                let mut result = next.run(store);
                self.tracker.on_finish(store, ctx, &mut result);
                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::action::{flow_fn, FlowInput, FlowStep};
    use crate::model::{ModelClass, PropDef};
    use crate::registry::Registry;
    use crate::Props;
    use serde_json::json;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Journal {
        lines: Rc<RefCell<Vec<String>>>,
    }

    impl ActionTracker for Journal {
        fn filter(&self, _store: &Store, ctx: &ActionContext) -> bool {
            ctx.is_top_level()
        }

        fn on_start(&self, _store: &mut Store, ctx: &ActionContext) -> TrackingDecision {
            self.lines.borrow_mut().push(format!("start {}", ctx.action_name()));
            if ctx.action_name() == "forbidden" {
                return TrackingDecision::Throw(ArborError::action_failed("forbidden", "denied"));
            }
            TrackingDecision::Proceed
        }

        fn on_suspend(&self, _store: &mut Store, ctx: &ActionContext) {
            self.lines.borrow_mut().push(format!("suspend {}", ctx.action_name()));
        }

        fn on_resume(&self, _store: &mut Store, ctx: &ActionContext) {
            self.lines.borrow_mut().push(format!("resume {}", ctx.action_name()));
        }

        fn on_finish(&self, _store: &mut Store, ctx: &ActionContext, result: &mut Result<Value>) {
            let outcome = if result.is_ok() { "ok" } else { "err" };
            self.lines
                .borrow_mut()
                .push(format!("finish {} {}", ctx.action_name(), outcome));
        }
    }

    fn store() -> (Store, crate::NodeId) {
        let registry = Registry::new();
        registry
            .register(
                ModelClass::builder("Job")
                    .prop("n", PropDef::with_default(0))
                    .action("forbidden", |_, _, _| Ok(Value::Null))
                    .action("bump", |store, this, _| {
                        store.set(this, "n", 1)?;
                        Ok(Value::Null)
                    })
                    .flow("run", |_, _| {
                        flow_fn(|store, this, input| match input {
                            FlowInput::Start => Ok(FlowStep::Await(json!("tick"))),
                            FlowInput::Resolved(v) => {
                                store.set(this, "n", v.clone())?;
                                Ok(FlowStep::Done(v))
                            }
                            FlowInput::Rejected(err) => Err(err),
                        })
                    })
                    .build(),
            )
            .unwrap();
        let mut store = Store::with_registry(Rc::new(registry));
        let job = store.create_model("Job", Props::new()).unwrap();
        (store, job)
    }

    #[test]
    fn test_sync_call_and_short_circuit() {
        let (mut store, job) = store();
        let journal = Journal::default();
        let lines = journal.lines.clone();
        store
            .add_middleware(job, Rc::new(ActionTrackingMiddleware::new(journal)))
            .unwrap();

        store.call_action(job, "bump", Vec::new()).unwrap();
        let err = store.call_action(job, "forbidden", Vec::new()).unwrap_err();
        assert!(matches!(err, ArborError::ActionFailed { .. }));

        assert_eq!(
            *lines.borrow(),
            ["start bump", "finish bump ok", "start forbidden", "finish forbidden err"]
        );
    }

    #[test]
    fn test_flow_reported_as_one_call() {
        let (mut store, job) = store();
        let journal = Journal::default();
        let lines = journal.lines.clone();
        store
            .add_middleware(job, Rc::new(ActionTrackingMiddleware::new(journal)))
            .unwrap();

        let flow = store.start_flow(job, "run", Vec::new()).unwrap();
        store.resume_flow(&flow, Ok(Value::from(7))).unwrap();

        assert_eq!(
            *lines.borrow(),
            [
                "start run",
                "suspend run",
                "resume run",
                "suspend run",
                "resume run",
                "finish run ok"
            ]
        );
        assert_eq!(store.get(job, "n").unwrap(), Value::from(7));
    }
}
