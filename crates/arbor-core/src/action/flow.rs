//! Flow actions: resumable state machines driven segment by segment.
//!
//! A flow runs a spawn segment up to its first [`FlowStep::Await`], then one
//! resume segment per settled operation, and ends with exactly one return or
//! throw segment. Each segment is a synchronous action, so mutations inside a
//! flow are protected and visible to middlewares like any other action.
//!
//! Nothing cancels a suspended flow. Its state stays in the store until it is
//! resumed or dropped with [`Store::forget_flow`].

use crate::action::context::{ActionContext, ActionType, AsyncStepType};
use crate::errors::{ArborError, Result};
use crate::model::ActionKind;
use crate::ops::Store;
use crate::value::{NodeId, Value};
use arbor_core_types::FlowId;
use std::fmt;
use std::rc::Rc;

/// What a flow is given when it is stepped.
#[derive(Debug)]
pub enum FlowInput {
    Start,
    /// The awaited operation succeeded with this value
    Resolved(Value),
    /// The awaited operation failed
    Rejected(ArborError),
}

/// What a flow step produced.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowStep {
    /// Suspend until the described operation settles
    Await(serde_json::Value),
    /// Finish with a result
    Done(Value),
}

/// A resumable flow body.
///
/// Returning an error from `step` throws the flow.
pub trait Flow {
    /// # Errors
    ///
    /// An error ends the flow through its throw segment.
    fn step(&mut self, store: &mut Store, target: NodeId, input: FlowInput) -> Result<FlowStep>;
}

impl<F> Flow for F
where
    F: FnMut(&mut Store, NodeId, FlowInput) -> Result<FlowStep>,
{
    fn step(&mut self, store: &mut Store, target: NodeId, input: FlowInput) -> Result<FlowStep> {
        self(store, target, input)
    }
}

/// Box a closure as a flow, inferring its signature
pub fn flow_fn<F>(step: F) -> Box<dyn Flow>
where
    F: FnMut(&mut Store, NodeId, FlowInput) -> Result<FlowStep> + 'static,
{
    Box::new(step)
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowStatus {
    Suspended { awaiting: serde_json::Value },
    Returned(Value),
    Thrown(ArborError),
}

impl FlowStatus {
    pub fn is_suspended(&self) -> bool {
        matches!(self, FlowStatus::Suspended { .. })
    }
}

pub(crate) struct FlowState {
    pub(crate) target: NodeId,
    pub(crate) name: String,
    machine: Option<Box<dyn Flow>>,
    spawn: Rc<ActionContext>,
    last: Rc<ActionContext>,
    pub(crate) status: FlowStatus,
}

impl fmt::Debug for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowState")
            .field("target", &self.target)
            .field("name", &self.name)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Start a flow action declared on the target's model class.
    ///
    /// The spawn segment runs immediately. The returned id is used to resume
    /// the flow and to query its status, which stays available after the
    /// flow ends.
    ///
    /// # Errors
    /// * `NotAModel` - If `target` is not a model
    /// * `UnknownAction` - If the class declares no such action
    /// * `ActionFailed` - If the action is not a flow
    pub fn start_flow(&mut self, target: NodeId, name: &str, args: Vec<Value>) -> Result<FlowId> {
        let class = self.model_class(target)?;
        let factory = match class.action(name) {
            Some(ActionKind::Flow(factory)) => factory.clone(),
            Some(ActionKind::Sync(_)) => {
                return Err(ArborError::action_failed(
                    name,
                    "synchronous actions are invoked with call_action",
                ))
            }
            None => {
                return Err(ArborError::UnknownAction {
                    model_type: class.name().to_string(),
                    action: name.to_string(),
                })
            }
        };

        let flow_id = FlowId::new();
        let machine = factory(target, &args);
        let spawn = Rc::new(
            self.new_context(target, name, ActionType::Flow, args)
                .spawning(flow_id.clone()),
        );
        let state = FlowState {
            target,
            name: name.to_string(),
            machine: Some(machine),
            spawn: spawn.clone(),
            last: spawn.clone(),
            status: FlowStatus::Suspended {
                awaiting: serde_json::Value::Null,
            },
        };
        tracing::debug!(flow_id = %flow_id, op = name, target = %target, "flow spawned");
        self.drive_flow(flow_id.clone(), state, None, FlowInput::Start);
        Ok(flow_id)
    }

    /// Resume a suspended flow with the outcome of the operation it awaits.
    ///
    /// # Errors
    /// * `FlowNotFound` - If the id is unknown or was forgotten
    /// * `FlowNotSuspended` - If the flow already finished
    pub fn resume_flow(&mut self, flow_id: &FlowId, outcome: Result<Value>) -> Result<FlowStatus> {
        let state = self.flows.get(flow_id).ok_or_else(|| ArborError::FlowNotFound {
            flow_id: flow_id.clone(),
        })?;
        if !state.status.is_suspended() {
            return Err(ArborError::FlowNotSuspended {
                flow_id: flow_id.clone(),
            });
        }
        let state = self.flows.remove(flow_id).ok_or_else(|| ArborError::FlowNotFound {
            flow_id: flow_id.clone(),
        })?;

        let (step, args, input) = match outcome {
            Ok(value) => (
                AsyncStepType::Resume,
                vec![value.clone()],
                FlowInput::Resolved(value),
            ),
            Err(err) => (
                AsyncStepType::ResumeError,
                vec![Value::String(err.to_string())],
                FlowInput::Rejected(err),
            ),
        };
        self.drive_flow(flow_id.clone(), state, Some((step, args)), input);
        self.flow_status(flow_id)
    }

    /// # Errors
    ///
    /// Returns `FlowNotFound` if the id is unknown or was forgotten.
    pub fn flow_status(&self, flow_id: &FlowId) -> Result<FlowStatus> {
        self.flows
            .get(flow_id)
            .map(|state| state.status.clone())
            .ok_or_else(|| ArborError::FlowNotFound {
                flow_id: flow_id.clone(),
            })
    }

    /// Flows waiting to be resumed, oldest first
    pub fn pending_flows(&self) -> Vec<FlowId> {
        let mut pending: Vec<FlowId> = self
            .flows
            .iter()
            .filter(|(_, state)| state.status.is_suspended())
            .map(|(id, _)| id.clone())
            .collect();
        pending.sort();
        pending
    }

    /// Drop a flow's state. A suspended flow is abandoned without running
    /// its return or throw segment.
    pub fn forget_flow(&mut self, flow_id: &FlowId) -> bool {
        self.flows.remove(flow_id).is_some()
    }

    /// Run one segment and, if the flow finished, its closing segment.
    fn drive_flow(
        &mut self,
        flow_id: FlowId,
        mut state: FlowState,
        resume: Option<(AsyncStepType, Vec<Value>)>,
        input: FlowInput,
    ) {
        let ctx = match resume {
            None => state.spawn.clone(),
            Some((step, args)) => Rc::new(self.segment_context(&state, step, args)),
        };

        let target = state.target;
        let mut machine = state.machine.take();
        let mut produced = None;
        let result = self.run_in_context(ctx.clone(), |store| {
            let machine = machine.as_mut().ok_or_else(|| ArborError::Internal {
                message: "flow has no state machine".to_string(),
            })?;
            let step = machine.step(store, target, input)?;
            let value = match &step {
                FlowStep::Await(_) => Value::Null,
                FlowStep::Done(value) => value.clone(),
            };
            produced = Some(step);
            Ok(value)
        });
        state.last = ctx;

        state.status = match (result, produced) {
            (Ok(_), Some(FlowStep::Await(awaiting))) => {
                state.machine = machine;
                tracing::debug!(flow_id = %flow_id, op = %state.name, awaiting = %awaiting, "flow suspended");
                FlowStatus::Suspended { awaiting }
            }
            // A middleware may answer a segment without running it; its
            // value ends the flow.
            (Ok(value), _) => self.close_flow(&mut state, Ok(value)),
            (Err(err), _) => self.close_flow(&mut state, Err(err)),
        };
        self.flows.insert(flow_id, state);
    }

    fn close_flow(&mut self, state: &mut FlowState, outcome: Result<Value>) -> FlowStatus {
        let (step, args) = match &outcome {
            Ok(value) => (AsyncStepType::Return, vec![value.clone()]),
            Err(err) => (AsyncStepType::Throw, vec![Value::String(err.to_string())]),
        };
        let ctx = self.segment_context(state, step, args);
        let result = self.run_in_context(ctx, move |_| outcome);
        match result {
            Ok(value) => {
                tracing::debug!(op = %state.name, "flow returned");
                FlowStatus::Returned(value)
            }
            Err(err) => {
                tracing::debug!(op = %state.name, error = %err, "flow threw");
                FlowStatus::Thrown(err)
            }
        }
    }

    fn segment_context(&self, state: &FlowState, step: AsyncStepType, args: Vec<Value>) -> ActionContext {
        ActionContext::flow_segment(
            &state.spawn,
            step,
            args,
            state.last.clone(),
            self.action_stack.last().cloned(),
        )
    }
}
