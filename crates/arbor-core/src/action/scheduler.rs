use crate::action::flow::FlowStatus;
use crate::errors::{ArborError, Result};
use crate::ops::Store;
use crate::value::Value;
use arbor_core_types::FlowId;
use std::collections::VecDeque;

/// FIFO queue of settled operations for suspended flows.
///
/// Outcomes are queued with [`FlowScheduler::resolve`] or
/// [`FlowScheduler::reject`] and delivered by [`FlowScheduler::run_until_idle`].
#[derive(Debug, Default)]
pub struct FlowScheduler {
    queue: VecDeque<(FlowId, Result<Value>)>,
}

impl FlowScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settle(&mut self, flow_id: FlowId, outcome: Result<Value>) {
        self.queue.push_back((flow_id, outcome));
    }

    pub fn resolve(&mut self, flow_id: FlowId, value: impl Into<Value>) {
        self.settle(flow_id, Ok(value.into()));
    }

    pub fn reject(&mut self, flow_id: FlowId, err: ArborError) {
        self.settle(flow_id, Err(err));
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Deliver queued outcomes in order until the queue is empty.
    ///
    /// Returns how many flows were resumed.
    ///
    /// # Errors
    ///
    /// `FlowNotFound` or `FlowNotSuspended` for an outcome addressed to a flow
    /// that cannot take it. Outcomes after the failing one stay queued.
    pub fn run_until_idle(&mut self, store: &mut Store) -> Result<usize> {
        let mut resumed = 0;
        while let Some((flow_id, outcome)) = self.queue.pop_front() {
            store.resume_flow(&flow_id, outcome)?;
            resumed += 1;
        }
        Ok(resumed)
    }

    /// Drive every pending flow to completion.
    ///
    /// `resolver` settles the operation a flow awaits; returning `None`
    /// leaves that flow suspended. Stops once a full pass settles nothing.
    ///
    /// # Errors
    ///
    /// Errors from [`FlowScheduler::run_until_idle`].
    pub fn drive<R>(&mut self, store: &mut Store, mut resolver: R) -> Result<usize>
    where
        R: FnMut(&serde_json::Value) -> Option<Result<Value>>,
    {
        let mut resumed = self.run_until_idle(store)?;
        loop {
            for flow_id in store.pending_flows() {
                if let FlowStatus::Suspended { awaiting } = store.flow_status(&flow_id)? {
                    if let Some(outcome) = resolver(&awaiting) {
                        self.settle(flow_id, outcome);
                    }
                }
            }
            if self.is_empty() {
                return Ok(resumed);
            }
            resumed += self.run_until_idle(store)?;
        }
    }
}
