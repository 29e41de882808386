#![allow(clippy::unwrap_used, clippy::expect_used)]

/// Scenario 4: Flow Actions and Middlewares
///
/// A flow suspends at each awaited operation and is resumed by a scheduler.
/// Middlewares see every segment as a synchronous action; an action tracker
/// sees one start and one finish for the whole flow.
use arbor_core::action::{FlowScheduler, FlowStatus};
use arbor_core::middlewares::{ActionTracker, ActionTrackingMiddleware, TrackingDecision};
use arbor_core::{
    flow_fn, middleware_fn, ActionContext, ArborError, AsyncStepType, FlowInput, FlowStep,
    ModelClass, NodeId, PropDef, Props, Registry, Result, Store, Value,
};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

/// `Loader` fetches two pages in sequence and stores their sum
fn loader_store() -> (Store, NodeId) {
    let registry = Registry::new();
    registry
        .register(
            ModelClass::builder("Loader")
                .prop("status", PropDef::with_default("idle"))
                .prop("total", PropDef::with_default(0))
                .flow("load", |_, _| {
                    let mut total = 0;
                    let mut page = 0;
                    flow_fn(move |store, this, input| match input {
                        FlowInput::Start => {
                            store.set(this, "status", "loading")?;
                            Ok(FlowStep::Await(json!({"page": 0})))
                        }
                        FlowInput::Resolved(value) => {
                            total += value.as_i64().unwrap_or(0);
                            page += 1;
                            if page < 2 {
                                return Ok(FlowStep::Await(json!({ "page": page })));
                            }
                            store.set(this, "total", Value::from(total))?;
                            store.set(this, "status", "done")?;
                            Ok(FlowStep::Done(Value::from(total)))
                        }
                        FlowInput::Rejected(err) => {
                            store.set(this, "status", "failed")?;
                            Err(err)
                        }
                    })
                })
                .build(),
        )
        .expect("Loader should register");
    let mut store = Store::with_registry(Rc::new(registry));
    let loader = store.create_model("Loader", Props::new()).unwrap();
    (store, loader)
}

#[derive(Default)]
struct Timeline {
    entries: Rc<RefCell<Vec<String>>>,
}

impl ActionTracker for Timeline {
    fn on_start(&self, _store: &mut Store, ctx: &ActionContext) -> TrackingDecision {
        self.entries.borrow_mut().push(format!("start:{}", ctx.action_name()));
        TrackingDecision::Proceed
    }

    fn on_finish(&self, _store: &mut Store, ctx: &ActionContext, result: &mut Result<Value>) {
        let outcome = match result {
            Ok(value) => format!("ok:{}", value.as_i64().unwrap_or(-1)),
            Err(_) => "err".to_string(),
        };
        self.entries
            .borrow_mut()
            .push(format!("finish:{}:{}", ctx.action_name(), outcome));
    }
}

#[test]
fn test_scenario_04_flow_driven_to_completion() {
    // GIVEN a loader with an action tracker
    let (mut store, loader) = loader_store();
    let timeline = Timeline::default();
    let entries = timeline.entries.clone();
    store
        .add_middleware(loader, Rc::new(ActionTrackingMiddleware::new(timeline)))
        .unwrap();

    // WHEN the flow starts
    let flow = store.start_flow(loader, "load", Vec::new()).unwrap();

    // THEN it is suspended on the first page
    assert_eq!(
        store.flow_status(&flow).unwrap(),
        FlowStatus::Suspended {
            awaiting: json!({"page": 0})
        }
    );
    assert_eq!(store.get(loader, "status").unwrap(), Value::from("loading"));

    // WHEN the scheduler answers every page with 10 + page
    let mut scheduler = FlowScheduler::new();
    let resumed = scheduler
        .drive(&mut store, |awaiting| {
            let page = awaiting["page"].as_i64().unwrap_or(0);
            Some(Ok(Value::from(10 + page)))
        })
        .unwrap();

    // THEN the flow returns the sum and the tracker saw one start and one finish
    assert_eq!(resumed, 2);
    assert_eq!(store.flow_status(&flow).unwrap(), FlowStatus::Returned(Value::from(21)));
    assert_eq!(store.get(loader, "total").unwrap(), Value::from(21));
    assert_eq!(*entries.borrow(), ["start:load", "finish:load:ok:21"]);
    assert!(store.pending_flows().is_empty());
}

#[test]
fn test_scenario_04_rejected_operation_throws_flow() {
    // GIVEN a started loader flow
    let (mut store, loader) = loader_store();
    let flow = store.start_flow(loader, "load", Vec::new()).unwrap();

    // WHEN the awaited operation fails
    let mut scheduler = FlowScheduler::new();
    scheduler.reject(flow.clone(), ArborError::action_failed("fetch", "offline"));
    scheduler.run_until_idle(&mut store).unwrap();

    // THEN the flow ends thrown with the error, after recording the failure
    match store.flow_status(&flow).unwrap() {
        FlowStatus::Thrown(ArborError::ActionFailed { reason, .. }) => assert_eq!(reason, "offline"),
        other => panic!("expected thrown flow, got {:?}", other),
    }
    assert_eq!(store.get(loader, "status").unwrap(), Value::from("failed"));

    // AND it cannot be resumed again
    let err = store.resume_flow(&flow, Ok(Value::Null)).unwrap_err();
    assert!(matches!(err, ArborError::FlowNotSuspended { .. }));
}

#[test]
fn test_scenario_04_unresumed_flow_stays_pending() {
    let (mut store, loader) = loader_store();
    let flow = store.start_flow(loader, "load", Vec::new()).unwrap();

    assert_eq!(store.pending_flows(), vec![flow.clone()]);
    assert!(store.forget_flow(&flow));
    assert!(store.pending_flows().is_empty());
    assert!(matches!(
        store.resume_flow(&flow, Ok(Value::Null)),
        Err(ArborError::FlowNotFound { .. })
    ));
}

#[test]
fn test_scenario_04_segments_share_root_context() {
    // GIVEN a middleware recording every segment of the flow
    let (mut store, loader) = loader_store();
    let segments = Rc::new(RefCell::new(Vec::new()));
    let sink = segments.clone();
    store
        .add_middleware(
            loader,
            middleware_fn(move |store, ctx, next| {
                sink.borrow_mut().push((
                    ctx.async_step(),
                    ctx.root_context().call_id().clone(),
                    ctx.flow_id().cloned(),
                ));
                next.run(store)
            }),
        )
        .unwrap();

    // WHEN the flow runs to completion
    let flow = store.start_flow(loader, "load", Vec::new()).unwrap();
    store.resume_flow(&flow, Ok(Value::from(1))).unwrap();
    store.resume_flow(&flow, Ok(Value::from(2))).unwrap();

    // THEN spawn, two resumes and the return segment ran under one root
    let segments = segments.borrow();
    let steps: Vec<_> = segments.iter().map(|(step, _, _)| *step).collect();
    assert_eq!(
        steps,
        [
            Some(AsyncStepType::Spawn),
            Some(AsyncStepType::Resume),
            Some(AsyncStepType::Resume),
            Some(AsyncStepType::Return)
        ]
    );
    assert!(segments.iter().all(|(_, root, _)| *root == segments[0].1));
    assert!(segments.iter().all(|(_, _, id)| id.as_ref() == Some(&flow)));
}

#[test]
fn test_scenario_04_first_registered_middleware_is_outermost() {
    let (mut store, loader) = loader_store();
    let order = Rc::new(RefCell::new(Vec::new()));
    for label in ["outer", "inner"] {
        let sink = order.clone();
        store
            .add_middleware(
                loader,
                middleware_fn(move |store, _ctx, next| {
                    sink.borrow_mut().push(format!("{} before", label));
                    let result = next.run(store);
                    sink.borrow_mut().push(format!("{} after", label));
                    result
                }),
            )
            .unwrap();
    }

    store
        .run_in_action(loader, "touch", |_| Ok(Value::Null))
        .unwrap();

    assert_eq!(
        *order.borrow(),
        ["outer before", "inner before", "inner after", "outer after"]
    );
}

#[test]
fn test_scenario_04_middleware_can_short_circuit() {
    let (mut store, loader) = loader_store();
    store
        .add_middleware(
            loader,
            middleware_fn(|store, ctx, next| {
                if ctx.action_name() == "blocked" {
                    return Ok(Value::from("skipped"));
                }
                next.run(store)
            }),
        )
        .unwrap();

    let result = store
        .run_in_action(loader, "blocked", |s| {
            s.set(loader, "status", "ran")?;
            Ok(Value::Null)
        })
        .unwrap();

    assert_eq!(result, Value::from("skipped"));
    assert_eq!(store.get(loader, "status").unwrap(), Value::from("idle"));
}
