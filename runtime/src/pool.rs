//! # WorkflowPool: Launch, Address and Tear Down Workflows by Id
//!
//! The pool maps `WorkflowType -> Launcher` and `WorkflowId -> Workflow`.
//! Callers never hold workflows directly; they hold handles and ask the pool:
//!
//! * `input(handle)` gives a sink that forwards to whatever instance is running
//! * `workflow_update(handle)` launches the instance if needed, then resolves
//!   with its next unseen state or its result
//! * `abandon_workflow(id)` cancels and forgets the instance
//!
//! Lookup-or-launch is serialized per id: the first caller reserves the id,
//! runs the launcher without holding the instance map, and publishes the
//! result. Callers arriving meanwhile wait for that launch and attach to the
//! same instance, so at most one instance per id is ever live. An instance is
//! forgotten once its completion has been delivered to a `workflow_update`
//! caller, after which the id launches fresh.

use crate::input::WorkflowInput;
use crate::workflow::Workflow;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use weft_core::{
    Event, FinishedWorkflow, Output, PoolConfig, RunWorkflow, State, TypeKey, WorkflowError,
    WorkflowId, WorkflowKey, WorkflowResult, WorkflowType, WorkflowUpdate,
};

/// Creates a `Workflow` for a given initial state.
///
/// Launchers run while their id is reserved, but not while the instance map
/// is locked: they may register launchers, inspect the pool and launch other
/// ids. Requesting an update of the id being launched from inside its own
/// launcher fails with `SelfDelegation`, or blocks forever when that check is
/// disabled. Work started by the returned workflow runs on its
/// own task and is free to use the pool.
pub trait Launcher<S, E, O>: Send + Sync + 'static {
    fn launch(&self, initial_state: S, pool: &WorkflowPool) -> anyhow::Result<Workflow<S, E, O>>;
}

impl<S, E, O, F> Launcher<S, E, O> for F
where
    F: Fn(S, &WorkflowPool) -> anyhow::Result<Workflow<S, E, O>> + Send + Sync + 'static,
{
    fn launch(&self, initial_state: S, pool: &WorkflowPool) -> anyhow::Result<Workflow<S, E, O>> {
        self(initial_state, pool)
    }
}

/// Type-erased view of a registered instance.
trait AnyWorkflow: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn instance(&self) -> u64;
    fn is_finished(&self) -> bool;
    fn cancel(&self);
}

impl<S: State, E: Event, O: Output> AnyWorkflow for Workflow<S, E, O> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn instance(&self) -> u64 {
        Workflow::instance(self)
    }

    fn is_finished(&self) -> bool {
        Workflow::is_finished(self)
    }

    fn cancel(&self) {
        Workflow::cancel(self)
    }
}

struct Entry {
    key: WorkflowKey,
    workflow: Box<dyn AnyWorkflow>,
}

impl Entry {
    fn downcast<S: State, E: Event, O: Output>(&self) -> WorkflowResult<&Workflow<S, E, O>> {
        self.workflow
            .as_any()
            .downcast_ref::<Workflow<S, E, O>>()
            .ok_or_else(|| WorkflowError::TypeMismatch {
                id: self.key.to_string(),
                expected: std::any::type_name::<Workflow<S, E, O>>(),
            })
    }
}

#[derive(Default)]
struct Counters {
    launched: AtomicU64,
    finished: AtomicU64,
    abandoned: AtomicU64,
}

struct PoolInner {
    config: PoolConfig,
    launchers: RwLock<HashMap<TypeKey, Box<dyn Any + Send + Sync>>>,
    workflows: Mutex<HashMap<WorkflowKey, Entry>>,
    /// Ids with a launch in progress. Never locked while `workflows` is held.
    launching: Mutex<HashMap<WorkflowKey, Arc<Mutex<()>>>>,
    counters: Counters,
}

/// Registry and orchestrator for workflows. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct WorkflowPool {
    inner: Arc<PoolInner>,
    /// The workflow this handle was given to, if any.
    scope: Option<WorkflowKey>,
}

impl Default for WorkflowPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl std::fmt::Debug for WorkflowPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowPool")
            .field("name", &self.inner.config.name)
            .field("running", &self.inner.workflows.lock().len())
            .finish()
    }
}

impl WorkflowPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                config,
                launchers: RwLock::new(HashMap::new()),
                workflows: Mutex::new(HashMap::new()),
                launching: Mutex::new(HashMap::new()),
                counters: Counters::default(),
            }),
            scope: None,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// A handle on the same pool, acting on behalf of workflow `key`.
    pub(crate) fn scoped(&self, key: WorkflowKey) -> Self {
        Self {
            inner: self.inner.clone(),
            scope: Some(key),
        }
    }

    /// Label for a workflow launched through this handle.
    pub(crate) fn scope_label(&self) -> String {
        match &self.scope {
            Some(key) => key.to_string(),
            None => "anonymous".to_string(),
        }
    }

    /// Associate `workflow_type` with `launcher`. A later registration for the
    /// same type replaces the earlier one; running instances are unaffected.
    pub fn register<S, E, O, L>(&self, workflow_type: WorkflowType<S, E, O>, launcher: L)
    where
        S: State,
        E: Event,
        O: Output,
        L: Launcher<S, E, O>,
    {
        let launcher: Arc<dyn Launcher<S, E, O>> = Arc::new(launcher);
        let replaced = self
            .inner
            .launchers
            .write()
            .insert(workflow_type.key(), Box::new(launcher))
            .is_some();

        tracing::debug!(
            pool = %self.name(),
            workflow_type = %workflow_type,
            replaced,
            "registered launcher"
        );
    }

    fn launcher_for<S, E, O>(
        &self,
        workflow_type: &WorkflowType<S, E, O>,
    ) -> WorkflowResult<Arc<dyn Launcher<S, E, O>>>
    where
        S: State,
        E: Event,
        O: Output,
    {
        self.inner
            .launchers
            .read()
            .get(&workflow_type.key())
            .and_then(|launcher| launcher.downcast_ref::<Arc<dyn Launcher<S, E, O>>>())
            .cloned()
            .ok_or_else(|| WorkflowError::NoLauncher {
                workflow_type: workflow_type.name().to_string(),
            })
    }

    /// Find the running instance for `handle.id`, launching it at `handle.state` if there is none.
    fn require_workflow<S, E, O>(&self, handle: RunWorkflow<S, E, O>) -> WorkflowResult<Workflow<S, E, O>>
    where
        S: State,
        E: Event,
        O: Output,
    {
        let key = handle.id.key();
        if let Some(workflow) = self.running::<S, E, O>(&key) {
            return workflow;
        }

        let reservation = self
            .inner
            .launching
            .lock()
            .entry(key.clone())
            .or_default()
            .clone();
        let outcome = {
            let _reserved = reservation.lock();
            match self.running::<S, E, O>(&key) {
                Some(workflow) => workflow,
                None => self.launch(&key, handle),
            }
        };

        let mut launching = self.inner.launching.lock();
        // The map and this function hold the only references once nobody else waits.
        if Arc::strong_count(&reservation) == 2 {
            launching.remove(&key);
        }
        outcome
    }

    fn running<S, E, O>(&self, key: &WorkflowKey) -> Option<WorkflowResult<Workflow<S, E, O>>>
    where
        S: State,
        E: Event,
        O: Output,
    {
        let workflows = self.inner.workflows.lock();
        let entry = workflows.get(key)?;
        tracing::trace!(pool = %self.name(), workflow = %key, "attached to running workflow");
        Some(entry.downcast::<S, E, O>().cloned())
    }

    /// Run the launcher for `key`. The caller holds the id's reservation.
    fn launch<S, E, O>(&self, key: &WorkflowKey, handle: RunWorkflow<S, E, O>) -> WorkflowResult<Workflow<S, E, O>>
    where
        S: State,
        E: Event,
        O: Output,
    {
        let launcher = self.launcher_for(&handle.id.workflow_type)?;
        let workflow = launcher
            .launch(handle.state, &self.scoped(key.clone()))
            .map_err(|cause| {
                tracing::warn!(pool = %self.name(), workflow = %key, error = %cause, "launch failed");
                WorkflowError::launch(key, cause)
            })?;

        self.inner.counters.launched.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            pool = %self.name(),
            workflow = %key,
            instance = workflow.instance(),
            "launched workflow"
        );

        self.inner.workflows.lock().insert(
            key.clone(),
            Entry {
                key: key.clone(),
                workflow: Box::new(workflow.clone()),
            },
        );
        Ok(workflow)
    }

    /// Forget `key` if it still refers to `instance`.
    fn forget(&self, key: &WorkflowKey, instance: u64) {
        let mut workflows = self.inner.workflows.lock();
        let current = workflows.get(key).map(|entry| entry.workflow.instance());
        if current == Some(instance) {
            workflows.remove(key);
            self.inner.counters.finished.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(pool = %self.name(), workflow = %key, instance, "forgot finished workflow");
        }
    }

    fn check_not_self(&self, key: &WorkflowKey) -> WorkflowResult<()> {
        if self.inner.config.detect_self_delegation && self.scope.as_ref() == Some(key) {
            return Err(WorkflowError::SelfDelegation {
                id: key.to_string(),
            });
        }
        Ok(())
    }

    /// A sink bound to `handle.id`. Never launches anything: events sent while
    /// no instance is running are dropped.
    pub fn input<S, E, O>(&self, handle: &RunWorkflow<S, E, O>) -> PoolInput<S, E, O>
    where
        S: State,
        E: Event,
        O: Output,
    {
        PoolInput {
            pool: self.clone(),
            id: handle.id.clone(),
        }
    }

    /// Launch `handle` if no instance is running for its id, then resolve with
    /// the first state that differs from `handle.state`, or with the result.
    ///
    /// The launch happens immediately, not when the future is first polled. A
    /// launch failure is reported by the returned future and leaves nothing
    /// registered. Delivering a completion (result, failure or cancellation)
    /// makes the pool forget the instance.
    pub fn workflow_update<S, E, O>(
        &self,
        handle: RunWorkflow<S, E, O>,
    ) -> BoxFuture<'static, WorkflowResult<WorkflowUpdate<S, E, O>>>
    where
        S: State,
        E: Event,
        O: Output,
    {
        let key = handle.id.key();
        if let Err(error) = self.check_not_self(&key) {
            return futures_util::future::ready(Err(error)).boxed();
        }

        let id = handle.id.clone();
        let observed = handle.state.clone();
        let workflow = match self.require_workflow(handle) {
            Ok(workflow) => workflow,
            Err(error) => return futures_util::future::ready(Err(error)).boxed(),
        };
        let pool = self.clone();

        async move {
            let mut states = workflow.state_receiver();
            loop {
                {
                    let current = states.borrow_and_update();
                    if *current != observed {
                        return Ok(WorkflowUpdate::Running(id.handle(current.clone())));
                    }
                }
                if states.changed().await.is_err() {
                    break;
                }
            }

            let result = workflow.result().await;
            pool.forget(&key, workflow.instance());
            result.map(|result| WorkflowUpdate::Finished(FinishedWorkflow { id, result }))
        }
        .boxed()
    }

    /// Follow `handle` through every update until the workflow finishes.
    pub fn await_workflow_result<S, E, O>(
        &self,
        handle: RunWorkflow<S, E, O>,
    ) -> BoxFuture<'static, WorkflowResult<O>>
    where
        S: State,
        E: Event,
        O: Output,
    {
        let pool = self.clone();
        let first = self.workflow_update(handle);

        async move {
            let mut next = first;
            loop {
                match next.await {
                    Ok(WorkflowUpdate::Running(handle)) => next = pool.workflow_update(handle),
                    Ok(WorkflowUpdate::Finished(finished)) => return Ok(finished.result),
                    Err(error) => return Err(error),
                }
            }
        }
        .boxed()
    }

    /// Cancel and forget the instance running as `id`. Idempotent.
    pub fn abandon_workflow<S, E, O>(&self, id: &WorkflowId<S, E, O>) {
        self.abandon_key(&id.key());
    }

    fn abandon_key(&self, key: &WorkflowKey) {
        let removed = self.inner.workflows.lock().remove(key);
        if let Some(entry) = removed {
            self.retire(&entry);
        }
    }

    /// Cancel a removed entry and count it. An instance that had already ended
    /// is counted as finished, not abandoned.
    fn retire(&self, entry: &Entry) {
        let counters = &self.inner.counters;
        if entry.workflow.is_finished() {
            counters.finished.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(pool = %self.name(), workflow = %entry.key, "forgot finished workflow");
            return;
        }
        entry.workflow.cancel();
        counters.abandoned.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(pool = %self.name(), workflow = %entry.key, "abandoned workflow");
    }

    /// Cancel and forget every instance.
    pub fn abandon_all(&self) {
        let drained: Vec<Entry> = self
            .inner
            .workflows
            .lock()
            .drain()
            .map(|(_, entry)| entry)
            .collect();

        for entry in &drained {
            self.retire(entry);
        }

        if !drained.is_empty() {
            tracing::debug!(pool = %self.name(), count = drained.len(), "abandoned all workflows");
        }
    }

    /// True while an instance is registered for `id`, finished or not.
    pub fn is_registered<S, E, O>(&self, id: &WorkflowId<S, E, O>) -> bool {
        self.inner.workflows.lock().contains_key(&id.key())
    }

    pub fn stats(&self) -> PoolStats {
        let counters = &self.inner.counters;
        PoolStats {
            launched: counters.launched.load(Ordering::Relaxed),
            finished: counters.finished.load(Ordering::Relaxed),
            abandoned: counters.abandoned.load(Ordering::Relaxed),
            registered: self.inner.workflows.lock().len(),
        }
    }

    /// Point-in-time view of every registered instance.
    pub fn snapshot(&self) -> PoolSnapshot {
        let mut workflows: Vec<WorkflowSnapshot> = self
            .inner
            .workflows
            .lock()
            .values()
            .map(|entry| WorkflowSnapshot {
                workflow_type: entry.key.type_name().to_string(),
                name: entry.key.name().to_string(),
                instance: entry.workflow.instance(),
                finished: entry.workflow.is_finished(),
            })
            .collect();
        workflows.sort_by_key(|w| w.instance);

        PoolSnapshot {
            pool: self.name().to_string(),
            stats: self.stats(),
            workflows,
        }
    }
}

/// Sink returned by `WorkflowPool::input`. Looks the instance up on every send.
pub struct PoolInput<S, E, O> {
    pool: WorkflowPool,
    id: WorkflowId<S, E, O>,
}

impl<S, E, O> Clone for PoolInput<S, E, O> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            id: self.id.clone(),
        }
    }
}

impl<S: State, E: Event, O: Output> PoolInput<S, E, O> {
    pub fn id(&self) -> &WorkflowId<S, E, O> {
        &self.id
    }

    pub fn send_event(&self, event: E) {
        let key = self.id.key();
        let workflow = {
            let workflows = self.pool.inner.workflows.lock();
            workflows
                .get(&key)
                .and_then(|entry| entry.downcast::<S, E, O>().ok())
                .cloned()
        };

        match workflow {
            Some(workflow) => workflow.send_event(event),
            None => {
                tracing::debug!(pool = %self.pool.name(), workflow = %key, "no running workflow; event dropped")
            }
        }
    }
}

impl<S: State, E: Event, O: Output> WorkflowInput<E> for PoolInput<S, E, O> {
    fn send_event(&self, event: E) {
        PoolInput::send_event(self, event);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Calls to a launcher that produced a workflow.
    pub launched: u64,
    /// Ended instances forgotten, after delivering their completion or on abandon.
    pub finished: u64,
    /// Running instances cancelled by `abandon_workflow` or `abandon_all`.
    pub abandoned: u64,
    /// Instances currently registered.
    pub registered: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowSnapshot {
    pub workflow_type: String,
    pub name: String,
    pub instance: u64,
    pub finished: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolSnapshot {
    pub pool: String,
    pub stats: PoolStats,
    pub workflows: Vec<WorkflowSnapshot>,
}

impl PoolSnapshot {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
