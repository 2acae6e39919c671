//! Nested delegation.
//!
//! A parent state that wraps a child workflow implements `Delegating`. The
//! parent can then wait on the child's next reaction as one more select
//! source. The pool never abandons children on the parent's behalf: a parent
//! leaving a delegating state early must call `abandon_delegate` itself.

use crate::channel::Select;
use crate::pool::WorkflowPool;
use futures_util::future::BoxFuture;
use weft_core::{Event, Output, RunWorkflow, State, WorkflowId, WorkflowResult, WorkflowUpdate};

/// A state that carries a nested workflow's id and its last observed state.
pub trait Delegating<S, E, O> {
    fn delegate_id(&self) -> WorkflowId<S, E, O>;

    fn delegate_state(&self) -> S;

    fn delegate_handle(&self) -> RunWorkflow<S, E, O> {
        self.delegate_id().handle(self.delegate_state())
    }
}

impl WorkflowPool {
    /// `workflow_update` for the nested workflow `delegating` refers to.
    pub fn next_delegate_reaction<D, S, E, O>(
        &self,
        delegating: &D,
    ) -> BoxFuture<'static, WorkflowResult<WorkflowUpdate<S, E, O>>>
    where
        D: Delegating<S, E, O>,
        S: State,
        E: Event,
        O: Output,
    {
        self.workflow_update(delegating.delegate_handle())
    }

    /// Abandon the nested workflow `delegating` refers to.
    pub fn abandon_delegate<D, S, E, O>(&self, delegating: &D)
    where
        D: Delegating<S, E, O>,
    {
        self.abandon_workflow(&delegating.delegate_id());
    }
}

impl<'a, E: Event, R: Send + 'a> Select<'a, E, R> {
    /// Race the next update of a workflow through `pool`.
    pub fn on_workflow_update<S2, E2, O2, F>(
        self,
        pool: &WorkflowPool,
        handle: RunWorkflow<S2, E2, O2>,
        handler: F,
    ) -> Self
    where
        S2: State,
        E2: Event,
        O2: Output,
        F: FnOnce(WorkflowUpdate<S2, E2, O2>) -> R + Send + 'a,
    {
        self.on_result(pool.workflow_update(handle), handler)
    }

    /// Race the next reaction of the workflow `delegating` wraps.
    pub fn on_next_delegate_reaction<D, S2, E2, O2, F>(
        self,
        pool: &WorkflowPool,
        delegating: &D,
        handler: F,
    ) -> Self
    where
        D: Delegating<S2, E2, O2>,
        S2: State,
        E2: Event,
        O2: Output,
        F: FnOnce(WorkflowUpdate<S2, E2, O2>) -> R + Send + 'a,
    {
        self.on_result(pool.next_delegate_reaction(delegating), handler)
    }
}
