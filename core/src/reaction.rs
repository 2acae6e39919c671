use crate::id::{RunWorkflow, WorkflowId};
use std::fmt;

/// The explicit result of one transition step.
///
/// Every call of a transition function settles to a `Reaction`: either the
/// machine moves to a new state and runs again, or it is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction<S, O> {
    /// Advance to the given state; another transition step follows.
    EnterState(S),
    /// Terminal. The machine finishes with this result.
    FinishWith(O),
}

impl<S, O> Reaction<S, O> {
    pub fn map_state<T, F: FnOnce(S) -> T>(self, op: F) -> Reaction<T, O> {
        match self {
            Reaction::EnterState(s) => Reaction::EnterState(op(s)),
            Reaction::FinishWith(o) => Reaction::FinishWith(o),
        }
    }

    pub fn map_result<P, F: FnOnce(O) -> P>(self, op: F) -> Reaction<S, P> {
        match self {
            Reaction::EnterState(s) => Reaction::EnterState(s),
            Reaction::FinishWith(o) => Reaction::FinishWith(op(o)),
        }
    }

    pub fn is_finish(&self) -> bool {
        matches!(self, Reaction::FinishWith(_))
    }
}

/// The terminal result of a workflow, tagged with the id that produced it.
pub struct FinishedWorkflow<S, E, O> {
    pub id: WorkflowId<S, E, O>,
    pub result: O,
}

impl<S, E, O: Clone> Clone for FinishedWorkflow<S, E, O> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            result: self.result.clone(),
        }
    }
}

impl<S, E, O: PartialEq> PartialEq for FinishedWorkflow<S, E, O> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.result == other.result
    }
}

impl<S, E, O: fmt::Debug> fmt::Debug for FinishedWorkflow<S, E, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinishedWorkflow")
            .field("id", &self.id)
            .field("result", &self.result)
            .finish()
    }
}

/// What a caller of `WorkflowPool::workflow_update` learns next.
pub enum WorkflowUpdate<S, E, O> {
    /// The workflow moved to a state the caller had not seen; the handle carries it.
    Running(RunWorkflow<S, E, O>),
    /// The workflow finished.
    Finished(FinishedWorkflow<S, E, O>),
}

impl<S, E, O> WorkflowUpdate<S, E, O> {
    pub fn is_finished(&self) -> bool {
        matches!(self, WorkflowUpdate::Finished(_))
    }

    /// The new state, if still running.
    pub fn state(&self) -> Option<&S> {
        match self {
            WorkflowUpdate::Running(handle) => Some(&handle.state),
            WorkflowUpdate::Finished(_) => None,
        }
    }

    /// The result, if finished.
    pub fn into_result(self) -> Option<O> {
        match self {
            WorkflowUpdate::Running(_) => None,
            WorkflowUpdate::Finished(finished) => Some(finished.result),
        }
    }
}

impl<S: Clone, E, O: Clone> Clone for WorkflowUpdate<S, E, O> {
    fn clone(&self) -> Self {
        match self {
            WorkflowUpdate::Running(handle) => WorkflowUpdate::Running(handle.clone()),
            WorkflowUpdate::Finished(finished) => WorkflowUpdate::Finished(finished.clone()),
        }
    }
}

impl<S: PartialEq, E, O: PartialEq> PartialEq for WorkflowUpdate<S, E, O> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (WorkflowUpdate::Running(a), WorkflowUpdate::Running(b)) => a == b,
            (WorkflowUpdate::Finished(a), WorkflowUpdate::Finished(b)) => a == b,
            _ => false,
        }
    }
}

impl<S: fmt::Debug, E, O: fmt::Debug> fmt::Debug for WorkflowUpdate<S, E, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowUpdate::Running(handle) => f.debug_tuple("Running").field(handle).finish(),
            WorkflowUpdate::Finished(finished) => {
                f.debug_tuple("Finished").field(finished).finish()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::WorkflowType;

    #[test]
    fn maps_only_the_matching_side() {
        let enter: Reaction<u32, String> = Reaction::EnterState(1);
        let finish: Reaction<u32, String> = Reaction::FinishWith("done".into());

        assert_eq!(enter.clone().map_state(|s| s + 1), Reaction::EnterState(2));
        assert_eq!(enter.map_result(|o| o.len()), Reaction::EnterState(1));
        assert_eq!(finish.clone().map_result(|o| o.len()), Reaction::FinishWith(4));
        assert!(finish.is_finish());
    }

    #[test]
    fn update_accessors() {
        let t: WorkflowType<u32, (), String> = WorkflowType::new("t");
        let running: WorkflowUpdate<u32, (), String> = WorkflowUpdate::Running(t.handle("a", 7));
        let finished: WorkflowUpdate<u32, (), String> = WorkflowUpdate::Finished(FinishedWorkflow {
            id: t.workflow_id("a"),
            result: "ok".into(),
        });

        assert_eq!(running.state(), Some(&7));
        assert!(!running.is_finished());
        assert!(finished.is_finished());
        assert_eq!(finished.into_result(), Some("ok".to_string()));
    }
}
