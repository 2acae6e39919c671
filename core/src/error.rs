use std::sync::Arc;
use thiserror::Error;

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Everything that can go wrong while launching, driving or awaiting a workflow.
///
/// `Clone` so one completion can be handed to every waiter; foreign errors are
/// shared behind an `Arc`.
#[derive(Error, Debug, Clone)]
pub enum WorkflowError {
    /// The workflow was abandoned or cancelled before it finished.
    #[error("workflow was cancelled")]
    Cancelled,

    #[error("no launcher registered for workflow type `{workflow_type}`")]
    NoLauncher { workflow_type: String },

    #[error("failed to launch workflow `{id}`: {cause:#}")]
    Launch { id: String, cause: Arc<anyhow::Error> },

    #[error("workflow `{id}` failed: {cause:#}")]
    Transition { id: String, cause: Arc<anyhow::Error> },

    #[error("registry entry for `{id}` is not a `{expected}`")]
    TypeMismatch { id: String, expected: &'static str },

    #[error("workflow `{id}` asked the pool for its own update")]
    SelfDelegation { id: String },

    #[error("select has no sources to wait on")]
    NothingToSelect,
}

impl WorkflowError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WorkflowError::Cancelled)
    }

    pub fn launch(id: impl ToString, cause: anyhow::Error) -> Self {
        WorkflowError::Launch {
            id: id.to_string(),
            cause: Arc::new(cause),
        }
    }

    /// Wrap an error raised inside a transition of workflow `id`.
    ///
    /// A `WorkflowError` that travelled through `anyhow` keeps its identity, so
    /// a cancelled select stays `Cancelled` and a failed child stays a failure
    /// of that child.
    pub fn transition(id: impl ToString, cause: anyhow::Error) -> Self {
        match cause.downcast::<WorkflowError>() {
            Ok(inner) => inner,
            Err(cause) => WorkflowError::Transition {
                id: id.to_string(),
                cause: Arc::new(cause),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_keeps_workflow_errors_intact() {
        let wrapped = anyhow::Error::new(WorkflowError::Cancelled);
        assert!(WorkflowError::transition("parent", wrapped).is_cancelled());

        let foreign = anyhow::anyhow!("disk on fire");
        match WorkflowError::transition("parent", foreign) {
            WorkflowError::Transition { id, cause } => {
                assert_eq!(id, "parent");
                assert_eq!(cause.to_string(), "disk on fire");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn display_includes_cause_chain() {
        let cause = anyhow::anyhow!("root").context("outer");
        let err = WorkflowError::launch("Counter(x)", cause);

        assert_eq!(
            err.to_string(),
            "failed to launch workflow `Counter(x)`: outer: root"
        );
    }
}
