//! # Workflow: A Running State Machine
//!
//! A `Workflow` is a cheap, cloneable view of one running instance:
//!
//! * a conflated state stream (`subscribe_state`)
//! * an event sink (`send_event`)
//! * a completion slot every clone can await (`result`)
//! * a cancel switch (`cancel`)

use crate::channel::EventChannel;
use crate::input::WorkflowInput;
use futures_core::Stream;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use weft_core::{Event, Output, State, WorkflowError, WorkflowResult};

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

type Completion<O> = Shared<BoxFuture<'static, WorkflowResult<O>>>;

pub struct Workflow<S, E, O> {
    label: Arc<str>,
    instance: u64,
    state: watch::Receiver<S>,
    events: EventChannel<E>,
    completion: Completion<O>,
    cancel: CancellationToken,
}

impl<S, E, O> Clone for Workflow<S, E, O> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            instance: self.instance,
            state: self.state.clone(),
            events: self.events.clone(),
            completion: self.completion.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<S: State, E: Event, O: Output> Workflow<S, E, O> {
    /// Wrap a spawned driver task.
    pub(crate) fn from_task(
        label: Arc<str>,
        state: watch::Receiver<S>,
        events: EventChannel<E>,
        cancel: CancellationToken,
        task: JoinHandle<WorkflowResult<O>>,
    ) -> Self {
        let task_label = label.clone();
        let completion = async move {
            match task.await {
                Ok(result) => result,
                Err(join) if join.is_cancelled() => Err(WorkflowError::Cancelled),
                Err(join) => Err(WorkflowError::transition(
                    task_label,
                    anyhow::anyhow!("transition panicked: {join}"),
                )),
            }
        }
        .boxed()
        .shared();

        Self {
            label,
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            state,
            events,
            completion,
            cancel,
        }
    }

    /// Display label, usually the id the pool launched it under.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Process-unique number distinguishing successive launches of the same id.
    pub fn instance(&self) -> u64 {
        self.instance
    }

    /// The most recently published state.
    pub fn current_state(&self) -> S {
        self.state.borrow().clone()
    }

    /// Open a stream of states. It starts with the latest published state,
    /// follows later ones (conflated: a slow reader sees the newest), and ends
    /// when the workflow ends.
    pub fn subscribe_state(&self) -> StateStream<S> {
        StateStream {
            rx: self.state.clone(),
            head_taken: false,
        }
    }

    pub(crate) fn state_receiver(&self) -> watch::Receiver<S> {
        self.state.clone()
    }

    /// Offer an event to the workflow; dropped if it has ended.
    pub fn send_event(&self, event: E) {
        self.events.send_event(event);
    }

    /// Resolves with the result, or with the failure or cancellation that ended it.
    pub fn result(&self) -> impl Future<Output = WorkflowResult<O>> + Send + 'static {
        self.completion.clone()
    }

    /// True once the workflow stopped accepting events.
    pub fn is_finished(&self) -> bool {
        self.events.is_closed()
    }

    /// Cancel the workflow. Idempotent; a no-op once it has ended.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!(workflow = %self.label, "cancelling workflow");
        }
        self.cancel.cancel();
        self.events.close();
    }
}

impl<S: State, E: Event, O: Output> WorkflowInput<E> for Workflow<S, E, O> {
    fn send_event(&self, event: E) {
        Workflow::send_event(self, event);
    }
}

/// Conflated stream of a workflow's states. See `Workflow::subscribe_state`.
pub struct StateStream<S> {
    rx: watch::Receiver<S>,
    head_taken: bool,
}

impl<S: State> StateStream<S> {
    /// The next state, or `None` once the workflow has ended.
    pub async fn next(&mut self) -> Option<S> {
        if !self.head_taken {
            self.head_taken = true;
            return Some(self.rx.borrow_and_update().clone());
        }
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Adapt into a `futures` stream for combinator use.
    pub fn into_stream(self) -> impl Stream<Item = S> + Send + 'static {
        futures_util::stream::unfold(self, |mut states| async move {
            let state = states.next().await?;
            Some((state, states))
        })
    }
}
