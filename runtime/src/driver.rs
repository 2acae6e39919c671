//! # Driver: Running a Transition Function to Completion
//!
//! `discrete_state_workflow` spawns the loop that turns a `Transition` into a
//! live `Workflow`:
//!
//! 1. publish the initial state
//! 2. call `next(state, events, pool)`
//! 3. `EnterState(s)` publishes `s` and goes back to 2; `FinishWith(o)` resolves the result
//!
//! Calls to `next` never overlap, and an event still pending when a step
//! returns is dropped rather than handed to the next step. Cancelling the
//! workflow interrupts whatever `next` is awaiting; either way the event
//! channel and state stream close when the loop ends.

use crate::channel::EventChannel;
use crate::pool::WorkflowPool;
use crate::workflow::Workflow;
use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use weft_core::{Event, Output, Reaction, State, WorkflowError, WorkflowResult};

/// The contract for one step of a discrete state machine.
///
/// Implemented for any `Fn(S, EventChannel<E>, WorkflowPool) -> impl Future`
/// returning `anyhow::Result<Reaction<S, O>>`. Returning an error fails the
/// workflow; a `WorkflowError` raised through `?` keeps its identity.
#[async_trait]
pub trait Transition<S, E, O>: Send + Sync + 'static
where
    S: Send + 'static,
    E: Send + 'static,
    O: Send + 'static,
{
    async fn next(
        &self,
        state: S,
        events: &EventChannel<E>,
        pool: &WorkflowPool,
    ) -> anyhow::Result<Reaction<S, O>>;
}

#[async_trait]
impl<S, E, O, F, Fut> Transition<S, E, O> for F
where
    S: State,
    E: Event,
    O: Output,
    F: Fn(S, EventChannel<E>, WorkflowPool) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Reaction<S, O>>> + Send + 'static,
{
    async fn next(
        &self,
        state: S,
        events: &EventChannel<E>,
        pool: &WorkflowPool,
    ) -> anyhow::Result<Reaction<S, O>> {
        (self)(state, events.clone(), pool.clone()).await
    }
}

/// Spawn a workflow that starts at `initial_state` and steps through `transition`.
///
/// `pool` is handed to every step. When called from a `Launcher`, pass the pool
/// the launcher received so the workflow is labelled with its id. Must be
/// called from within a tokio runtime.
pub fn discrete_state_workflow<S, E, O, T>(
    initial_state: S,
    pool: &WorkflowPool,
    transition: T,
) -> Workflow<S, E, O>
where
    S: State,
    E: Event,
    O: Output,
    T: Transition<S, E, O>,
{
    let label: Arc<str> = Arc::from(pool.scope_label());
    let (state_tx, state_rx) = watch::channel(initial_state.clone());
    let events = EventChannel::new();
    let cancel = CancellationToken::new();

    let span = tracing::info_span!(
        "Workflow",
        weft.pool = %pool.name(),
        weft.workflow = %label,
    );

    let driver = Driver {
        label: label.clone(),
        transition,
        events: events.clone(),
        pool: pool.clone(),
        state_tx,
        cancel: cancel.clone(),
        _output: PhantomData,
    };
    let task = tokio::spawn(driver.run(initial_state).instrument(span));

    Workflow::from_task(label, state_rx, events, cancel, task)
}

struct Driver<S, E, O, T> {
    label: Arc<str>,
    transition: T,
    events: EventChannel<E>,
    pool: WorkflowPool,
    state_tx: watch::Sender<S>,
    cancel: CancellationToken,
    _output: PhantomData<fn() -> O>,
}

/// Closes the event channel however the driver exits, including by panic.
struct CloseOnDrop<E: Event>(EventChannel<E>);

impl<E: Event> Drop for CloseOnDrop<E> {
    fn drop(&mut self) {
        self.0.close();
    }
}

impl<S, E, O, T> Driver<S, E, O, T>
where
    S: State,
    E: Event,
    O: Output,
    T: Transition<S, E, O>,
{
    async fn run(self, initial_state: S) -> WorkflowResult<O> {
        let Driver {
            label,
            transition,
            events,
            pool,
            state_tx,
            cancel,
            ..
        } = self;
        let _close = CloseOnDrop(events.clone());

        tracing::debug!("workflow started");

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(WorkflowError::Cancelled),
            result = step_until_finished(&label, &transition, initial_state, &events, &pool, &state_tx) => result,
        };

        match &outcome {
            Ok(_) => tracing::debug!("workflow finished"),
            Err(WorkflowError::Cancelled) => tracing::debug!("workflow cancelled"),
            Err(error) => tracing::warn!(%error, "workflow failed"),
        }

        drop(state_tx);
        outcome
    }
}

async fn step_until_finished<S, E, O, T>(
    label: &str,
    transition: &T,
    initial_state: S,
    events: &EventChannel<E>,
    pool: &WorkflowPool,
    state_tx: &watch::Sender<S>,
) -> WorkflowResult<O>
where
    S: State,
    E: Event,
    O: Output,
    T: Transition<S, E, O>,
{
    let mut state = initial_state;
    let mut step: u64 = 0;

    loop {
        step += 1;
        match transition.next(state, events, pool).await {
            Ok(Reaction::EnterState(next)) => {
                tracing::trace!(step, "entered state");
                state_tx.send_replace(next.clone());
                events.discard_pending();
                state = next;
            }
            Ok(Reaction::FinishWith(result)) => {
                tracing::trace!(step, "finished");
                return Ok(result);
            }
            Err(cause) => return Err(WorkflowError::transition(label, cause)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn tick(
        n: u32,
        events: EventChannel<u32>,
        _pool: WorkflowPool,
    ) -> anyhow::Result<Reaction<u32, u32>> {
        let step = events.receive().await?;
        if step == 0 {
            return Ok(Reaction::FinishWith(n));
        }
        Ok(Reaction::EnterState(n + step))
    }

    #[tokio::test]
    async fn steps_until_finished() {
        let pool = WorkflowPool::default();
        let workflow = discrete_state_workflow(0, &pool, tick);
        assert_eq!(workflow.label(), "anonymous");

        workflow.send_event(5);
        let mut states = workflow.subscribe_state();
        assert_eq!(states.next().await, Some(0));
        assert_eq!(states.next().await, Some(5));

        workflow.send_event(0);
        assert_eq!(workflow.result().await.unwrap(), 5);
        assert!(workflow.is_finished());
    }

    #[tokio::test]
    async fn cancel_interrupts_a_pending_select() {
        let pool = WorkflowPool::default();
        let workflow: Workflow<u32, u32, u32> = discrete_state_workflow(
            0,
            &pool,
            |n: u32, events: EventChannel<u32>, _pool: WorkflowPool| async move {
                let picked = events
                    .select()
                    .on_event(Some)
                    .on_future(tokio::time::sleep(Duration::from_secs(3600)), |()| 0)
                    .await?;
                Ok::<Reaction<u32, u32>, anyhow::Error>(Reaction::EnterState(n + picked))
            },
        );
        tokio::task::yield_now().await;

        workflow.cancel();
        workflow.cancel();

        assert!(workflow.result().await.unwrap_err().is_cancelled());
        assert!(workflow.is_finished());
        assert_eq!(workflow.current_state(), 0);
    }

    async fn settle_then_listen(
        state: u32,
        events: EventChannel<&'static str>,
        _pool: WorkflowPool,
    ) -> anyhow::Result<Reaction<u32, &'static str>> {
        if state == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(Reaction::EnterState(1));
        }
        Ok(Reaction::FinishWith(events.receive().await?))
    }

    #[tokio::test(start_paused = true)]
    async fn events_are_not_carried_into_the_next_step() {
        let pool = WorkflowPool::default();
        let workflow = discrete_state_workflow(0, &pool, settle_then_listen);

        tokio::time::sleep(Duration::from_millis(10)).await;
        workflow.send_event("stale");
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(workflow.current_state(), 1);
        workflow.send_event("fresh");

        assert_eq!(workflow.result().await.unwrap(), "fresh");
    }

    #[tokio::test]
    async fn panicking_transition_fails_the_workflow() {
        let pool = WorkflowPool::default();
        let workflow: Workflow<u32, (), u32> = discrete_state_workflow(
            0,
            &pool,
            |_: u32, _events: EventChannel<()>, _pool: WorkflowPool| async move {
                if true {
                    panic!("wires crossed");
                }
                Ok::<Reaction<u32, u32>, anyhow::Error>(Reaction::FinishWith(0))
            },
        );

        let err = workflow.result().await.unwrap_err();

        assert!(matches!(err, WorkflowError::Transition { .. }));
        assert!(workflow.is_finished());
    }
}
