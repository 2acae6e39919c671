#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use weft_runtime::prelude::*;
use weft_runtime::weft_core::{Reaction, WorkflowType};

pub const STOP: &str = "STOP";

/// A fresh pool, with driver logs routed to the test output.
pub fn test_pool() -> WorkflowPool {
    weft_runtime::weft_core::telemetry::try_init_test_tracing();
    WorkflowPool::default()
}

pub type Recorded = Vec<String>;

/// Records every event it receives until `STOP`, then finishes with the recording.
pub async fn record(
    state: Recorded,
    events: EventChannel<String>,
    _pool: WorkflowPool,
) -> anyhow::Result<Reaction<Recorded, Recorded>> {
    let event = events.receive().await?;
    if event == STOP {
        return Ok(Reaction::FinishWith(state));
    }
    let mut next = state;
    next.push(event);
    Ok(Reaction::EnterState(next))
}

pub fn recorder_type() -> WorkflowType<Recorded, String, Recorded> {
    WorkflowType::new("Recorder")
}

/// Registers a recorder launcher on `pool` and returns the number of times it has launched.
pub fn register_recorder(
    pool: &WorkflowPool,
    workflow_type: &WorkflowType<Recorded, String, Recorded>,
) -> Arc<AtomicUsize> {
    let launches = Arc::new(AtomicUsize::new(0));
    let counter = launches.clone();
    pool.register(
        workflow_type.clone(),
        move |state: Recorded, pool: &WorkflowPool| -> anyhow::Result<Workflow<Recorded, String, Recorded>> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(discrete_state_workflow(state, pool, record))
        },
    );
    launches
}

pub fn strings(items: &[&str]) -> Recorded {
    items.iter().map(|s| s.to_string()).collect()
}

/// Bounds every wait in the tests. Under paused time this only fires when the
/// awaited future can never make progress.
pub async fn within<F: std::future::Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("timed out")
}

/// True if `future` is still pending after the runtime has gone idle.
pub async fn stays_pending<F: std::future::Future + Unpin>(future: &mut F) -> bool {
    tokio::time::timeout(Duration::from_millis(50), future)
        .await
        .is_err()
}

/// Counts how many times it has been dropped.
pub struct DropCounter(pub Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Yield until every instance registered in `pool` has ended, without
/// delivering any completion.
pub async fn wait_until_all_ended(pool: &WorkflowPool) {
    within(async {
        while pool.snapshot().workflows.iter().any(|w| !w.finished) {
            tokio::task::yield_now().await;
        }
    })
    .await;
}
