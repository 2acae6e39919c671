//! Workers: one-shot async jobs run as pool workflows.
//!
//! Running a worker through the pool gives it an id. Two callers awaiting the
//! same worker and name share one run, and a parent can abandon it like any
//! other workflow.

use crate::channel::{EventChannel, Select};
use crate::driver::discrete_state_workflow;
use crate::pool::{Launcher, WorkflowPool};
use crate::workflow::Workflow;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use weft_core::{Event, Output, Reaction, State, WorkflowResult, WorkflowType};

/// An async job producing `O` from `I`.
#[async_trait]
pub trait Worker<I, O>: Send + Sync + 'static
where
    I: Send + 'static,
{
    async fn call(&self, input: I) -> anyhow::Result<O>;
}

#[async_trait]
impl<I, O, F, Fut> Worker<I, O> for F
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<O>> + Send + 'static,
{
    async fn call(&self, input: I) -> anyhow::Result<O> {
        (self)(input).await
    }
}

/// The workflow type a worker of type `W` runs under. Its state is the worker's input.
///
/// A worker implementing `Worker` for several input/output pairs gets one
/// workflow type per pair.
pub fn worker_type<W, I, O>() -> WorkflowType<I, (), O>
where
    W: Worker<I, O>,
    I: Send + 'static,
    O: 'static,
{
    WorkflowType::of::<W>()
}

struct WorkerLauncher<W> {
    worker: Arc<W>,
}

impl<W, I, O> Launcher<I, (), O> for WorkerLauncher<W>
where
    W: Worker<I, O>,
    I: State,
    O: Output,
{
    fn launch(&self, input: I, pool: &WorkflowPool) -> anyhow::Result<Workflow<I, (), O>> {
        let worker = self.worker.clone();
        Ok(discrete_state_workflow(
            input,
            pool,
            move |input: I, _events: EventChannel<()>, _pool: WorkflowPool| {
                let worker = worker.clone();
                async move {
                    let output = worker.call(input).await?;
                    Ok::<Reaction<I, O>, anyhow::Error>(Reaction::FinishWith(output))
                }
            },
        ))
    }
}

impl WorkflowPool {
    /// Run `worker` on `input` as the workflow `(worker type, name)` and resolve with its output.
    ///
    /// If that workflow is already running, this attaches to it and `input` is ignored.
    pub fn await_worker_result<W, I, O>(
        &self,
        worker: Arc<W>,
        input: I,
        name: impl Into<String>,
    ) -> BoxFuture<'static, WorkflowResult<O>>
    where
        W: Worker<I, O>,
        I: State,
        O: Output,
    {
        let workflow_type = worker_type::<W, I, O>();
        self.register(workflow_type.clone(), WorkerLauncher { worker });
        self.await_workflow_result(workflow_type.handle(name, input))
    }

    /// Cancel the run of `worker` on inputs `I` called `name`. Idempotent.
    pub fn abandon_worker<W, I, O>(&self, _worker: &W, name: impl Into<String>)
    where
        W: Worker<I, O>,
        I: Send + 'static,
        O: 'static,
    {
        self.abandon_workflow(&worker_type::<W, I, O>().workflow_id(name));
    }
}

impl<'a, E: Event, R: Send + 'a> Select<'a, E, R> {
    /// Race the result of a worker run through `pool`.
    pub fn on_worker_result<W, I, O, F>(
        self,
        pool: &WorkflowPool,
        worker: Arc<W>,
        input: I,
        name: impl Into<String>,
        handler: F,
    ) -> Self
    where
        W: Worker<I, O>,
        I: State,
        O: Output,
        F: FnOnce(O) -> R + Send + 'a,
    {
        self.on_result(pool.await_worker_result(worker, input, name), handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn worker_result_is_delivered() {
        let pool = WorkflowPool::default();
        let double = Arc::new(|n: u32| async move { Ok::<_, anyhow::Error>(n * 2) });

        let result = pool.await_worker_result(double, 21, "").await.unwrap();

        assert_eq!(result, 42);
        assert_eq!(pool.stats().registered, 0);
    }

    #[tokio::test]
    async fn concurrent_awaits_share_one_run() {
        let pool = WorkflowPool::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(tokio::sync::Notify::new());

        let worker = {
            let calls = calls.clone();
            let gate = gate.clone();
            Arc::new(move |n: u32| {
                calls.fetch_add(1, Ordering::SeqCst);
                let gate = gate.clone();
                async move {
                    gate.notified().await;
                    Ok::<_, anyhow::Error>(n + 1)
                }
            })
        };

        let first = pool.await_worker_result(worker.clone(), 1, "job");
        let second = pool.await_worker_result(worker, 100, "job");
        tokio::task::yield_now().await;
        gate.notify_one();

        assert_eq!(first.await.unwrap(), 2);
        assert_eq!(second.await.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn worker_failure_surfaces_as_error() {
        let pool = WorkflowPool::default();
        let broken = Arc::new(|_: u32| async move { Err::<u32, _>(anyhow::anyhow!("no luck")) });

        let err = pool.await_worker_result(broken, 1, "").await.unwrap_err();

        assert!(err.to_string().contains("no luck"));
        assert_eq!(pool.stats().registered, 0);
    }

    #[tokio::test]
    async fn abandoned_worker_reports_cancellation() {
        let pool = WorkflowPool::default();
        let forever = Arc::new(|_: u32| async move {
            std::future::pending::<()>().await;
            Ok::<u32, anyhow::Error>(0)
        });

        let pending = pool.await_worker_result(forever.clone(), 1, "slow");
        pool.abandon_worker::<_, u32, u32>(&*forever, "slow");

        assert!(pending.await.unwrap_err().is_cancelled());
        assert_eq!(pool.stats().abandoned, 1);
    }

    struct Echo;

    #[async_trait]
    impl Worker<u32, u32> for Echo {
        async fn call(&self, input: u32) -> anyhow::Result<u32> {
            tokio::task::yield_now().await;
            Ok(input)
        }
    }

    #[async_trait]
    impl Worker<String, String> for Echo {
        async fn call(&self, input: String) -> anyhow::Result<String> {
            Ok(input.to_uppercase())
        }
    }

    #[tokio::test]
    async fn one_worker_runs_under_each_of_its_signatures() {
        let pool = WorkflowPool::default();
        let echo = Arc::new(Echo);

        let number = pool.await_worker_result::<Echo, u32, u32>(echo.clone(), 1, "");
        let word = pool.await_worker_result::<Echo, String, String>(echo, "hi".to_string(), "");

        assert_eq!(word.await.unwrap(), "HI");
        assert_eq!(number.await.unwrap(), 1);
        assert_eq!(pool.stats().launched, 2);
    }
}
