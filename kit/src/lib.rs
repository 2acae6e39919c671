//! weft facade crate.
//!
//! Re-exports the core and runtime crates with a single entry point.
//!
//! ```
//! use weft::prelude::*;
//!
//! async fn count(
//!     n: u32,
//!     events: EventChannel<&'static str>,
//!     _pool: WorkflowPool,
//! ) -> anyhow::Result<Reaction<u32, u32>> {
//!     match events.receive().await? {
//!         "stop" => Ok(Reaction::FinishWith(n)),
//!         _ => Ok(Reaction::EnterState(n + 1)),
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> anyhow::Result<()> {
//! let pool = WorkflowPool::default();
//! let counter = WorkflowType::<u32, &'static str, u32>::new("Counter");
//! pool.register(
//!     counter.clone(),
//!     |n: u32, pool: &WorkflowPool| -> anyhow::Result<Workflow<u32, &'static str, u32>> {
//!         Ok(discrete_state_workflow(n, pool, count))
//!     },
//! );
//!
//! let handle = counter.handle("clicks", 0);
//! let update = pool.workflow_update(handle.clone());
//! pool.input(&handle).send_event("click");
//! assert_eq!(update.await?.state(), Some(&1));
//!
//! let result = pool.await_workflow_result(handle.with_state(1));
//! pool.input(&handle).send_event("stop");
//! assert_eq!(result.await?, 1);
//! # Ok(())
//! # }
//! ```

pub use weft_core as core;
pub use weft_runtime as runtime;

pub use weft_core::{
    PoolConfig, Reaction, RunWorkflow, WorkflowError, WorkflowId, WorkflowResult, WorkflowType,
    WorkflowUpdate,
};
pub use weft_runtime::{EventChannel, Workflow, WorkflowPool, discrete_state_workflow};

pub mod prelude {
    pub use weft_core::prelude::*;
    pub use weft_runtime::prelude::*;
}
