//! Async execution engine for weft: event channels, the driver loop and the
//! workflow pool.

pub mod channel;
pub mod delegate;
pub mod driver;
pub mod input;
pub mod pool;
pub mod worker;
pub mod workflow;

pub use weft_core;

pub mod prelude {
    pub use crate::channel::{EventChannel, Select};
    pub use crate::delegate::Delegating;
    pub use crate::driver::{Transition, discrete_state_workflow};
    pub use crate::input::{DisabledInput, WorkflowInput};
    pub use crate::pool::{Launcher, WorkflowPool};
    pub use crate::worker::Worker;
    pub use crate::workflow::{StateStream, Workflow};
}

pub use channel::{EventChannel, Select};
pub use delegate::Delegating;
pub use driver::{Transition, discrete_state_workflow};
pub use input::{AdaptedInput, DisabledInput, WorkflowInput};
pub use pool::{Launcher, PoolInput, PoolSnapshot, PoolStats, WorkflowPool, WorkflowSnapshot};
pub use worker::{Worker, worker_type};
pub use workflow::{StateStream, Workflow};
