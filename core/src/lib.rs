//! Protocol-agnostic core for weft: how workflows are named, what a transition
//! step returns, and what can fail.

pub mod config;
pub mod error;
pub mod id;
pub mod reaction;
pub mod state;
pub mod telemetry;

pub use config::{ConfigError, PoolConfig};
pub use error::{WorkflowError, WorkflowResult};
pub use id::{RunWorkflow, TypeKey, WorkflowId, WorkflowKey, WorkflowType};
pub use reaction::{FinishedWorkflow, Reaction, WorkflowUpdate};
pub use state::{Event, Output, State};

pub mod prelude {
    pub use crate::config::PoolConfig;
    pub use crate::error::{WorkflowError, WorkflowResult};
    pub use crate::id::{RunWorkflow, WorkflowId, WorkflowType};
    pub use crate::reaction::{FinishedWorkflow, Reaction, WorkflowUpdate};
    pub use crate::state::{Event, Output, State};
}
