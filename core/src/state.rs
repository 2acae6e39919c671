//! Marker traits for the three type parameters of a workflow.
//!
//! They bundle the bounds the runtime needs so signatures stay readable. Each
//! has a blanket impl; user types never implement them by hand.

/// A workflow state. Compared against the caller's last observed state by the pool.
pub trait State: Clone + PartialEq + Send + Sync + 'static {}

impl<T> State for T where T: Clone + PartialEq + Send + Sync + 'static {}

/// An event accepted by a workflow's channel.
pub trait Event: Clone + Send + 'static {}

impl<T> Event for T where T: Clone + Send + 'static {}

/// A workflow result. Cloned to every waiter on the completion slot.
pub trait Output: Clone + Send + Sync + 'static {}

impl<T> Output for T where T: Clone + Send + Sync + 'static {}
