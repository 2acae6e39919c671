//! # Identity: Addressing Workflows Without Holding Them
//!
//! A `WorkflowType` names a family of workflows sharing state, event and
//! result types. A `WorkflowId` picks one instance of that family by name.
//! Both are plain values; the pool uses their erased form, `WorkflowKey`, as
//! its registry key.

use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

/// Helper to extract a readable type name from a type.
pub(crate) fn type_name_of<T: ?Sized>() -> String {
    let full = type_name::<T>();
    // Strip generic arguments before taking the final path segment.
    let base = full.split('<').next().unwrap_or(full);
    base.split("::").last().unwrap_or(base).to_string()
}

/// The identity behind a `WorkflowType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKey {
    /// Minted by `WorkflowType::new`; unique for the life of the process.
    Minted(Uuid),
    /// Derived by `WorkflowType::of` from a Rust type plus the state, event and result types.
    Derived(TypeId),
}

/// Type tag for a family of workflows with state `S`, events `E` and result `O`.
///
/// A tag is equal only to itself and its clones. The `name` is descriptive and
/// never takes part in equality.
pub struct WorkflowType<S, E, O> {
    key: TypeKey,
    name: Arc<str>,
    _marker: PhantomData<fn() -> (S, E, O)>,
}

impl<S, E, O> WorkflowType<S, E, O> {
    /// Mint a fresh tag. Two calls never produce equal tags, even with the same name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            key: TypeKey::Minted(Uuid::new_v4()),
            name: Arc::from(name.into()),
            _marker: PhantomData,
        }
    }

    /// Derive a tag from the Rust type `T`. Every call for the same `T` and
    /// the same state, event and result types yields an equal tag.
    pub fn of<T: ?Sized + 'static>() -> Self
    where
        S: 'static,
        E: 'static,
        O: 'static,
    {
        Self {
            key: TypeKey::Derived(TypeId::of::<(PhantomData<T>, PhantomData<(S, E, O)>)>()),
            name: Arc::from(type_name_of::<T>()),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Build the id of the instance called `name`.
    pub fn workflow_id(&self, name: impl Into<String>) -> WorkflowId<S, E, O> {
        WorkflowId {
            workflow_type: self.clone(),
            name: name.into(),
        }
    }

    /// The id with the empty name, for types that only ever run one instance.
    pub fn default_id(&self) -> WorkflowId<S, E, O> {
        self.workflow_id("")
    }

    /// Shorthand for `self.workflow_id(name).handle(state)`.
    pub fn handle(&self, name: impl Into<String>, state: S) -> RunWorkflow<S, E, O> {
        self.workflow_id(name).handle(state)
    }
}

impl<S, E, O> Clone for WorkflowType<S, E, O> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            name: self.name.clone(),
            _marker: PhantomData,
        }
    }
}

impl<S, E, O> PartialEq for WorkflowType<S, E, O> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<S, E, O> Eq for WorkflowType<S, E, O> {}

impl<S, E, O> Hash for WorkflowType<S, E, O> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl<S, E, O> fmt::Debug for WorkflowType<S, E, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowType")
            .field("name", &self.name)
            .field("key", &self.key)
            .finish()
    }
}

impl<S, E, O> fmt::Display for WorkflowType<S, E, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Identifies one workflow instance: its type plus a disambiguating name.
pub struct WorkflowId<S, E, O> {
    pub workflow_type: WorkflowType<S, E, O>,
    pub name: String,
}

impl<S, E, O> WorkflowId<S, E, O> {
    /// Pair this id with a state, producing a handle the pool can run.
    pub fn handle(&self, state: S) -> RunWorkflow<S, E, O> {
        RunWorkflow {
            id: self.clone(),
            state,
        }
    }

    /// The type-erased registry key for this id.
    pub fn key(&self) -> WorkflowKey {
        WorkflowKey {
            type_key: self.workflow_type.key,
            type_name: self.workflow_type.name.clone(),
            name: self.name.clone(),
        }
    }
}

impl<S, E, O> Clone for WorkflowId<S, E, O> {
    fn clone(&self) -> Self {
        Self {
            workflow_type: self.workflow_type.clone(),
            name: self.name.clone(),
        }
    }
}

impl<S, E, O> PartialEq for WorkflowId<S, E, O> {
    fn eq(&self, other: &Self) -> bool {
        self.workflow_type == other.workflow_type && self.name == other.name
    }
}

impl<S, E, O> Eq for WorkflowId<S, E, O> {}

impl<S, E, O> Hash for WorkflowId<S, E, O> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.workflow_type.hash(state);
        self.name.hash(state);
    }
}

impl<S, E, O> fmt::Debug for WorkflowId<S, E, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowId")
            .field("workflow_type", &self.workflow_type)
            .field("name", &self.name)
            .finish()
    }
}

impl<S, E, O> fmt::Display for WorkflowId<S, E, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.key(), f)
    }
}

/// Type-erased `WorkflowId`, used as the pool's registry key.
#[derive(Debug, Clone)]
pub struct WorkflowKey {
    type_key: TypeKey,
    type_name: Arc<str>,
    name: String,
}

impl WorkflowKey {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for WorkflowKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_key == other.type_key && self.name == other.name
    }
}

impl Eq for WorkflowKey {}

impl Hash for WorkflowKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_key.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Display for WorkflowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            f.write_str(&self.type_name)
        } else {
            write!(f, "{}({})", self.type_name, self.name)
        }
    }
}

/// A request to run the workflow `id`, starting it at `state` if it must be launched.
///
/// `state` is ignored for launch when an instance is already running; the pool
/// then treats it as the last state this caller observed.
pub struct RunWorkflow<S, E, O> {
    pub id: WorkflowId<S, E, O>,
    pub state: S,
}

impl<S, E, O> RunWorkflow<S, E, O> {
    /// The same handle, carrying a newer state.
    pub fn with_state(&self, state: S) -> Self {
        Self {
            id: self.id.clone(),
            state,
        }
    }
}

impl<S: Clone, E, O> Clone for RunWorkflow<S, E, O> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            state: self.state.clone(),
        }
    }
}

impl<S: PartialEq, E, O> PartialEq for RunWorkflow<S, E, O> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.state == other.state
    }
}

impl<S: fmt::Debug, E, O> fmt::Debug for RunWorkflow<S, E, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunWorkflow")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker;

    #[test]
    fn minted_types_are_equal_only_to_themselves() {
        let a: WorkflowType<u32, (), ()> = WorkflowType::new("counter");
        let b: WorkflowType<u32, (), ()> = WorkflowType::new("counter");

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_ne!(a.default_id().key(), b.default_id().key());
    }

    #[test]
    fn derived_types_match_across_calls() {
        let a: WorkflowType<u32, (), ()> = WorkflowType::of::<Marker>();
        let b: WorkflowType<u32, (), ()> = WorkflowType::of::<Marker>();

        assert_eq!(a, b);
        assert_eq!(a.name(), "Marker");
    }

    #[test]
    fn derived_types_differ_by_type_parameters() {
        let numbers = WorkflowType::<u32, (), u32>::of::<Marker>().default_id().key();
        let words = WorkflowType::<String, (), String>::of::<Marker>().default_id().key();

        assert_ne!(numbers, words);
    }

    #[test]
    fn ids_compare_by_type_and_name() {
        let t: WorkflowType<u32, (), ()> = WorkflowType::new("counter");

        assert_eq!(t.workflow_id("x"), t.workflow_id("x"));
        assert_ne!(t.workflow_id("x"), t.workflow_id("y"));
        assert_eq!(t.default_id().name, "");
        assert_eq!(t.workflow_id("x").key(), t.workflow_id("x").key());
    }

    #[test]
    fn key_display_includes_name_when_present() {
        let t: WorkflowType<u32, (), ()> = WorkflowType::new("Counter");

        assert_eq!(t.default_id().to_string(), "Counter");
        assert_eq!(t.workflow_id("left").to_string(), "Counter(left)");
    }

    #[test]
    fn handle_carries_state() {
        let t: WorkflowType<u32, (), ()> = WorkflowType::new("counter");
        let handle = t.handle("x", 3);

        assert_eq!(handle.state, 3);
        assert_eq!(handle.with_state(4).state, 4);
        assert_eq!(handle.with_state(4).id, handle.id);
    }
}
