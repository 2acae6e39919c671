//! Event sinks.
//!
//! Renderers and parent workflows talk to a workflow through a
//! `WorkflowInput` without caring whether it is a live channel, a pool
//! lookup, or an adapter around one of those.

use crate::channel::EventChannel;
use std::marker::PhantomData;
use std::sync::Arc;
use weft_core::Event;

/// Fire-and-forget sink for events of type `E`.
pub trait WorkflowInput<E>: Send + Sync {
    fn send_event(&self, event: E);

    /// A sink for `E2` that maps every event through `map` before forwarding it here.
    fn adapt_events<E2, F>(self, map: F) -> AdaptedInput<Self, F, E>
    where
        Self: Sized,
        F: Fn(E2) -> E + Send + Sync,
    {
        AdaptedInput {
            inner: self,
            map,
            _event: PhantomData,
        }
    }
}

impl<E: Event> WorkflowInput<E> for EventChannel<E> {
    fn send_event(&self, event: E) {
        EventChannel::send_event(self, event);
    }
}

impl<E, T: WorkflowInput<E> + ?Sized> WorkflowInput<E> for Arc<T> {
    fn send_event(&self, event: E) {
        (**self).send_event(event);
    }
}

/// Sink that accepts and drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledInput;

impl<E> WorkflowInput<E> for DisabledInput {
    fn send_event(&self, _event: E) {}
}

/// Produced by `WorkflowInput::adapt_events`.
pub struct AdaptedInput<I, F, E> {
    inner: I,
    map: F,
    _event: PhantomData<fn(E)>,
}

impl<I, F, E, E2> WorkflowInput<E2> for AdaptedInput<I, F, E>
where
    I: WorkflowInput<E>,
    F: Fn(E2) -> E + Send + Sync,
{
    fn send_event(&self, event: E2) {
        self.inner.send_event((self.map)(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn adapted_input_maps_before_forwarding() {
        let channel: EventChannel<String> = EventChannel::new();
        let input = channel.clone().adapt_events(|n: u32| format!("#{n}"));

        input.send_event(4);

        assert_eq!(channel.receive().await.unwrap(), "#4");
    }

    #[test]
    fn disabled_input_swallows_events() {
        let input: Arc<dyn WorkflowInput<u32>> = Arc::new(DisabledInput);
        input.send_event(1);
    }
}
