//! # EventChannel: A Workflow's Inbox
//!
//! Each running workflow owns one `EventChannel`. Producers call
//! `send_event` and never block; the workflow's driver is the single consumer
//! and takes events one at a time through `receive` or a `Select`.
//!
//! The channel holds at most one pending event. A newer send supersedes an
//! unconsumed older one, so a slow consumer sees the latest event rather than
//! a backlog. The driver discards whatever is still pending when a step ends,
//! so an event is never carried from one transition step into the next. Once
//! closed, sends are dropped and a pending receive fails with
//! `WorkflowError::Cancelled`.

use futures_util::future::{BoxFuture, select_all};
use parking_lot::Mutex;
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use tokio::sync::Notify;
use weft_core::{Event, WorkflowError, WorkflowResult};

struct Slot<E> {
    pending: Option<E>,
    closed: bool,
}

struct Shared<E> {
    slot: Mutex<Slot<E>>,
    notify: Notify,
}

/// Single-consumer, latest-wins event inbox.
pub struct EventChannel<E> {
    shared: Arc<Shared<E>>,
}

impl<E> Clone for EventChannel<E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<E: Event> Default for EventChannel<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> EventChannel<E> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    pending: None,
                    closed: false,
                }),
                notify: Notify::new(),
            }),
        }
    }

    /// Offer an event to the consumer. Never blocks; dropped if the channel is closed.
    pub fn send_event(&self, event: E) {
        {
            let mut slot = self.shared.slot.lock();
            if slot.closed {
                tracing::debug!("event sent to closed channel; dropped");
                return;
            }
            if slot.pending.replace(event).is_some() {
                tracing::debug!("unconsumed event superseded by a newer one");
            }
        }
        self.shared.notify.notify_one();
    }

    /// Wait for the next event.
    ///
    /// Fails with `WorkflowError::Cancelled` once the channel is closed.
    pub async fn receive(&self) -> WorkflowResult<E> {
        loop {
            let notified = self.shared.notify.notified();
            {
                let mut slot = self.shared.slot.lock();
                if slot.closed {
                    return Err(WorkflowError::Cancelled);
                }
                if let Some(event) = slot.pending.take() {
                    return Ok(event);
                }
            }
            notified.await;
        }
    }

    /// Drop the pending event, if any. Called by the driver between steps.
    pub(crate) fn discard_pending(&self) {
        if self.shared.slot.lock().pending.take().is_some() {
            tracing::debug!("event left unconsumed by the finished step; dropped");
        }
    }

    /// Close the channel, dropping any pending event and failing a pending receive.
    pub fn close(&self) {
        {
            let mut slot = self.shared.slot.lock();
            if slot.closed {
                return;
            }
            slot.closed = true;
            slot.pending = None;
        }
        self.shared.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.slot.lock().closed
    }

    /// Start building a select over this channel's events and other sources.
    pub fn select<'a, R: Send + 'a>(&'a self) -> Select<'a, E, R> {
        Select {
            channel: self,
            event_handlers: Vec::new(),
            event_position: None,
            branches: Vec::new(),
        }
    }
}

type EventHandler<'a, E, R> = Box<dyn FnMut(E) -> Option<R> + Send + 'a>;

/// Waits on several sources and runs the handler of whichever is ready first.
///
/// Sources are raced in registration order; all `on_event` handlers share the
/// slot of the first one. Only the winning handler runs, and losing sources
/// are dropped without consuming anything.
///
/// ```rust,ignore
/// let reaction = events
///     .select()
///     .on_event(|event| match event {
///         Command::Stop => Some(Reaction::FinishWith(count)),
///         _ => None,
///     })
///     .on_workflow_update(&pool, child, |update| match update {
///         WorkflowUpdate::Running(child) => Reaction::EnterState(Waiting { child }),
///         WorkflowUpdate::Finished(done) => Reaction::FinishWith(done.result),
///     })
///     .await?;
/// ```
pub struct Select<'a, E, R> {
    channel: &'a EventChannel<E>,
    event_handlers: Vec<EventHandler<'a, E, R>>,
    event_position: Option<usize>,
    branches: Vec<BoxFuture<'a, WorkflowResult<R>>>,
}

impl<'a, E: Event, R: Send + 'a> Select<'a, E, R> {
    /// Handle an incoming event. Return `None` to pass it on to the next `on_event`
    /// handler; an event no handler accepts is discarded and waiting continues.
    pub fn on_event<F>(mut self, handler: F) -> Self
    where
        F: FnMut(E) -> Option<R> + Send + 'a,
    {
        if self.event_position.is_none() {
            self.event_position = Some(self.branches.len());
        }
        self.event_handlers.push(Box::new(handler));
        self
    }

    /// Race an arbitrary future, mapping its output through `handler`.
    pub fn on_future<T, Fut, F>(mut self, future: Fut, handler: F) -> Self
    where
        Fut: Future<Output = T> + Send + 'a,
        F: FnOnce(T) -> R + Send + 'a,
    {
        self.branches
            .push(Box::pin(async move { Ok(handler(future.await)) }));
        self
    }

    /// Race a fallible future. Its error, if it wins, becomes the select's error.
    pub fn on_result<T, Fut, F>(mut self, future: Fut, handler: F) -> Self
    where
        Fut: Future<Output = WorkflowResult<T>> + Send + 'a,
        F: FnOnce(T) -> R + Send + 'a,
    {
        self.branches
            .push(Box::pin(async move { future.await.map(handler) }));
        self
    }

    /// Suspend until one source is ready and return its handler's value.
    pub async fn wait(self) -> WorkflowResult<R> {
        let Select {
            channel,
            mut event_handlers,
            event_position,
            mut branches,
        } = self;

        if let Some(position) = event_position {
            let events: BoxFuture<'a, WorkflowResult<R>> = Box::pin(async move {
                loop {
                    let event = channel.receive().await?;
                    match dispatch(&mut event_handlers, event) {
                        Some(value) => return Ok(value),
                        None => tracing::debug!("event matched no handler; dropped"),
                    }
                }
            });
            branches.insert(position, events);
        }

        if branches.is_empty() {
            return Err(WorkflowError::NothingToSelect);
        }

        let (result, _index, _losers) = select_all(branches).await;
        result
    }
}

impl<'a, E: Event, R: Send + 'a> IntoFuture for Select<'a, E, R> {
    type Output = WorkflowResult<R>;
    type IntoFuture = BoxFuture<'a, WorkflowResult<R>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}

fn dispatch<E: Clone, R>(handlers: &mut [EventHandler<'_, E, R>], event: E) -> Option<R> {
    let (last, rest) = handlers.split_last_mut()?;
    for handler in rest {
        if let Some(value) = handler(event.clone()) {
            return Some(value);
        }
    }
    last(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn delivers_a_pending_event() {
        let channel = EventChannel::new();
        channel.send_event("able");

        assert_eq!(channel.receive().await.unwrap(), "able");
    }

    #[tokio::test]
    async fn newer_event_supersedes_unconsumed_one() {
        let channel = EventChannel::new();
        channel.send_event(1);
        channel.send_event(2);

        assert_eq!(channel.receive().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn close_fails_pending_receive_and_drops_later_sends() {
        let channel: EventChannel<u32> = EventChannel::new();
        let waiter = {
            let channel = channel.clone();
            tokio::spawn(async move { channel.receive().await })
        };
        tokio::task::yield_now().await;

        channel.close();
        channel.send_event(7);

        assert!(waiter.await.unwrap().unwrap_err().is_cancelled());
        assert!(channel.is_closed());
        assert!(channel.receive().await.is_err());
    }

    #[tokio::test]
    async fn select_runs_the_first_matching_handler() {
        let channel = EventChannel::new();
        channel.send_event("stop");

        let result = channel
            .select()
            .on_event(|e| (e == "go").then_some("went"))
            .on_event(|e| (e == "stop").then_some("stopped"))
            .await
            .unwrap();

        assert_eq!(result, "stopped");
    }

    #[tokio::test]
    async fn select_discards_unmatched_events() {
        let channel = EventChannel::new();
        let sender = channel.clone();
        tokio::spawn(async move {
            sender.send_event(1);
            tokio::task::yield_now().await;
            tokio::task::yield_now().await;
            sender.send_event(2);
        });

        let result = channel
            .select()
            .on_event(|e: i32| (e == 2).then_some(e * 10))
            .await
            .unwrap();

        assert_eq!(result, 20);
    }

    #[tokio::test]
    async fn select_leaves_event_alone_when_another_source_wins() {
        let channel: EventChannel<&str> = EventChannel::new();

        let result = channel
            .select()
            .on_event(|_| Some("event"))
            .on_future(std::future::ready(()), |_| "future")
            .await
            .unwrap();
        assert_eq!(result, "future");

        channel.send_event("late");
        assert_eq!(channel.receive().await.unwrap(), "late");
    }

    #[tokio::test(start_paused = true)]
    async fn select_prefers_registration_order_on_ties() {
        let channel = EventChannel::new();
        channel.send_event(());

        let result = channel
            .select()
            .on_event(|_| Some(1))
            .on_future(std::future::ready(()), |_| 2)
            .await
            .unwrap();

        assert_eq!(result, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn select_propagates_result_errors() {
        let channel: EventChannel<()> = EventChannel::new();

        let err = channel
            .select()
            .on_event(|_| Some(()))
            .on_result(
                async {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Err::<(), _>(WorkflowError::Cancelled)
                },
                |_| (),
            )
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn empty_select_is_an_error() {
        let channel: EventChannel<()> = EventChannel::new();
        let err = channel.select::<()>().await.unwrap_err();

        assert!(matches!(err, WorkflowError::NothingToSelect));
    }
}
