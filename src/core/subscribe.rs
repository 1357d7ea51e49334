//! # Subscribe surface.
//!
//! Every subscribe call on [`Bus`] goes through a [`SubscribeBuilder`] carrying the
//! priority and limit for that one call:
//!
//! ```text
//! bus.subscribe(..)                         priority 0, unlimited
//! bus.with_priority(-1).subscribe(..)       runs before priority 0
//! bus.with_limit(3).inbox(..)               disposed after 3 deliveries
//! bus.subscribe_once(..) / bus.once(..)     limit 1
//! ```
//!
//! Validation happens at the call: a disposed bus, an empty topic list, a zero limit,
//! or a single-cardinality topic already taken in the hierarchy all fail immediately.

use std::future::Future;
use std::sync::Arc;

use crate::error::{BoxError, BusError};
use crate::handlers::{async_handler, sync_handler, HandlerFn};
use crate::registry::{queue_handler, AliveFn, Inbox, Registration, Sink, Subscription, Terms};
use crate::topics::{dedup, IntoTopics, TopicRef};

use super::bus::Bus;

/// Priority and limit for the next subscribe call.
///
/// Returned by [`Bus::with_limit`] and [`Bus::with_priority`]; each subscribe method
/// consumes the builder, so the settings never leak into later calls.
#[must_use = "a SubscribeBuilder does nothing until one of its subscribe methods is called"]
#[derive(Clone, Debug)]
pub struct SubscribeBuilder {
    bus: Bus,
    terms: Terms,
}

impl SubscribeBuilder {
    pub(crate) fn new(bus: Bus) -> Self {
        Self {
            bus,
            terms: Terms::default(),
        }
    }

    /// Disposes the subscription after `limit` deliveries. Must be greater than zero.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.terms.limit = Some(limit);
        self
    }

    /// Sets the priority; lower runs earlier, equal priorities run in subscription order.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.terms.priority = priority;
        self
    }

    /// Subscribes a synchronous handler.
    pub fn subscribe<T, R, E, F>(
        self,
        topics: impl IntoTopics<T, R>,
        handler: F,
    ) -> Result<Subscription, BusError>
    where
        T: Clone + Send + Sync + 'static,
        R: Send + 'static,
        E: Into<BoxError>,
        F: Fn(T) -> Result<R, E> + Send + Sync + 'static,
    {
        self.attach(topics.into_topics(), sync_handler(handler))
    }

    /// Subscribes a handler returning a future; its completion does not hold back the bus.
    pub fn subscribe_async<T, R, E, F, Fut>(
        self,
        topics: impl IntoTopics<T, R>,
        handler: F,
    ) -> Result<Subscription, BusError>
    where
        T: Clone + Send + Sync + 'static,
        R: Send + 'static,
        E: Into<BoxError>,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        self.attach(topics.into_topics(), async_handler(handler))
    }

    /// Like [`subscribe`](Self::subscribe), disposed after the first delivery.
    pub fn subscribe_once<T, R, E, F>(
        self,
        topics: impl IntoTopics<T, R>,
        handler: F,
    ) -> Result<Subscription, BusError>
    where
        T: Clone + Send + Sync + 'static,
        R: Send + 'static,
        E: Into<BoxError>,
        F: Fn(T) -> Result<R, E> + Send + Sync + 'static,
    {
        self.with_limit(1).subscribe(topics, handler)
    }

    /// Like [`subscribe_async`](Self::subscribe_async), disposed after the first delivery.
    pub fn subscribe_once_async<T, R, E, F, Fut>(
        self,
        topics: impl IntoTopics<T, R>,
        handler: F,
    ) -> Result<Subscription, BusError>
    where
        T: Clone + Send + Sync + 'static,
        R: Send + 'static,
        E: Into<BoxError>,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        self.with_limit(1).subscribe_async(topics, handler)
    }

    /// Creates a lazy, pull-based subscription; see [`Inbox`].
    pub fn inbox<T, R>(self, topics: impl IntoTopics<T, R>) -> Result<Inbox<T>, BusError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let topics = self.validate(topics.into_topics())?;
        self.bus.inner.check_single(&topics)?;

        let (push, queue) = queue_handler::<T>();
        let registration = Registration::new(
            Arc::downgrade(&self.bus.inner),
            topics,
            self.terms,
            Sink::Queue(push),
            None,
        );
        Ok(Inbox::new(Arc::new(registration), queue))
    }

    /// Subscribes now and resolves with the next payload.
    ///
    /// The future yields `None` if the subscription is disposed first (e.g. with its bus).
    pub fn once<T, R>(
        self,
        topics: impl IntoTopics<T, R>,
    ) -> Result<impl Future<Output = Option<T>> + Send + 'static, BusError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let inbox = self.with_limit(1).inbox(topics)?;
        inbox.start()?;
        Ok(async move { inbox.recv().await })
    }

    fn validate(&self, topics: Vec<TopicRef>) -> Result<Vec<TopicRef>, BusError> {
        self.bus.inner.ensure_active()?;
        if let Some(0) = self.terms.limit {
            return Err(BusError::InvalidLimit { limit: 0 });
        }
        let topics = dedup(topics);
        if topics.is_empty() {
            return Err(BusError::EmptyTopics);
        }
        Ok(topics)
    }

    fn attach(self, topics: Vec<TopicRef>, handler: HandlerFn) -> Result<Subscription, BusError> {
        self.attach_with(topics, handler, None)
    }

    /// Registers a callback registration; `alive` is the optional weak-lifetime hook.
    pub(crate) fn attach_with(
        self,
        topics: Vec<TopicRef>,
        handler: HandlerFn,
        alive: Option<AliveFn>,
    ) -> Result<Subscription, BusError> {
        let topics = self.validate(topics)?;
        let registration = Arc::new(Registration::new(
            Arc::downgrade(&self.bus.inner),
            topics,
            self.terms,
            Sink::Handler(handler),
            alive,
        ));
        self.bus.inner.activate(&registration)?;
        tracing::debug!(
            bus = self.bus.inner.id,
            registration = registration.id(),
            priority = self.terms.priority,
            limit = ?self.terms.limit,
            "subscribed"
        );
        Ok(Subscription::new(registration))
    }
}

impl Bus {
    fn subscriber(&self) -> SubscribeBuilder {
        SubscribeBuilder::new(self.clone())
    }

    /// Starts a subscribe call with a message limit (must be greater than zero).
    pub fn with_limit(&self, limit: usize) -> SubscribeBuilder {
        self.subscriber().with_limit(limit)
    }

    /// Starts a subscribe call with a priority (lower runs earlier).
    pub fn with_priority(&self, priority: i32) -> SubscribeBuilder {
        self.subscriber().with_priority(priority)
    }

    /// Subscribes a synchronous handler to one or more topics.
    ///
    /// The returned handle does not unsubscribe on drop.
    pub fn subscribe<T, R, E, F>(
        &self,
        topics: impl IntoTopics<T, R>,
        handler: F,
    ) -> Result<Subscription, BusError>
    where
        T: Clone + Send + Sync + 'static,
        R: Send + 'static,
        E: Into<BoxError>,
        F: Fn(T) -> Result<R, E> + Send + Sync + 'static,
    {
        self.subscriber().subscribe(topics, handler)
    }

    /// Subscribes a handler returning a future.
    pub fn subscribe_async<T, R, E, F, Fut>(
        &self,
        topics: impl IntoTopics<T, R>,
        handler: F,
    ) -> Result<Subscription, BusError>
    where
        T: Clone + Send + Sync + 'static,
        R: Send + 'static,
        E: Into<BoxError>,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        self.subscriber().subscribe_async(topics, handler)
    }

    /// Subscribes a synchronous handler for a single delivery.
    pub fn subscribe_once<T, R, E, F>(
        &self,
        topics: impl IntoTopics<T, R>,
        handler: F,
    ) -> Result<Subscription, BusError>
    where
        T: Clone + Send + Sync + 'static,
        R: Send + 'static,
        E: Into<BoxError>,
        F: Fn(T) -> Result<R, E> + Send + Sync + 'static,
    {
        self.subscriber().subscribe_once(topics, handler)
    }

    /// Subscribes an async handler for a single delivery.
    pub fn subscribe_once_async<T, R, E, F, Fut>(
        &self,
        topics: impl IntoTopics<T, R>,
        handler: F,
    ) -> Result<Subscription, BusError>
    where
        T: Clone + Send + Sync + 'static,
        R: Send + 'static,
        E: Into<BoxError>,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        self.subscriber().subscribe_once_async(topics, handler)
    }

    /// Creates a lazy, pull-based subscription.
    pub fn inbox<T, R>(&self, topics: impl IntoTopics<T, R>) -> Result<Inbox<T>, BusError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.subscriber().inbox(topics)
    }

    /// Subscribes now and resolves with the next payload.
    pub fn once<T, R>(
        &self,
        topics: impl IntoTopics<T, R>,
    ) -> Result<impl Future<Output = Option<T>> + Send + 'static, BusError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.subscriber().once(topics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ChildOptions;
    use crate::topics::{Single, Topic, TopicSet};
    use futures::StreamExt;
    use parking_lot::Mutex;

    type Res = Result<(), BoxError>;

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl Fn(u32) -> Res + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        (seen, move |n: u32| {
            s.lock().push(n);
            Ok(())
        })
    }

    async fn until_registered(bus: &Bus) {
        while bus.registrations() == 0 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_validation_errors() {
        let bus = Bus::new();
        let topic: Topic<u32> = Topic::new("t");
        let none: [Topic<u32>; 0] = [];

        assert_eq!(
            bus.with_limit(0).subscribe(&topic, |_: u32| -> Res { Ok(()) }).unwrap_err(),
            BusError::InvalidLimit { limit: 0 }
        );
        assert_eq!(
            bus.with_limit(0).inbox(&topic).unwrap_err(),
            BusError::InvalidLimit { limit: 0 }
        );
        assert_eq!(
            bus.subscribe(&none, |_: u32| -> Res { Ok(()) }).unwrap_err(),
            BusError::EmptyTopics
        );
        assert_eq!(bus.registrations(), 0);
    }

    #[tokio::test]
    async fn test_limit_disposes_after_budget() {
        let bus = Bus::new();
        let topic: Topic<u32> = Topic::new("t");
        let (seen, handler) = recorder();
        let sub = bus.with_limit(2).subscribe(&topic, handler).unwrap();
        assert_eq!(sub.remaining(), Some(2));

        for n in 1..=4 {
            bus.publish(&topic, n).unwrap();
        }
        bus.flush().await;

        assert_eq!(*seen.lock(), vec![1, 2]);
        assert!(sub.is_disposed());
        assert_eq!(bus.subscriber_count(&topic), 0);
    }

    #[tokio::test]
    async fn test_subscribe_once_and_builder_scope() {
        let bus = Bus::new();
        let topic: Topic<u32> = Topic::new("t");
        let (once_seen, once) = recorder();
        let (all_seen, all) = recorder();
        let first = bus.subscribe_once(&topic, once).unwrap();
        let second = bus.subscribe(&topic, all).unwrap();
        assert_eq!(second.remaining(), None);

        bus.publish(&topic, 1).unwrap();
        bus.publish(&topic, 2).unwrap();
        bus.flush().await;

        assert_eq!(*once_seen.lock(), vec![1]);
        assert_eq!(*all_seen.lock(), vec![1, 2]);
        assert!(first.is_disposed());
        assert!(!second.is_disposed());
    }

    #[tokio::test]
    async fn test_multi_topic_subscription() {
        let bus = Bus::new();
        let a: Topic<u32> = Topic::new("a");
        let b: Topic<u32> = Topic::new("b");
        let (seen, handler) = recorder();
        let sub = bus.subscribe(&[a.clone(), b.clone(), a.clone()], handler).unwrap();
        assert_eq!(bus.subscriber_count(&a), 1);
        assert_eq!(bus.subscriber_count(&b), 1);

        bus.publish(&a, 1).unwrap();
        bus.publish(&b, 2).unwrap();
        bus.flush().await;
        assert_eq!(*seen.lock(), vec![1, 2]);

        sub.dispose();
        assert_eq!(bus.registrations(), 0);
        bus.publish(&a, 3).unwrap();
        bus.flush().await;
        assert_eq!(*seen.lock(), vec![1, 2]);
    }

    #[test]
    fn test_topic_set_checks_single_members() {
        let bus = Bus::new();
        let many: Topic<u32> = Topic::new("many");
        let one: Topic<u32, (), Single> = Topic::new("one");
        let _taken = bus.subscribe(&one, |_: u32| -> Res { Ok(()) }).unwrap();

        let set = TopicSet::new().with(&many).with(&one);
        assert!(matches!(
            bus.subscribe(set, |_: u32| -> Res { Ok(()) }),
            Err(BusError::SingleSubscriber { .. })
        ));
        assert_eq!(bus.subscriber_count(&many), 0);
    }

    #[tokio::test]
    async fn test_inbox_is_lazy_and_honours_limit() {
        let bus = Bus::new();
        let topic: Topic<u32> = Topic::new("t");
        let inbox = bus.with_limit(3).inbox(&topic).unwrap();
        assert_eq!(bus.registrations(), 0);

        bus.publish(&topic, 0).unwrap();
        bus.flush().await;
        assert_eq!(inbox.backlog(), 0);

        let consumer = tokio::spawn(async move {
            let mut got = Vec::new();
            while let Some(n) = inbox.recv().await {
                got.push(n);
            }
            got
        });
        until_registered(&bus).await;
        for n in 1..=5 {
            bus.publish(&topic, n).unwrap();
        }

        assert_eq!(consumer.await.unwrap(), vec![1, 2, 3]);
        assert_eq!(bus.registrations(), 0);
    }

    #[tokio::test]
    async fn test_inbox_backlog_is_drained_first() {
        let bus = Bus::new();
        let topic: Topic<u32> = Topic::new("t");
        let inbox = Arc::new(bus.inbox(&topic).unwrap());

        let i = Arc::clone(&inbox);
        let first = tokio::spawn(async move { i.recv().await });
        until_registered(&bus).await;
        bus.publish(&topic, 1).unwrap();
        bus.publish(&topic, 2).unwrap();
        bus.publish(&topic, 3).unwrap();
        bus.flush().await;

        assert_eq!(first.await.unwrap(), Some(1));
        assert_eq!(inbox.backlog(), 2);
        assert_eq!(inbox.recv().await, Some(2));
        assert_eq!(inbox.recv().await, Some(3));
    }

    #[tokio::test]
    async fn test_inbox_dispose_wakes_waiters() {
        let bus = Bus::new();
        let topic: Topic<u32> = Topic::new("t");
        let inbox = Arc::new(bus.inbox(&topic).unwrap());

        let i = Arc::clone(&inbox);
        let waiter = tokio::spawn(async move { i.recv().await });
        until_registered(&bus).await;

        inbox.dispose();
        assert_eq!(waiter.await.unwrap(), None);
        assert_eq!(bus.registrations(), 0);
        assert_eq!(inbox.recv().await, None);
    }

    #[tokio::test]
    async fn test_second_inbox_on_single_topic_fails_on_first_pull() {
        let root = Bus::new();
        let child = root.create_child(ChildOptions::default()).unwrap();
        let quote: Topic<u32, (), Single> = Topic::new("quote");

        // Both are valid while neither is registered.
        let first = Arc::new(root.inbox(&quote).unwrap());
        let second = child.inbox(&quote).unwrap();

        let f = Arc::clone(&first);
        let taken = tokio::spawn(async move { f.try_recv().await });
        until_registered(&root).await;

        assert!(matches!(
            second.try_recv().await,
            Err(BusError::SingleSubscriber { .. })
        ));
        assert!(second.is_disposed());
        assert_eq!(second.try_recv().await, Ok(None));
        assert_eq!(second.recv().await, None);

        root.publish(&quote, 7).unwrap();
        assert_eq!(taken.await.unwrap(), Ok(Some(7)));
    }

    #[tokio::test]
    async fn test_bus_dispose_ends_inbox() {
        let bus = Bus::new();
        let topic: Topic<u32> = Topic::new("t");
        let inbox = Arc::new(bus.inbox(&topic).unwrap());

        let i = Arc::clone(&inbox);
        let waiter = tokio::spawn(async move { i.recv().await });
        until_registered(&bus).await;

        bus.dispose();
        assert_eq!(waiter.await.unwrap(), None);
        assert!(inbox.is_disposed());
    }

    #[tokio::test]
    async fn test_once_registers_eagerly() {
        let bus = Bus::new();
        let topic: Topic<u32> = Topic::new("t");
        let next = bus.once(&topic).unwrap();
        assert_eq!(bus.subscriber_count(&topic), 1);

        bus.publish(&topic, 7).unwrap();
        bus.publish(&topic, 8).unwrap();
        assert_eq!(next.await, Some(7));
        assert_eq!(bus.subscriber_count(&topic), 0);
    }

    #[tokio::test]
    async fn test_inbox_stream() {
        let bus = Bus::new();
        let topic: Topic<u32> = Topic::new("t");
        let stream = bus.with_limit(2).inbox(&topic).unwrap().into_stream();
        let consumer = tokio::spawn(stream.collect::<Vec<_>>());
        until_registered(&bus).await;

        for n in 1..=3 {
            bus.publish(&topic, n).unwrap();
        }
        assert_eq!(consumer.await.unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_dropped_inbox_unsubscribes() {
        let bus = Bus::new();
        let topic: Topic<u32> = Topic::new("t");
        let inbox = bus.inbox(&topic).unwrap();
        let next = bus.once(&topic).unwrap();
        assert_eq!(bus.registrations(), 1);

        drop(inbox);
        drop(next);
        assert_eq!(bus.registrations(), 0);
    }
}
