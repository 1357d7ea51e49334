//! # Binder: subscribe an object's handlers from a descriptor table.
//!
//! A type lists what it handles as [`Descriptor`]s (topic, argument slot, optional
//! priority and limit) and dispatches by argument slot in [`Bindable::invoke`].
//! Binding registers one subscription per descriptor and returns a single [`Binding`].
//!
//! ## Lifetime
//! ```text
//! bus.bind(&Arc<T>)
//!   ├─ holds only Weak<T>
//!   ├─ Binding dropped       ──► every subscription disposed
//!   └─ Binding::detach()     ──► subscriptions stay until T is dropped,
//!                               then each disposes itself on its next delivery
//! ```
//!
//! ## Example
//! ```rust
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use canopy::{Bindable, Bus, Descriptor, Message, Reply, Topic};
//!
//! struct Meter {
//!     total: AtomicU32,
//!     add: Topic<u32>,
//!     reset: Topic<()>,
//! }
//!
//! impl Bindable for Meter {
//!     fn descriptors(&self) -> Vec<Descriptor> {
//!         vec![Descriptor::new(&self.add, 0), Descriptor::new(&self.reset, 1)]
//!     }
//!
//!     fn invoke(&self, argument: usize, message: &Message<'_>) -> Reply {
//!         match (argument, message.payload::<u32>()) {
//!             (0, Some(n)) => { self.total.fetch_add(*n, Ordering::SeqCst); }
//!             _ => self.total.store(0, Ordering::SeqCst),
//!         }
//!         Reply::value(())
//!     }
//! }
//!
//! let bus = Bus::new();
//! let meter = Arc::new(Meter { total: AtomicU32::new(0), add: Topic::new("add"), reset: Topic::new("reset") });
//! let binding = bus.bind(&meter)?;
//!
//! bus.publish(&meter.add, 5)?;
//! bus.publish(&meter.add, 2)?;
//! bus.flush().await;
//! assert_eq!(meter.total.load(Ordering::SeqCst), 7);
//!
//! drop(binding);
//! assert_eq!(bus.subscriber_count(&meter.add), 0);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use crate::core::{Bus, SubscribeBuilder};
use crate::error::BusError;
use crate::handlers::{HandlerFn, Reply};
use crate::message::Message;
use crate::registry::{AliveFn, Subscription};
use crate::topics::{Topic, TopicRef};

/// One handled topic of a bindable type.
#[derive(Clone, Debug)]
pub struct Descriptor {
    topic: TopicRef,
    argument: usize,
    priority: i32,
    limit: Option<usize>,
}

impl Descriptor {
    /// Handles `topic` through argument slot `argument`.
    pub fn new<T, R, C>(topic: &Topic<T, R, C>, argument: usize) -> Self {
        Self {
            topic: topic.to_ref(),
            argument,
            priority: 0,
            limit: None,
        }
    }

    /// Sets the subscription priority (lower runs earlier).
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets a message limit (must be greater than zero).
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Topic handled by this descriptor.
    pub fn topic(&self) -> &TopicRef {
        &self.topic
    }

    /// Argument slot passed to [`Bindable::invoke`].
    pub fn argument(&self) -> usize {
        self.argument
    }
}

/// A type that lists its own handlers.
pub trait Bindable: Send + Sync + 'static {
    /// Topics handled by this instance.
    fn descriptors(&self) -> Vec<Descriptor>;

    /// Handles one message delivered through the descriptor with slot `argument`.
    fn invoke(&self, argument: usize, message: &Message<'_>) -> Reply;
}

/// All subscriptions made by one bind call.
///
/// Disposes them on drop unless [`detach`](Binding::detach)ed.
#[must_use = "dropping a Binding disposes its subscriptions"]
pub struct Binding {
    subscriptions: Vec<Subscription>,
    armed: bool,
}

impl Binding {
    /// Disposes every subscription of the binding. Idempotent.
    pub fn dispose(&self) {
        for subscription in &self.subscriptions {
            subscription.dispose();
        }
    }

    /// True once every subscription is disposed.
    pub fn is_disposed(&self) -> bool {
        self.subscriptions.iter().all(Subscription::is_disposed)
    }

    /// Subscriptions in descriptor order.
    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    /// Gives up the handle without disposing; cleanup is left to the owner's lifetime.
    pub fn detach(mut self) {
        self.armed = false;
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        if self.armed {
            self.dispose();
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("subscriptions", &self.subscriptions.len())
            .field("armed", &self.armed)
            .finish()
    }
}

impl Bus {
    /// Subscribes one handler per descriptor, all calling `invoke` with their slot.
    ///
    /// If any descriptor fails, the subscriptions already made are disposed and the
    /// error is returned.
    pub fn bind_with<F>(&self, descriptors: Vec<Descriptor>, invoke: F) -> Result<Binding, BusError>
    where
        F: Fn(usize, &Message<'_>) -> Reply + Send + Sync + 'static,
    {
        let invoke = Arc::new(invoke);
        self.bind_each(descriptors, |argument| {
            let invoke = Arc::clone(&invoke);
            let handler: HandlerFn = Arc::new(move |message: &Message<'_>| invoke(argument, message));
            (handler, None)
        })
    }

    /// Binds `target` through its own descriptor table, holding it weakly.
    ///
    /// Once `target` is dropped, each subscription disposes itself on its next delivery.
    pub fn bind<B: Bindable>(&self, target: &Arc<B>) -> Result<Binding, BusError> {
        let weak = Arc::downgrade(target);
        self.bind_each(target.descriptors(), |argument| {
            let w = weak.clone();
            let handler: HandlerFn = Arc::new(move |message: &Message<'_>| match w.upgrade() {
                Some(target) => target.invoke(argument, message),
                None => Reply::value(()),
            });
            let w = weak.clone();
            let alive: AliveFn = Box::new(move || w.strong_count() > 0);
            (handler, Some(alive))
        })
    }

    fn bind_each(
        &self,
        descriptors: Vec<Descriptor>,
        mut make: impl FnMut(usize) -> (HandlerFn, Option<AliveFn>),
    ) -> Result<Binding, BusError> {
        let mut binding = Binding {
            subscriptions: Vec::with_capacity(descriptors.len()),
            armed: true,
        };
        for descriptor in descriptors {
            let mut builder = SubscribeBuilder::new(self.clone()).with_priority(descriptor.priority);
            if let Some(limit) = descriptor.limit {
                builder = builder.with_limit(limit);
            }
            let (handler, alive) = make(descriptor.argument);
            // On error `binding` drops here and rolls back what was made so far.
            let subscription = builder.attach_with(vec![descriptor.topic], handler, alive)?;
            binding.subscriptions.push(subscription);
        }
        tracing::debug!(bus = self.id(), subscriptions = binding.subscriptions.len(), "bound");
        Ok(binding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topics::Single;
    use parking_lot::Mutex;

    struct Recorder {
        seen: Mutex<Vec<(usize, u32)>>,
        a: Topic<u32>,
        b: Topic<u32>,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                a: Topic::new("a"),
                b: Topic::new("b"),
            })
        }
    }

    impl Bindable for Recorder {
        fn descriptors(&self) -> Vec<Descriptor> {
            vec![
                Descriptor::new(&self.a, 0),
                Descriptor::new(&self.b, 1).with_limit(1),
            ]
        }

        fn invoke(&self, argument: usize, message: &Message<'_>) -> Reply {
            if let Some(n) = message.payload::<u32>() {
                self.seen.lock().push((argument, *n));
            }
            Reply::value(())
        }
    }

    #[tokio::test]
    async fn test_bind_routes_by_argument_and_honours_limits() {
        let bus = Bus::new();
        let target = Recorder::new();
        let binding = bus.bind(&target).unwrap();
        assert_eq!(binding.subscriptions().len(), 2);

        bus.publish(&target.a, 1).unwrap();
        bus.publish(&target.b, 2).unwrap();
        bus.publish(&target.b, 3).unwrap();
        bus.flush().await;

        assert_eq!(*target.seen.lock(), vec![(0, 1), (1, 2)]);
        assert!(binding.subscriptions()[1].is_disposed());
    }

    #[tokio::test]
    async fn test_detached_binding_ends_with_its_owner() {
        let bus = Bus::new();
        let target = Recorder::new();
        let a = target.a.clone();
        bus.bind(&target).unwrap().detach();
        assert_eq!(bus.subscriber_count(&a), 1);

        drop(target);
        bus.publish(&a, 1).unwrap();
        bus.flush().await;
        assert_eq!(bus.subscriber_count(&a), 0);
    }

    struct Quoter {
        quote: Topic<u32, u32, Single>,
    }

    impl Bindable for Quoter {
        fn descriptors(&self) -> Vec<Descriptor> {
            vec![Descriptor::new(&self.quote, 0)]
        }

        fn invoke(&self, _: usize, _: &Message<'_>) -> Reply {
            Reply::value(1u32)
        }
    }

    #[test]
    fn test_dropped_owner_frees_single_topic() {
        let root = Bus::new();
        let child = root.create_child(crate::ChildOptions::default()).unwrap();
        let owner = Arc::new(Quoter {
            quote: Topic::new("quote"),
        });
        let quote = owner.quote.clone();
        child.bind(&owner).unwrap().detach();
        assert!(matches!(
            root.subscribe(&quote, |n: u32| Ok::<_, BusError>(n)),
            Err(BusError::SingleSubscriber { .. })
        ));

        drop(owner);
        let _sub = root.subscribe(&quote, |n: u32| Ok::<_, BusError>(n * 2)).unwrap();
        assert_eq!(child.registrations(), 0);
    }

    #[tokio::test]
    async fn test_dropped_owner_is_not_counted_or_delivered() {
        let counts = Arc::new(Mutex::new(Vec::new()));
        let c = counts.clone();
        let bus = Bus::builder()
            .listener(crate::ListenerFn::arc("count", move |_, subscribers| {
                c.lock().push(subscribers);
                Ok::<_, BusError>(())
            }))
            .build();
        let target = Recorder::new();
        let a = target.a.clone();
        let _live = bus.subscribe(&a, |_: u32| Ok::<_, BusError>(())).unwrap();
        bus.bind(&target).unwrap().detach();
        assert_eq!(bus.registrations(), 3);

        drop(target);
        let results = bus.publish_await(&a, 1).unwrap().await.unwrap();
        assert_eq!(results, vec![()]);
        assert_eq!(*counts.lock(), vec![1]);
        assert_eq!(bus.subscriber_count(&a), 1);
    }

    #[tokio::test]
    async fn test_dropping_binding_disposes() {
        let bus = Bus::new();
        let target = Recorder::new();
        let binding = bus.bind(&target).unwrap();
        drop(binding);
        assert_eq!(bus.subscriber_count(&target.a), 0);
        assert_eq!(bus.subscriber_count(&target.b), 0);
    }

    #[test]
    fn test_failed_descriptor_rolls_back() {
        let bus = Bus::new();
        let ok: Topic<u32> = Topic::new("ok");
        let single: Topic<u32, (), Single> = Topic::new("single");
        let _taken = bus.subscribe(&single, |_: u32| Ok::<_, BusError>(())).unwrap();

        let err = bus
            .bind_with(
                vec![Descriptor::new(&ok, 0), Descriptor::new(&single, 1)],
                |_, _| Reply::value(()),
            )
            .unwrap_err();
        assert!(matches!(err, BusError::SingleSubscriber { .. }));
        assert_eq!(bus.subscriber_count(&ok), 0);
    }

    #[test]
    fn test_zero_limit_descriptor_is_rejected() {
        let bus = Bus::new();
        let t: Topic<u32> = Topic::new("t");
        let err = bus
            .bind_with(vec![Descriptor::new(&t, 0).with_limit(0)], |_, _| Reply::value(()))
            .unwrap_err();
        assert_eq!(err, BusError::InvalidLimit { limit: 0 });
    }
}
