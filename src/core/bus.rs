//! # Bus: one node of a publish/subscribe hierarchy.
//!
//! [`Bus`] is a cheap, cloneable handle to a node. A node owns:
//! - a registry of subscriptions, a listener set and an interceptor set
//! - its children (a parent owns its children; a child only points back weakly)
//! - a FIFO mailbox drained by the hierarchy [`Scheduler`]
//!
//! ## Lifecycle
//! ```text
//! Bus::new / builder ──► active ──dispose()──► disposed (terminal)
//!                          │                      │
//!                          │                      ├─ detached from parent
//!                          │                      ├─ every subscription disposed
//!                          │                      ├─ every child disposed
//!                          │                      └─ queued mail dropped
//!                          └─ create_child() ──► child (shares the root scheduler)
//! ```
//!
//! ## Rules
//! - Every mutating call on a disposed bus fails with [`BusError::Disposed`].
//! - `dispose()` is idempotent and cascades to children.
//! - Publishing never dispatches synchronously; see [`Bus::flush`].

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::{BusError, DispatchError};
use crate::interceptors::{InterceptorRef, InterceptorSet};
use crate::listeners::{ListenerRef, ListenerSet};
use crate::message::{Envelope, Payload};
use crate::registry::{Registration, Registry};
use crate::topics::{Cardinality, Topic, TopicRef};

use super::config::{self, BusConfig, ChildOptions, ErrorHandler};
use super::pending::Pending;
use super::scheduler::Scheduler;

/// Global sequence for bus ids.
static BUS_SEQ: AtomicU64 = AtomicU64::new(1);

#[derive(Default)]
pub(crate) struct Mailbox {
    pub(crate) queue: VecDeque<Envelope>,
    /// True while this bus sits in the scheduler run-queue.
    pub(crate) scheduled: bool,
}

pub(crate) struct BusInner {
    pub(crate) id: u64,
    pub(crate) parent: Option<Weak<BusInner>>,
    pub(crate) scheduler: Arc<Scheduler>,
    pub(crate) disposed: AtomicBool,
    pub(crate) registry: Mutex<Registry>,
    pub(crate) children: Mutex<Vec<Arc<BusInner>>>,
    pub(crate) listeners: Mutex<ListenerSet>,
    pub(crate) interceptors: Mutex<InterceptorSet>,
    pub(crate) mailbox: Mutex<Mailbox>,
    pub(crate) on_error: ErrorHandler,
}

impl BusInner {
    pub(crate) fn new(
        parent: Option<Weak<BusInner>>,
        scheduler: Arc<Scheduler>,
        listeners: ListenerSet,
        interceptors: InterceptorSet,
        on_error: ErrorHandler,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: BUS_SEQ.fetch_add(1, Ordering::Relaxed),
            parent,
            scheduler,
            disposed: AtomicBool::new(false),
            registry: Mutex::new(Registry::default()),
            children: Mutex::new(Vec::new()),
            listeners: Mutex::new(listeners),
            interceptors: Mutex::new(interceptors),
            mailbox: Mutex::new(Mailbox::default()),
            on_error,
        })
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub(crate) fn ensure_active(&self) -> Result<(), BusError> {
        if self.is_disposed() {
            Err(BusError::Disposed)
        } else {
            Ok(())
        }
    }

    pub(crate) fn parent(&self) -> Option<Arc<BusInner>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn report(&self, err: DispatchError) {
        config::report(&self.on_error, err);
    }

    fn root(self: &Arc<Self>) -> Arc<BusInner> {
        let mut node = Arc::clone(self);
        while let Some(parent) = node.parent() {
            node = parent;
        }
        node
    }

    /// Disposes the registrations of `topic` whose owner was dropped.
    pub(crate) fn prune(&self, topic: &TopicRef) {
        let orphans = self.registry.lock().orphans(topic);
        for registration in orphans {
            registration.orphan();
        }
    }

    /// True if any bus of this hierarchy holds a live registration for `topic`.
    fn exists_anywhere(self: &Arc<Self>, topic: &TopicRef) -> bool {
        let mut stack = vec![self.root()];
        while let Some(node) = stack.pop() {
            node.prune(topic);
            if node.registry.lock().contains(topic) {
                return true;
            }
            let children = node.children.lock();
            stack.extend(children.iter().rev().cloned());
        }
        false
    }

    /// Fails if a single-cardinality topic in `topics` is already taken in this hierarchy.
    pub(crate) fn check_single(self: &Arc<Self>, topics: &[TopicRef]) -> Result<(), BusError> {
        let _membership = self.scheduler.membership.lock();
        self.check_single_locked(topics)
    }

    fn check_single_locked(self: &Arc<Self>, topics: &[TopicRef]) -> Result<(), BusError> {
        match topics
            .iter()
            .find(|t| t.is_single() && self.exists_anywhere(t))
        {
            Some(topic) => Err(BusError::SingleSubscriber {
                topic: topic.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Stores `registration` under each of its topics and marks it active.
    ///
    /// A registration disposed before this call is left out silently.
    pub(crate) fn activate(self: &Arc<Self>, registration: &Arc<Registration>) -> Result<(), BusError> {
        self.ensure_active()?;
        let _membership = self.scheduler.membership.lock();
        self.check_single_locked(registration.topics())?;

        let mut registry = self.registry.lock();
        if registry.is_closed() {
            return Err(BusError::Disposed);
        }
        if registration.is_disposed() {
            return Ok(());
        }
        for topic in registration.topics() {
            registry.register(topic, Arc::clone(registration));
        }
        registration.mark_active();
        tracing::trace!(
            bus = self.id,
            registration = registration.id(),
            topics = registration.topics().len(),
            "registration active"
        );
        Ok(())
    }

    pub(crate) fn dispose(self: &Arc<Self>) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(parent) = self.parent() {
            parent.children.lock().retain(|c| !Arc::ptr_eq(c, self));
        }

        let registrations = self.registry.lock().close();
        for registration in &registrations {
            registration.detach();
        }

        let children = std::mem::take(&mut *self.children.lock());
        for child in &children {
            child.dispose();
        }

        self.listeners.lock().clear();
        self.interceptors.lock().clear();
        let dropped = std::mem::take(&mut self.mailbox.lock().queue);

        tracing::debug!(
            bus = self.id,
            subscriptions = registrations.len(),
            children = children.len(),
            dropped = dropped.len(),
            "bus disposed"
        );
    }
}

/// Handle to a node of a bus hierarchy.
///
/// ## Example
/// ```rust
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use canopy::{Bus, Topic};
///
/// let bus = Bus::new();
/// let doubled: Topic<u32, u32> = Topic::new("doubled");
///
/// let _sub = bus.subscribe(&doubled, |n: u32| Ok::<_, std::io::Error>(n * 2))?;
/// let results = bus.publish_await(&doubled, 21)?.await?;
/// assert_eq!(results, vec![42]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Bus {
    pub(crate) inner: Arc<BusInner>,
}

impl Bus {
    /// Creates a root bus with the default configuration.
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    /// Creates a root bus.
    pub fn with_config(config: BusConfig) -> Self {
        let on_error = config.on_error.unwrap_or_else(config::default_error_handler);
        Self::from_parts(ListenerSet::default(), InterceptorSet::default(), on_error)
    }

    pub(crate) fn from_parts(
        listeners: ListenerSet,
        interceptors: InterceptorSet,
        on_error: ErrorHandler,
    ) -> Self {
        let inner = BusInner::new(
            None,
            Arc::new(Scheduler::default()),
            listeners,
            interceptors,
            on_error,
        );
        tracing::debug!(bus = inner.id, "bus created");
        Self { inner }
    }

    /// Creates a child bus linked under this one.
    ///
    /// The child shares this hierarchy's scheduler and single-cardinality scope.
    pub fn create_child(&self, options: ChildOptions) -> Result<Bus, BusError> {
        self.inner.ensure_active()?;
        let listeners = if options.copy_listeners {
            self.inner.listeners.lock().clone()
        } else {
            ListenerSet::default()
        };
        let interceptors = if options.copy_interceptors {
            self.inner.interceptors.lock().snapshot()
        } else {
            InterceptorSet::default()
        };
        let on_error = options
            .on_error
            .unwrap_or_else(|| Arc::clone(&self.inner.on_error));

        let child = BusInner::new(
            Some(Arc::downgrade(&self.inner)),
            Arc::clone(&self.inner.scheduler),
            listeners,
            interceptors,
            on_error,
        );
        {
            let mut children = self.inner.children.lock();
            self.inner.ensure_active()?;
            children.push(Arc::clone(&child));
        }
        tracing::debug!(bus = child.id, parent = self.inner.id, "child bus created");
        Ok(Bus { inner: child })
    }

    /// Publishes `payload` on `topic` without waiting for handlers.
    ///
    /// Handler failures go to the bus error callback.
    ///
    /// # Errors
    /// [`BusError::Disposed`] on a disposed bus, [`BusError::NoRuntime`] when called
    /// outside a Tokio runtime. The same applies to every publish and signal method.
    pub fn publish<T, R, C>(&self, topic: &Topic<T, R, C>, payload: T) -> Result<(), BusError>
    where
        T: Send + Sync + 'static,
    {
        self.enqueue(topic.to_ref(), Arc::new(payload), None)
    }

    /// Publishes `payload` and returns a future resolving to the handlers' results.
    ///
    /// The message is queued immediately; awaiting the returned [`Pending`] is not
    /// required for delivery. See [`Pending`] for the resolution rules.
    pub fn publish_await<T, R, C>(
        &self,
        topic: &Topic<T, R, C>,
        payload: T,
    ) -> Result<Pending<R, C>, BusError>
    where
        T: Send + Sync + 'static,
        R: 'static,
        C: Cardinality,
    {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let topic = topic.to_ref();
        self.enqueue(topic.clone(), Arc::new(payload), Some(tx))?;
        Ok(Pending::new(topic, rx))
    }

    /// Publishes on a topic without payload.
    pub fn signal<R, C>(&self, topic: &Topic<(), R, C>) -> Result<(), BusError> {
        self.publish(topic, ())
    }

    /// Awaited form of [`signal`](Bus::signal).
    pub fn signal_await<R, C>(&self, topic: &Topic<(), R, C>) -> Result<Pending<R, C>, BusError>
    where
        R: 'static,
        C: Cardinality,
    {
        self.publish_await(topic, ())
    }

    fn enqueue(
        &self,
        topic: TopicRef,
        payload: Payload,
        reply: Option<tokio::sync::oneshot::Sender<Vec<crate::message::Outcome>>>,
    ) -> Result<(), BusError> {
        self.inner.ensure_active()?;
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(BusError::NoRuntime);
        }
        if self.inner.enqueue(Envelope::published(topic, payload, reply)) {
            Ok(())
        } else {
            Err(BusError::Disposed)
        }
    }

    /// Adds a listener notified of every message published on this bus.
    ///
    /// Adding the same listener twice has no effect.
    pub fn add_listener(&self, listener: ListenerRef) -> Result<(), BusError> {
        self.inner.ensure_active()?;
        self.inner.listeners.lock().add(listener);
        Ok(())
    }

    /// Removes a listener; returns `false` if it was not registered.
    pub fn remove_listener(&self, listener: &ListenerRef) -> Result<bool, BusError> {
        self.inner.ensure_active()?;
        Ok(self.inner.listeners.lock().remove(listener))
    }

    /// Adds an interceptor; it becomes the outermost layer.
    ///
    /// Adding the same interceptor twice has no effect.
    pub fn add_interceptor(&self, interceptor: InterceptorRef) -> Result<(), BusError> {
        self.inner.ensure_active()?;
        tracing::trace!(bus = self.inner.id, interceptor = interceptor.name(), "interceptor added");
        self.inner.interceptors.lock().add(interceptor);
        Ok(())
    }

    /// Removes an interceptor; returns `false` if it was not registered.
    pub fn remove_interceptor(&self, interceptor: &InterceptorRef) -> Result<bool, BusError> {
        self.inner.ensure_active()?;
        Ok(self.inner.interceptors.lock().remove(interceptor))
    }

    /// Disposes this bus and all of its descendants. Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// True once disposed (directly or through an ancestor).
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Resolves once every queued message of this hierarchy has been dispatched.
    ///
    /// Pending (async) handler futures are not waited for.
    pub async fn flush(&self) {
        self.inner.scheduler.idle().await;
    }

    /// Number of active subscriptions for `topic` on this bus.
    pub fn subscriber_count<T, R, C>(&self, topic: &Topic<T, R, C>) -> usize {
        self.inner.prune(topic.meta());
        self.inner.registry.lock().count(topic.meta())
    }

    /// Number of (topic, subscription) entries on this bus.
    pub fn registrations(&self) -> usize {
        self.inner.registry.lock().len()
    }

    /// Number of listeners on this bus.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// Number of interceptors on this bus.
    pub fn interceptor_count(&self) -> usize {
        self.inner.interceptors.lock().len()
    }

    /// Parent bus, if this is a child that is still attached.
    pub fn parent(&self) -> Option<Bus> {
        self.inner.parent().map(|inner| Bus { inner })
    }

    /// Current children, in creation order.
    pub fn children(&self) -> Vec<Bus> {
        self.inner
            .children
            .lock()
            .iter()
            .map(|inner| Bus {
                inner: Arc::clone(inner),
            })
            .collect()
    }

    /// Process-wide unique id, used in logs.
    pub fn id(&self) -> u64 {
        self.inner.id
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Bus {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Bus {}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("id", &self.inner.id)
            .field("disposed", &self.inner.is_disposed())
            .field("children", &self.inner.children.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::interceptors::veto_fn;
    use crate::listeners::ListenerFn;
    use crate::topics::Single;

    #[test]
    fn test_dispose_cascades_and_is_idempotent() {
        let root = Bus::new();
        let child = root.create_child(ChildOptions::default()).unwrap();
        let grandchild = child.create_child(ChildOptions::default()).unwrap();
        assert_eq!(root.children(), vec![child.clone()]);
        assert_eq!(grandchild.parent(), Some(child.clone()));

        child.dispose();
        assert!(child.is_disposed());
        assert!(grandchild.is_disposed());
        assert!(!root.is_disposed());
        assert!(root.children().is_empty());

        child.dispose();
        root.dispose();
        root.dispose();
        assert!(root.is_disposed());
    }

    #[test]
    fn test_disposed_bus_rejects_mutation() {
        let bus = Bus::new();
        let topic: Topic<u32> = Topic::new("t");
        bus.dispose();

        assert_eq!(bus.publish(&topic, 1), Err(BusError::Disposed));
        assert_eq!(bus.signal(&Topic::<()>::new("s")), Err(BusError::Disposed));
        assert!(bus.publish_await(&topic, 1).is_err());
        assert_eq!(
            bus.subscribe(&topic, |_: u32| Ok::<_, BoxError>(())).unwrap_err(),
            BusError::Disposed
        );
        assert_eq!(bus.inbox(&topic).unwrap_err(), BusError::Disposed);
        assert_eq!(
            bus.create_child(ChildOptions::default()).unwrap_err(),
            BusError::Disposed
        );
        let listener: ListenerRef = ListenerFn::arc("l", |_, _| Ok::<_, BoxError>(()));
        assert_eq!(bus.add_listener(listener.clone()), Err(BusError::Disposed));
        assert_eq!(bus.remove_listener(&listener), Err(BusError::Disposed));
        let interceptor: InterceptorRef = veto_fn("v", |_| false);
        assert_eq!(bus.add_interceptor(interceptor.clone()), Err(BusError::Disposed));
        assert_eq!(bus.remove_interceptor(&interceptor), Err(BusError::Disposed));
    }

    #[test]
    fn test_publish_outside_runtime_is_rejected() {
        let bus = Bus::new();
        let topic: Topic<u32> = Topic::new("t");
        let ping: Topic<()> = Topic::new("ping");
        let _sub = bus.subscribe(&topic, |_: u32| Ok::<_, BoxError>(())).unwrap();

        assert_eq!(bus.publish(&topic, 1), Err(BusError::NoRuntime));
        assert_eq!(bus.signal(&ping), Err(BusError::NoRuntime));
        assert!(matches!(bus.publish_await(&topic, 2), Err(BusError::NoRuntime)));
        assert!(bus.inner.mailbox.lock().queue.is_empty());
        assert!(bus.inner.scheduler.is_idle());

        bus.dispose();
        assert_eq!(bus.publish(&topic, 3), Err(BusError::Disposed));
    }

    #[tokio::test]
    async fn test_dispose_closes_subscriptions() {
        let root = Bus::new();
        let child = root.create_child(ChildOptions::default()).unwrap();
        let topic: Topic<u32> = Topic::new("t");
        let sub = child.subscribe(&topic, |_: u32| Ok::<_, BoxError>(())).unwrap();
        assert_eq!(child.subscriber_count(&topic), 1);

        root.dispose();
        assert!(sub.is_disposed());
        sub.closed().await;
        sub.dispose();
    }

    #[test]
    fn test_single_subscriber_per_hierarchy() {
        let root = Bus::new();
        let child = root.create_child(ChildOptions::default()).unwrap();
        let sibling = root.create_child(ChildOptions::default()).unwrap();
        let quote: Topic<u32, u32, Single> = Topic::new("quote");

        let first = child.subscribe(&quote, |n: u32| Ok::<_, BoxError>(n)).unwrap();
        for bus in [&root, &child, &sibling] {
            assert!(matches!(
                bus.subscribe(&quote, |n: u32| Ok::<_, BoxError>(n)),
                Err(BusError::SingleSubscriber { .. })
            ));
        }
        assert!(matches!(
            sibling.inbox(&quote),
            Err(BusError::SingleSubscriber { .. })
        ));

        let elsewhere = Bus::new();
        let _other = elsewhere.subscribe(&quote, |n: u32| Ok::<_, BoxError>(n)).unwrap();

        first.dispose();
        let _again = root.subscribe(&quote, |n: u32| Ok::<_, BoxError>(n)).unwrap();
    }

    #[test]
    fn test_child_options_control_copies() {
        let listener: ListenerRef = ListenerFn::arc("l", |_, _| Ok::<_, BoxError>(()));
        let root = Bus::builder()
            .listener(listener.clone())
            .interceptor(veto_fn("v", |_| false))
            .build();

        let copy = root.create_child(ChildOptions::default()).unwrap();
        assert_eq!((copy.listener_count(), copy.interceptor_count()), (1, 1));

        let bare = root
            .create_child(ChildOptions {
                copy_listeners: false,
                copy_interceptors: false,
                on_error: None,
            })
            .unwrap();
        assert_eq!((bare.listener_count(), bare.interceptor_count()), (0, 0));

        assert_eq!(copy.remove_listener(&listener), Ok(true));
        assert_eq!(copy.listener_count(), 0);
        assert_eq!(root.listener_count(), 1);
    }

    #[tokio::test]
    async fn test_child_inherits_or_overrides_error_callback() {
        use parking_lot::Mutex;

        let seen: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let root = Bus::with_config(BusConfig {
            on_error: Some(Arc::new(move |_: &DispatchError| s.lock().push("root"))),
        });
        let inherits = root.create_child(ChildOptions::default()).unwrap();
        let s = seen.clone();
        let overrides = root
            .create_child(ChildOptions {
                on_error: Some(Arc::new(move |_: &DispatchError| s.lock().push("own"))),
                ..ChildOptions::default()
            })
            .unwrap();

        let topic: Topic<u32> = Topic::new("t");
        for bus in [&inherits, &overrides] {
            let _ = bus
                .subscribe(&topic, |_: u32| Err::<(), BoxError>("down".into()))
                .unwrap();
        }
        inherits.publish(&topic, 1).unwrap();
        overrides.publish(&topic, 2).unwrap();
        root.flush().await;

        assert_eq!(*seen.lock(), vec!["root", "own"]);
    }
}
