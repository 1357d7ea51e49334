//! # Registration: one subscriber's presence on a bus.
//!
//! A registration binds a sink to one or more topics of the bus that created it.
//! It carries a message budget, a priority, and two flags:
//!
//! ```text
//! active   - stored in the registry and reachable by dispatch
//! disposed - terminal; the `closed` token is cancelled exactly once
//! ```
//!
//! Activation and removal both run under the registry lock, and removal only happens
//! if the registration was active, so a registration disposed concurrently with its
//! activation is either never stored or removed exactly once.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tokio_util::sync::CancellationToken;

use crate::core::BusInner;
use crate::error::BusError;
use crate::handlers::{HandlerFn, Reply};
use crate::interceptors::Chain;
use crate::message::Message;
use crate::topics::TopicRef;

/// Global sequence for registration ids.
static REGISTRATION_SEQ: AtomicU64 = AtomicU64::new(1);

/// Weak-lifetime hook: returns `false` once the subscribed owner is gone.
pub(crate) type AliveFn = Box<dyn Fn() -> bool + Send + Sync>;

/// Priority and message budget applied to one subscribe call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Terms {
    /// Lower runs earlier.
    pub(crate) priority: i32,
    /// `None` = unlimited.
    pub(crate) limit: Option<usize>,
}

/// Where delivered messages go.
pub(crate) enum Sink {
    /// Callback whose reply takes part in awaited publishes.
    Handler(HandlerFn),
    /// Pushes into an [`Inbox`](super::Inbox); contributes no value.
    Queue(HandlerFn),
}

enum Budget {
    Unlimited,
    Left,
    Last,
    Spent,
}

pub(crate) struct Registration {
    id: u64,
    priority: i32,
    /// Messages left; negative = unlimited.
    remaining: AtomicI64,
    active: AtomicBool,
    disposed: AtomicBool,
    closed: CancellationToken,
    topics: Vec<TopicRef>,
    bus: Weak<BusInner>,
    sink: Sink,
    alive: Option<AliveFn>,
}

impl Registration {
    pub(crate) fn new(
        bus: Weak<BusInner>,
        topics: Vec<TopicRef>,
        terms: Terms,
        sink: Sink,
        alive: Option<AliveFn>,
    ) -> Self {
        let remaining = terms
            .limit
            .map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
        Self {
            id: REGISTRATION_SEQ.fetch_add(1, Ordering::Relaxed),
            priority: terms.priority,
            remaining: AtomicI64::new(remaining),
            active: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            closed: CancellationToken::new(),
            topics,
            bus,
            sink,
            alive,
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn priority(&self) -> i32 {
        self.priority
    }

    pub(crate) fn topics(&self) -> &[TopicRef] {
        &self.topics
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// False once the weak-lifetime hook reports the owner gone.
    pub(crate) fn is_alive(&self) -> bool {
        self.alive.as_ref().map_or(true, |alive| alive())
    }

    /// Messages left before auto-disposal; `None` = unlimited.
    pub(crate) fn remaining(&self) -> Option<usize> {
        let left = self.remaining.load(Ordering::SeqCst);
        usize::try_from(left).ok()
    }

    /// Token cancelled when the registration is disposed.
    pub(crate) fn closed(&self) -> &CancellationToken {
        &self.closed
    }

    /// Called by the bus, under its registry lock, right after storing the registration.
    pub(crate) fn mark_active(&self) {
        self.active.store(true, Ordering::SeqCst);
    }

    /// Stores the registration in its bus registry (see [`BusInner::activate`]).
    pub(crate) fn activate(self: &Arc<Self>) -> Result<(), BusError> {
        match self.bus.upgrade() {
            Some(bus) => bus.activate(self),
            None => Err(BusError::Disposed),
        }
    }

    /// Disposes the registration and removes it from every topic it is bound to.
    ///
    /// Idempotent.
    pub(crate) fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.closed.cancel();

        if let Some(bus) = self.bus.upgrade() {
            let mut registry = bus.registry.lock();
            if !registry.is_closed() && self.active.swap(false, Ordering::SeqCst) {
                for topic in &self.topics {
                    registry.unregister(topic, self.id);
                }
            }
        }
        tracing::trace!(registration = self.id, "registration disposed");
    }

    /// Marks the registration disposed after its bus already dropped it.
    pub(crate) fn detach(&self) {
        self.active.store(false, Ordering::SeqCst);
        if !self.disposed.swap(true, Ordering::SeqCst) {
            self.closed.cancel();
        }
    }

    /// Delivers one message through `chain`.
    ///
    /// Returns `None` when the registration was skipped or produced nothing to collect.
    pub(crate) fn deliver(&self, message: &Message<'_>, chain: &Chain) -> Option<Reply> {
        if self.is_disposed() {
            return None;
        }
        if !self.is_alive() {
            self.orphan();
            return None;
        }

        let last = match self.take_budget() {
            Budget::Spent => return None,
            Budget::Unlimited | Budget::Left => false,
            Budget::Last => true,
        };

        match &self.sink {
            Sink::Handler(handler) => {
                if last {
                    self.expire();
                }
                Some(chain.call(message, handler))
            }
            Sink::Queue(push) => {
                let reply = chain.call(message, push);
                if last {
                    self.expire();
                }
                match reply {
                    Reply::Ready(Ok(_)) => None,
                    other => Some(other),
                }
            }
        }
    }

    /// Disposes a registration whose owner is gone.
    pub(crate) fn orphan(&self) {
        tracing::debug!(registration = self.id, "owner dropped, disposing registration");
        self.dispose();
    }

    fn take_budget(&self) -> Budget {
        let prev = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                (left > 0).then(|| left - 1)
            });
        match prev {
            Ok(1) => Budget::Last,
            Ok(_) => Budget::Left,
            Err(left) if left < 0 => Budget::Unlimited,
            Err(_) => Budget::Spent,
        }
    }

    fn expire(&self) {
        tracing::trace!(registration = self.id, "limit reached");
        self.dispose();
    }
}
