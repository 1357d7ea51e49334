//! # Messages in flight.
//!
//! A published payload is stored once as an `Arc<dyn Any + Send + Sync>` and shared by
//! every handler, listener and broadcast copy. [`Message`] is the read-only view handed
//! to user code; [`Envelope`] is the queued form that exists only until its bus drains it.

use std::any::Any;
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::error::DispatchError;
use crate::handlers::Value;
use crate::topics::TopicRef;

/// Shared, type-erased payload.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Result of one registration (or one broadcast branch) in an awaited publish.
pub(crate) type Outcome = Result<Value, DispatchError>;

/// Read-only view of a message being dispatched.
#[derive(Clone, Copy)]
pub struct Message<'a> {
    topic: &'a TopicRef,
    payload: &'a Payload,
}

impl<'a> Message<'a> {
    pub(crate) fn new(topic: &'a TopicRef, payload: &'a Payload) -> Self {
        Self { topic, payload }
    }

    /// Topic the message was published on.
    pub fn topic(&self) -> &'a TopicRef {
        self.topic
    }

    /// Returns the payload if it has type `T`.
    pub fn payload<T: 'static>(&self) -> Option<&'a T> {
        self.payload.downcast_ref::<T>()
    }

    /// Returns the shared payload handle.
    pub fn raw(&self) -> &'a Payload {
        self.payload
    }
}

impl std::fmt::Debug for Message<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message").field("topic", self.topic).finish_non_exhaustive()
    }
}

/// Queued message.
pub(crate) struct Envelope {
    pub(crate) topic: TopicRef,
    pub(crate) payload: Payload,
    /// Forward to children/parent after local delivery.
    pub(crate) broadcast: bool,
    /// Announce to the bus listeners (only where `publish` was called).
    pub(crate) notify: bool,
    /// Present for awaited publishes.
    pub(crate) reply: Option<oneshot::Sender<Vec<Outcome>>>,
}

impl Envelope {
    pub(crate) fn published(
        topic: TopicRef,
        payload: Payload,
        reply: Option<oneshot::Sender<Vec<Outcome>>>,
    ) -> Self {
        Self {
            topic,
            payload,
            broadcast: true,
            notify: true,
            reply,
        }
    }

    /// Copy forwarded to another bus of the hierarchy.
    pub(crate) fn forwarded(
        &self,
        broadcast: bool,
        reply: Option<oneshot::Sender<Vec<Outcome>>>,
    ) -> Self {
        Self {
            topic: self.topic.clone(),
            payload: Arc::clone(&self.payload),
            broadcast,
            notify: false,
            reply,
        }
    }

    pub(crate) fn view(&self) -> Message<'_> {
        Message::new(&self.topic, &self.payload)
    }
}
