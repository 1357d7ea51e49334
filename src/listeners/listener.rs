//! # Listener trait and function-backed listener.
//!
//! [`ListenerFn`] wraps a closure `F: Fn(&Message, usize) -> Result<(), E>`, which is
//! enough for most observers (counters, tracing, test recorders).
//!
//! ## Example
//! ```rust
//! use canopy::{BoxError, ListenerFn, ListenerRef};
//!
//! let l: ListenerRef = ListenerFn::arc("printer", |msg, subscribers| {
//!     println!("{} -> {subscribers} subscribers", msg.topic());
//!     Ok::<_, BoxError>(())
//! });
//! assert_eq!(l.name(), "printer");
//! ```

use std::sync::Arc;

use crate::error::BoxError;
use crate::message::Message;

/// Shared listener handle; identity (for removal) is the `Arc` pointer.
pub type ListenerRef = Arc<dyn Listen>;

/// Observer of every message published on a bus.
pub trait Listen: Send + Sync + 'static {
    /// Called once per published message, before any subscriber runs.
    ///
    /// `subscribers` is the number of active subscriptions the message is about to reach
    /// on this bus.
    fn on_message(&self, message: &Message<'_>, subscribers: usize) -> Result<(), BoxError>;

    /// Returns the listener name used in error reports.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose - override it when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Function-backed listener.
pub struct ListenerFn<F> {
    name: &'static str,
    f: F,
}

impl<F> ListenerFn<F> {
    /// Creates a new function-backed listener.
    pub fn new<E>(name: &'static str, f: F) -> Self
    where
        F: Fn(&Message<'_>, usize) -> Result<(), E>,
    {
        Self { name, f }
    }

    /// Creates the listener and returns it as a shared handle.
    pub fn arc<E>(name: &'static str, f: F) -> Arc<Self>
    where
        F: Fn(&Message<'_>, usize) -> Result<(), E>,
    {
        Arc::new(Self::new(name, f))
    }
}

impl<F, E> Listen for ListenerFn<F>
where
    F: Fn(&Message<'_>, usize) -> Result<(), E> + Send + Sync + 'static,
    E: Into<BoxError>,
{
    fn on_message(&self, message: &Message<'_>, subscribers: usize) -> Result<(), BoxError> {
        (self.f)(message, subscribers).map_err(Into::into)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
