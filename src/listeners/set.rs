//! # ListenerSet: ordered, isolated notification of all-messages listeners.
//!
//! ## What it guarantees
//! - Listeners are called in registration order.
//! - A listener error or panic is converted into a [`DispatchError::Listener`] and
//!   handed to the caller's report function; the remaining listeners still run.
//!
//! ## What it does **not** guarantee
//! - No retries; a failed notification is reported once and dropped.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::{panic_message, DispatchError};
use crate::message::Message;

use super::ListenerRef;

/// Listeners registered on one bus.
#[derive(Default, Clone)]
pub(crate) struct ListenerSet {
    items: Vec<ListenerRef>,
}

impl ListenerSet {
    /// Adds a listener; adding the same one twice is a no-op.
    pub(crate) fn add(&mut self, listener: ListenerRef) {
        if !self.items.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            self.items.push(listener);
        }
    }

    /// Removes a listener by identity; returns `false` if it was not present.
    pub(crate) fn remove(&mut self, listener: &ListenerRef) -> bool {
        let before = self.items.len();
        self.items.retain(|l| !Arc::ptr_eq(l, listener));
        self.items.len() != before
    }

    /// Current listeners, cloned so they can run without holding the bus lock.
    pub(crate) fn snapshot(&self) -> Vec<ListenerRef> {
        self.items.clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
    }
}

/// Notifies every listener, isolating failures.
pub(crate) fn announce(
    listeners: &[ListenerRef],
    message: &Message<'_>,
    subscribers: usize,
    mut report: impl FnMut(DispatchError),
) {
    for listener in listeners {
        let reason = match catch_unwind(AssertUnwindSafe(|| listener.on_message(message, subscribers))) {
            Ok(Ok(())) => continue,
            Ok(Err(err)) => err.to_string(),
            Err(panic) => panic_message(&*panic),
        };
        report(DispatchError::Listener {
            topic: message.topic().clone(),
            listener: listener.name(),
            reason,
        });
    }
}
