//! # Bus configuration.
//!
//! Provides [`BusConfig`] for root buses and [`ChildOptions`] for child buses.
//!
//! ## Error callback
//! Fire-and-forget publishes never return handler failures to the publisher. Each
//! isolated [`DispatchError`] goes, one at a time, to the bus error callback:
//! - `None` on a root → the default callback, which logs through `tracing::error!`
//! - `None` on a child → the parent's callback is inherited
//!
//! A panic inside the callback itself is caught and logged; it never reaches the
//! dispatch turn.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::{panic_message, DispatchError};

/// Receives isolated failures of fire-and-forget dispatch.
pub type ErrorHandler = Arc<dyn Fn(&DispatchError) + Send + Sync>;

/// Configuration of a root bus.
#[derive(Clone, Default)]
pub struct BusConfig {
    /// Error callback; `None` logs through `tracing`.
    pub on_error: Option<ErrorHandler>,
}

impl fmt::Debug for BusConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusConfig")
            .field("on_error", &self.on_error.as_ref().map(|_| "custom"))
            .finish()
    }
}

/// Options for [`Bus::create_child`](crate::Bus::create_child).
///
/// ## Field semantics
/// - `copy_listeners`: seed the child with a copy of the parent's listeners (default `true`)
/// - `copy_interceptors`: seed the child with a copy of the parent's interceptors (default `true`)
/// - `on_error`: error callback override; `None` inherits the parent's
///
/// Copies are taken once at creation; later changes on either side are not shared.
#[derive(Clone)]
pub struct ChildOptions {
    /// Copy the parent's listeners.
    pub copy_listeners: bool,
    /// Copy the parent's interceptors.
    pub copy_interceptors: bool,
    /// Error callback override.
    pub on_error: Option<ErrorHandler>,
}

impl Default for ChildOptions {
    fn default() -> Self {
        Self {
            copy_listeners: true,
            copy_interceptors: true,
            on_error: None,
        }
    }
}

impl fmt::Debug for ChildOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildOptions")
            .field("copy_listeners", &self.copy_listeners)
            .field("copy_interceptors", &self.copy_interceptors)
            .field("on_error", &self.on_error.as_ref().map(|_| "custom"))
            .finish()
    }
}

/// Callback used when none is configured.
pub(crate) fn default_error_handler() -> ErrorHandler {
    Arc::new(|err: &DispatchError| {
        tracing::error!(
            topic = %err.topic(),
            label = err.as_label(),
            error = %err,
            "unhandled dispatch error"
        );
    })
}

/// Hands `err` to `handler`, containing a panicking callback.
pub(crate) fn report(handler: &ErrorHandler, err: DispatchError) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(&err))) {
        tracing::error!(
            label = err.as_label(),
            error = %err,
            panic = %panic_message(&*panic),
            "error callback panicked"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topics::Topic;
    use parking_lot::Mutex;

    #[test]
    fn test_report_survives_panicking_callback() {
        let topic = Topic::<u8>::new("t").to_ref();
        let handler: ErrorHandler = Arc::new(|_: &DispatchError| panic!("callback down"));
        report(&handler, DispatchError::Vetoed { topic });
    }

    #[test]
    fn test_report_passes_error_through() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let handler: ErrorHandler = Arc::new(move |err: &DispatchError| s.lock().push(err.as_label()));
        let topic = Topic::<u8>::new("t").to_ref();
        report(&handler, DispatchError::Vetoed { topic });
        assert_eq!(*seen.lock(), vec!["dispatch_vetoed"]);
    }

    #[test]
    fn test_child_defaults_copy_everything() {
        let options = ChildOptions::default();
        assert!(options.copy_listeners && options.copy_interceptors);
        assert!(options.on_error.is_none());
    }
}
