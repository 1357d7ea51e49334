use crate::interceptors::{InterceptorRef, InterceptorSet};
use crate::listeners::{ListenerRef, ListenerSet};

use super::bus::Bus;
use super::config::{self, BusConfig, ErrorHandler};

/// Builder for a root [`Bus`] with listeners and interceptors installed up front.
///
/// ## Example
/// ```rust
/// use std::sync::Arc;
/// use canopy::{veto_fn, Bus, DispatchError};
///
/// let bus = Bus::builder()
///     .on_error(Arc::new(|err: &DispatchError| eprintln!("{err}")))
///     .interceptor(veto_fn("no-debug", |msg| msg.topic().name() == "debug"))
///     .build();
/// assert_eq!(bus.interceptor_count(), 1);
/// ```
#[must_use]
#[derive(Default)]
pub struct BusBuilder {
    config: BusConfig,
    listeners: Vec<ListenerRef>,
    interceptors: Vec<InterceptorRef>,
}

impl BusBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(config: BusConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Sets the error callback for fire-and-forget failures.
    pub fn on_error(mut self, handler: ErrorHandler) -> Self {
        self.config.on_error = Some(handler);
        self
    }

    /// Adds a listener (notified in the order added).
    pub fn listener(mut self, listener: ListenerRef) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Adds an interceptor; later ones wrap earlier ones.
    pub fn interceptor(mut self, interceptor: InterceptorRef) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Builds the root bus.
    pub fn build(self) -> Bus {
        let mut listeners = ListenerSet::default();
        for listener in self.listeners {
            listeners.add(listener);
        }
        let mut interceptors = InterceptorSet::default();
        for interceptor in self.interceptors {
            interceptors.add(interceptor);
        }
        let on_error = self
            .config
            .on_error
            .unwrap_or_else(config::default_error_handler);
        Bus::from_parts(listeners, interceptors, on_error)
    }
}

impl Bus {
    /// Returns a [`BusBuilder`] with the default configuration.
    pub fn builder() -> BusBuilder {
        BusBuilder::default()
    }
}
