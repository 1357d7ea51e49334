//! # Interceptor trait and closure adapters.

use std::sync::Arc;

use crate::handlers::{HandlerFn, Reply};
use crate::message::{Message, Payload};

use super::chain::Wrap;

/// Shared interceptor handle; identity (for removal) is the `Arc` pointer.
pub type InterceptorRef = Arc<dyn Intercept>;

/// Middleware applied to every message dispatched on a bus.
///
/// ### Implementation requirements
/// - Keep `veto` cheap and side-effect free; it runs once per message.
/// - Call `next` at most once in `wrap`; not calling it skips the handler.
/// - Panics are caught and reported like handler failures.
pub trait Intercept: Send + Sync + 'static {
    /// Returns `true` to suppress the message entirely.
    fn veto(&self, _message: &Message<'_>) -> bool {
        false
    }

    /// Wraps one handler invocation.
    fn wrap(&self, _message: &Message<'_>, next: Next<'_>) -> Reply {
        next.run()
    }

    /// Name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Continuation to the inner layers of the chain, ending at the real handler.
pub struct Next<'a> {
    pub(super) inner: &'a Wrap,
    pub(super) handler: &'a HandlerFn,
    pub(super) message: Message<'a>,
}

impl Next<'_> {
    /// Continues with the original payload.
    pub fn run(self) -> Reply {
        (self.inner)(&self.message, self.handler)
    }

    /// Continues with a replacement payload.
    ///
    /// The payload must have the topic's payload type, otherwise the handler
    /// fails with [`DispatchError::PayloadType`](crate::DispatchError::PayloadType).
    pub fn run_with(self, payload: Payload) -> Reply {
        let message = Message::new(self.message.topic(), &payload);
        (self.inner)(&message, self.handler)
    }
}

/// Interceptor that only vetoes; see [`veto_fn`].
pub struct VetoFn<F> {
    name: &'static str,
    f: F,
}

impl<F> Intercept for VetoFn<F>
where
    F: Fn(&Message<'_>) -> bool + Send + Sync + 'static,
{
    fn veto(&self, message: &Message<'_>) -> bool {
        (self.f)(message)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Interceptor that only wraps; see [`wrap_fn`].
pub struct WrapFn<F> {
    name: &'static str,
    f: F,
}

impl<F> Intercept for WrapFn<F>
where
    F: Fn(&Message<'_>, Next<'_>) -> Reply + Send + Sync + 'static,
{
    fn wrap(&self, message: &Message<'_>, next: Next<'_>) -> Reply {
        (self.f)(message, next)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Builds a veto-only interceptor from a predicate.
pub fn veto_fn<F>(name: &'static str, f: F) -> Arc<VetoFn<F>>
where
    F: Fn(&Message<'_>) -> bool + Send + Sync + 'static,
{
    Arc::new(VetoFn { name, f })
}

/// Builds a wrap-only interceptor from a closure.
pub fn wrap_fn<F>(name: &'static str, f: F) -> Arc<WrapFn<F>>
where
    F: Fn(&Message<'_>, Next<'_>) -> Reply + Send + Sync + 'static,
{
    Arc::new(WrapFn { name, f })
}
