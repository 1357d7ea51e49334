//! # Handlers: what a registration runs when a message arrives.
//!
//! This module provides:
//! - [`Reply`] - a ready value, a ready error, or a pending future
//! - typed adapters that turn closures over `T` into erased handlers
//!
//! ## Handler shapes
//! ```text
//! Fn(T) -> Result<R, E>                      (subscribe)        ─► Reply::Ready
//! Fn(T) -> impl Future<Output = Result<R, E>> (subscribe_async) ─► Reply::Pending
//! ```
//!
//! Synchronous handlers run to completion inside the drain turn. Pending replies are
//! driven outside of it, so a slow handler never holds back the queue.

mod reply;
mod typed;

pub use reply::{Reply, Value};

pub(crate) use reply::HandlerFn;
pub(crate) use typed::{async_handler, sync_handler};
