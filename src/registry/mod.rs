//! # Registry: who receives what on one bus.
//!
//! This module owns the subscriber side of a bus:
//! - [`Registration`] - one live binding of a handler (or a queue) to one or more topics
//! - [`Registry`] - per-bus map from topic to its registrations
//! - [`Subscription`] - cloneable handle returned by subscribe calls
//! - [`Inbox`] - lazy, consumer-pulled subscription
//!
//! ## Registration lifecycle
//! ```text
//!   Inbox::new ──► pending ──(first recv)──► active ──► disposed
//!   subscribe  ─────────────────────────────► active ──► disposed
//!                                              │
//!                       limit reached / dispose() / bus disposed / owner dropped
//! ```
//!
//! ## Rules
//! - Only active registrations are stored in a registry.
//! - Disposal is idempotent and removes the registration from every topic it was bound to.
//! - A registration with a limit disposes itself on the delivery that spends the budget.

mod inbox;
mod registration;
mod subscription;
mod table;

pub use inbox::Inbox;
pub use subscription::Subscription;

pub(crate) use inbox::queue_handler;
pub(crate) use registration::{AliveFn, Registration, Sink, Terms};
pub(crate) use table::Registry;
