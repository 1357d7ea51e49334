//! # Listeners: observers of every message published on a bus.
//!
//! This module provides the [`Listen`] trait and built-in implementations for
//! observing traffic on a [`Bus`](crate::Bus).
//!
//! ## Architecture
//! ```text
//! bus.publish(topic, payload)
//!        │
//!        ▼ (drain turn, after the veto check)
//!   ListenerSet ──► listener.on_message(&Message, subscribers)   (in registration order)
//!        │
//!        ▼
//!   subscribers of `topic` (priority order)
//! ```
//!
//! ## Rules
//! - Listeners run only on the bus where `publish` was called, never on broadcast targets.
//! - A failing or panicking listener is reported to the bus error callback and
//!   never affects delivery.
//! - Child buses copy their parent's listeners at creation unless told otherwise.
//!
//! ## Implementing custom listeners
//! ```rust
//! use canopy::{BoxError, Listen, Message};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! #[derive(Default)]
//! struct Counter(AtomicUsize);
//!
//! impl Listen for Counter {
//!     fn on_message(&self, _message: &Message<'_>, _subscribers: usize) -> Result<(), BoxError> {
//!         self.0.fetch_add(1, Ordering::Relaxed);
//!         Ok(())
//!     }
//!
//!     fn name(&self) -> &'static str { "counter" }
//! }
//! ```

mod listener;
#[cfg(feature = "logging")]
mod log;
mod set;

pub use listener::{Listen, ListenerFn, ListenerRef};
#[cfg(feature = "logging")]
pub use log::LogWriter;

pub(crate) use set::{announce, ListenerSet};
