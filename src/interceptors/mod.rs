//! # Interceptors: veto and wrap every delivery on a bus.
//!
//! An interceptor can suppress a message before anything sees it ([`Intercept::veto`])
//! and wrap each handler invocation as middleware ([`Intercept::wrap`]).
//!
//! ## Ordering
//! ```text
//! added: A, then B, then C
//!
//! veto:   C? ─► B? ─► A?          (first `true` stops; nothing is delivered)
//! wrap:   C.wrap ─► B.wrap ─► A.wrap ─► handler
//!         (most recently added is outermost)
//! ```
//!
//! The composed chain is built lazily and rebuilt after the interceptor set changes.
//!
//! ## Example
//! ```rust
//! use canopy::{veto_fn, wrap_fn, Reply};
//!
//! // Drop every message on the "debug" topic.
//! let quiet = veto_fn("quiet", |msg| msg.topic().name() == "debug");
//!
//! // Pass everything through, unchanged.
//! let passthrough = wrap_fn("passthrough", |_msg, next| next.run());
//! # let _ = (quiet, passthrough);
//! ```

mod chain;
mod interceptor;

pub use interceptor::{veto_fn, wrap_fn, Intercept, InterceptorRef, Next, VetoFn, WrapFn};

pub(crate) use chain::{Chain, InterceptorSet};
