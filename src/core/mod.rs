//! Runtime core: buses, scheduling and dispatch.
//!
//! The public API from this module is [`Bus`] and the types around it
//! ([`BusBuilder`], [`BusConfig`], [`ChildOptions`], [`SubscribeBuilder`], [`Pending`]).
//!
//! Internal modules:
//! - [`bus`]: the node, its hierarchy links, disposal, and the public handle;
//! - [`scheduler`]: one drain turn at a time per hierarchy;
//! - [`dispatch`]: veto, listeners, broadcast, invocation, and result settling for one message;
//! - [`pending`]: resolution of awaited publishes;
//! - [`subscribe`]: validation and the subscribe surface;
//! - [`config`] / [`builder`]: error callback and construction.

mod builder;
mod bus;
mod config;
mod dispatch;
mod pending;
mod scheduler;
mod subscribe;

pub use builder::BusBuilder;
pub use bus::Bus;
pub use config::{BusConfig, ChildOptions, ErrorHandler};
pub use pending::Pending;
pub use subscribe::SubscribeBuilder;

pub(crate) use bus::BusInner;
