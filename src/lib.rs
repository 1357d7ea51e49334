//! # canopy
//!
//! **Canopy** is a hierarchical, in-process publish/subscribe library for Rust.
//!
//! Producers publish typed messages on [`Topic`]s; subscribers receive them on a tree of
//! linked [`Bus`]es that broadcast messages down to their children or up to their parent.
//! Dispatch is ordered, interceptable and isolated: one failing handler never affects
//! another, and a publisher can either fire and forget or await every result.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  publish()   │   │publish_await │   │  signal()    │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Bus (one node of the hierarchy)                                  │
//! │  - Mailbox (FIFO of envelopes)                                    │
//! │  - Registry (topic → registrations, priority ordered)             │
//! │  - ListenerSet (sees every publish on this bus)                   │
//! │  - InterceptorSet (veto + onion-wrapped handlers)                 │
//! └──────┬────────────────────────────────────────────────────────────┘
//!        ▼ first mail schedules the bus
//! ┌───────────────────────────────────────────────────────────────────┐
//! │         Scheduler (one per hierarchy, one drain turn at a time)   │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                     ┌───────────────────────────┐
//!                     │     dispatch(envelope)    │
//!                     └─┬──────┬──────┬─────────┬─┘
//!                       ▼      ▼      ▼         ▼
//!                     veto  listeners broadcast  handlers (priority order)
//!                                     │            │
//!                     child/parent ◄──┘            ▼
//!                     mailboxes         error callback | awaited results
//! ```
//!
//! ### Ordering
//! ```text
//! bus.publish(p1)           ──► [p1]
//!   handler(p1) publishes p3 ──► [p2, p3]     (queued, never interleaved)
//! bus.publish(p2)
//!
//! every subscriber of the bus sees p1, p2, p3
//! broadcast: publishing bus ─► its children (in creation order) ─► grandchildren ...
//! ```
//!
//! ## Features
//! | Area              | Description                                                      | Key types / traits                           |
//! |-------------------|------------------------------------------------------------------|----------------------------------------------|
//! | **Topics**        | Typed channels with broadcast direction and cardinality.         | [`Topic`], [`TopicOptions`], [`Single`]      |
//! | **Buses**         | Hierarchy of nodes, disposal cascades to children.               | [`Bus`], [`BusBuilder`], [`ChildOptions`]    |
//! | **Subscriptions** | Callback, async, one-shot, limited, prioritized, pull-based.     | [`Subscription`], [`Inbox`], [`SubscribeBuilder`] |
//! | **Awaited publish** | Collect every result (or every failure) of one publish.        | [`Pending`], [`PublishError`]                |
//! | **Middleware**    | Veto messages and wrap handler invocations.                      | [`Intercept`], [`veto_fn`], [`wrap_fn`]      |
//! | **Observers**     | See every publish on a bus.                                      | [`Listen`], [`ListenerFn`]                   |
//! | **Binding**       | Subscribe an object's handlers from its own descriptor table.    | [`Bindable`], [`Descriptor`], [`Binding`]    |
//! | **Errors**        | Typed validation, dispatch and publish errors.                   | [`BusError`], [`DispatchError`], [`AggregateError`] |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] listener _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use canopy::{Bus, ChildOptions, Topic};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let root = Bus::new();
//!     let child = root.create_child(ChildOptions::default())?;
//!
//!     // Awaited results come back from the whole subtree.
//!     let price: Topic<String, f64> = Topic::new("price");
//!     let _a = root.subscribe(&price, |_sku: String| Ok::<_, std::io::Error>(9.5))?;
//!     let _b = child.subscribe(&price, |_sku: String| Ok::<_, std::io::Error>(10.0))?;
//!
//!     let quotes = root.publish_await(&price, "sku-1".to_string())?.await?;
//!     assert_eq!(quotes, vec![9.5, 10.0]);
//!
//!     root.dispose();
//!     assert!(child.is_disposed());
//!     Ok(())
//! }
//! ```
mod binder;
mod core;
mod error;
mod handlers;
mod interceptors;
mod listeners;
mod message;
mod registry;
mod topics;

// ---- Public re-exports ----

pub use binder::{Bindable, Binding, Descriptor};
pub use self::core::{Bus, BusBuilder, BusConfig, ChildOptions, ErrorHandler, Pending, SubscribeBuilder};
pub use error::{AggregateError, BoxError, BusError, DispatchError, PublishError};
pub use handlers::{Reply, Value};
pub use interceptors::{veto_fn, wrap_fn, Intercept, InterceptorRef, Next, VetoFn, WrapFn};
pub use listeners::{Listen, ListenerFn, ListenerRef};
pub use message::{Message, Payload};
pub use registry::{Inbox, Subscription};
pub use topics::{
    Cardinality, CardinalityKind, Direction, IntoTopics, Multi, Single, Topic, TopicOptions, TopicRef,
    TopicSet,
};

// Optional: expose a simple built-in logging listener (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use listeners::LogWriter;
