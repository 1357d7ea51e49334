//! # Topics: typed channel identities.
//!
//! This module provides the identity and policy side of a channel:
//! - [`Topic`] - typed handle (`payload`, `result`, `cardinality`) used to publish and subscribe
//! - [`TopicRef`] - type-erased identity shared by the registry, listeners and interceptors
//! - [`Direction`] / [`TopicOptions`] - broadcast policy fixed at creation
//! - [`Cardinality`] ([`Multi`], [`Single`]) - how many subscribers a topic allows tree-wide
//! - [`IntoTopics`] / [`TopicSet`] - one or more topics accepted by subscribe calls
//!
//! ## Rules
//! - Identity is by reference: two topics created with the same name are different channels.
//! - Topics are immutable after creation and live as long as any clone of them.

mod set;
mod topic;

pub use set::{IntoTopics, TopicSet};

pub(crate) use set::dedup;
pub use topic::{Cardinality, CardinalityKind, Direction, Multi, Single, Topic, TopicOptions, TopicRef};
