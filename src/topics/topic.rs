//! # Topic descriptors.
//!
//! A [`Topic`] is created once and never changes. It carries a debug name, a
//! [`Direction`] for broadcasts, and a cardinality marker type that decides the
//! shape of awaited results:
//!
//! ```text
//! Topic<T, R, Multi>  ── publish_await ──► Vec<R>   (every subscriber, tree-wide)
//! Topic<T, R, Single> ── publish_await ──► R        (at most one subscriber, tree-wide)
//! ```
//!
//! ## Example
//! ```rust
//! use canopy::{Direction, Single, Topic, TopicOptions};
//!
//! let prices: Topic<f64> = Topic::new("prices");
//! let quote: Topic<String, f64, Single> = Topic::new("quote");
//! let alarms: Topic<u32> = Topic::with_options("alarms", TopicOptions { direction: Direction::Parent });
//!
//! assert_eq!(prices.name(), "prices");
//! assert!(quote.to_ref().is_single());
//! assert_eq!(alarms.direction(), Direction::Parent);
//!
//! // Same name, different channel.
//! assert_ne!(Topic::<f64>::new("prices").to_ref(), prices.to_ref());
//! ```

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use crate::error::PublishError;

/// Global sequence for topic identities.
static TOPIC_SEQ: AtomicU64 = AtomicU64::new(1);

/// Where a published message travels after local delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Recursively to every descendant bus (default).
    #[default]
    Children,
    /// Once to the immediate parent bus, never further.
    Parent,
}

/// Runtime view of a topic's cardinality marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardinalityKind {
    /// Any number of subscribers.
    Multi,
    /// At most one active subscriber across the whole hierarchy.
    Single,
}

/// Cardinality marker: decides how awaited results are collected.
pub trait Cardinality: Send + Sync + 'static {
    /// Runtime view of this marker.
    const KIND: CardinalityKind;

    /// Value an awaited publish resolves to.
    type Output<R>;

    /// Turns the values of all successful handlers into the awaited result.
    fn collect<R>(topic: &TopicRef, values: Vec<R>) -> Result<Self::Output<R>, PublishError>;
}

/// Any number of subscribers; awaited publishes resolve to `Vec<R>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Multi;

/// At most one subscriber tree-wide; awaited publishes resolve to `R`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Single;

impl Cardinality for Multi {
    const KIND: CardinalityKind = CardinalityKind::Multi;
    type Output<R> = Vec<R>;

    fn collect<R>(_: &TopicRef, values: Vec<R>) -> Result<Vec<R>, PublishError> {
        Ok(values)
    }
}

impl Cardinality for Single {
    const KIND: CardinalityKind = CardinalityKind::Single;
    type Output<R> = R;

    fn collect<R>(topic: &TopicRef, mut values: Vec<R>) -> Result<R, PublishError> {
        match values.len() {
            0 => Err(PublishError::NoSubscribers {
                topic: topic.clone(),
            }),
            1 => values.pop().ok_or(PublishError::NoSubscribers {
                topic: topic.clone(),
            }),
            count => Err(PublishError::Ambiguous {
                topic: topic.clone(),
                count,
            }),
        }
    }
}

/// Options fixed at topic creation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopicOptions {
    /// Broadcast direction (default: [`Direction::Children`]).
    pub direction: Direction,
}

struct TopicMeta {
    id: u64,
    name: Cow<'static, str>,
    kind: CardinalityKind,
    direction: Direction,
}

/// Type-erased topic identity.
///
/// Equality and hashing use the identity allocated at creation, never the name.
#[derive(Clone)]
pub struct TopicRef(Arc<TopicMeta>);

impl TopicRef {
    /// Unique, process-wide topic id.
    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// Debug label given at creation.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Cardinality of the topic.
    pub fn cardinality(&self) -> CardinalityKind {
        self.0.kind
    }

    /// True for single-cardinality topics.
    pub fn is_single(&self) -> bool {
        self.0.kind == CardinalityKind::Single
    }

    /// Broadcast direction of the topic.
    pub fn direction(&self) -> Direction {
        self.0.direction
    }
}

impl PartialEq for TopicRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for TopicRef {}

impl Hash for TopicRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for TopicRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Topic({}#{})", self.0.name, self.0.id)
    }
}

impl fmt::Display for TopicRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

/// Typed channel: payload `T`, handler result `R`, cardinality `C`.
///
/// Cloning is cheap and keeps the identity.
pub struct Topic<T, R = (), C = Multi> {
    meta: TopicRef,
    _marker: PhantomData<fn(T) -> (R, C)>,
}

impl<T, R, C: Cardinality> Topic<T, R, C> {
    /// Creates a topic broadcasting to children.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self::with_options(name, TopicOptions::default())
    }

    /// Creates a topic with explicit options.
    pub fn with_options(name: impl Into<Cow<'static, str>>, options: TopicOptions) -> Self {
        let meta = TopicMeta {
            id: TOPIC_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            name: name.into(),
            kind: C::KIND,
            direction: options.direction,
        };
        Self {
            meta: TopicRef(Arc::new(meta)),
            _marker: PhantomData,
        }
    }
}

impl<T, R, C> Topic<T, R, C> {
    /// Debug label given at creation.
    pub fn name(&self) -> &str {
        self.meta.name()
    }

    /// Broadcast direction.
    pub fn direction(&self) -> Direction {
        self.meta.direction()
    }

    /// Returns the type-erased identity.
    pub fn to_ref(&self) -> TopicRef {
        self.meta.clone()
    }

    pub(crate) fn meta(&self) -> &TopicRef {
        &self.meta
    }
}

impl<T, R, C> Clone for Topic<T, R, C> {
    fn clone(&self) -> Self {
        Self {
            meta: self.meta.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T, R, C> fmt::Debug for Topic<T, R, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.meta, f)
    }
}

impl<T, R, C> PartialEq for Topic<T, R, C> {
    fn eq(&self, other: &Self) -> bool {
        self.meta == other.meta
    }
}

impl<T, R, C> Eq for Topic<T, R, C> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_by_reference() {
        let a = Topic::<u32>::new("same");
        let b = Topic::<u32>::new("same");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_eq!(a.to_ref(), a.clone().to_ref());
        assert_ne!(a.to_ref().id(), b.to_ref().id());
    }

    #[test]
    fn test_defaults() {
        let t = Topic::<u32, u32>::new("t");
        assert_eq!(t.direction(), Direction::Children);
        assert_eq!(t.to_ref().cardinality(), CardinalityKind::Multi);

        let s = Topic::<u32, u32, Single>::with_options(
            "s",
            TopicOptions {
                direction: Direction::Parent,
            },
        );
        assert!(s.to_ref().is_single());
        assert_eq!(s.direction(), Direction::Parent);
    }

    #[test]
    fn test_single_collect() {
        let t = Topic::<u32, u32, Single>::new("s").to_ref();
        assert_eq!(Single::collect(&t, vec![7]).unwrap(), 7);
        assert!(matches!(
            Single::collect::<u32>(&t, vec![]),
            Err(PublishError::NoSubscribers { .. })
        ));
        assert!(matches!(
            Single::collect(&t, vec![1, 2]),
            Err(PublishError::Ambiguous { count: 2, .. })
        ));
    }

    #[test]
    fn test_multi_collect_keeps_order() {
        let t = Topic::<u32, u32>::new("m").to_ref();
        assert_eq!(Multi::collect(&t, vec![3, 6]).unwrap(), vec![3, 6]);
        assert!(Multi::collect::<u32>(&t, vec![]).unwrap().is_empty());
    }
}
