//! # Topic lists for subscribe calls.
//!
//! A subscription may be bound to several topics at once, as long as they share the
//! payload type `T` and the result type `R`. Anything implementing [`IntoTopics`] is
//! accepted: a single topic, a slice, an array, a `Vec`, or a [`TopicSet`] (which also
//! lets topics of different cardinalities share one subscription).

use std::marker::PhantomData;

use super::{Cardinality, Topic, TopicRef};

/// One or more topics sharing payload `T` and result `R`.
pub trait IntoTopics<T, R> {
    /// Returns the erased topic identities, in the given order.
    fn into_topics(self) -> Vec<TopicRef>;
}

impl<T, R, C: Cardinality> IntoTopics<T, R> for &Topic<T, R, C> {
    fn into_topics(self) -> Vec<TopicRef> {
        vec![self.to_ref()]
    }
}

impl<T, R, C: Cardinality> IntoTopics<T, R> for &[Topic<T, R, C>] {
    fn into_topics(self) -> Vec<TopicRef> {
        self.iter().map(Topic::to_ref).collect()
    }
}

impl<T, R, C: Cardinality, const N: usize> IntoTopics<T, R> for &[Topic<T, R, C>; N] {
    fn into_topics(self) -> Vec<TopicRef> {
        self.iter().map(Topic::to_ref).collect()
    }
}

impl<T, R, C: Cardinality> IntoTopics<T, R> for &Vec<Topic<T, R, C>> {
    fn into_topics(self) -> Vec<TopicRef> {
        self.iter().map(Topic::to_ref).collect()
    }
}

/// Ordered set of topics with a common payload and result type.
///
/// ## Example
/// ```rust
/// use canopy::{IntoTopics, Single, Topic, TopicSet};
///
/// let a: Topic<u32, u32> = Topic::new("a");
/// let b: Topic<u32, u32, Single> = Topic::new("b");
///
/// let set = TopicSet::new().with(&a).with(&b).with(&a);
/// assert_eq!(set.len(), 2);
/// assert_eq!(set.into_topics().len(), 2);
/// ```
pub struct TopicSet<T, R> {
    topics: Vec<TopicRef>,
    _marker: PhantomData<fn(T) -> R>,
}

impl<T, R> TopicSet<T, R> {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            topics: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Adds a topic; a topic already present is ignored.
    #[must_use]
    pub fn with<C: Cardinality>(mut self, topic: &Topic<T, R, C>) -> Self {
        if !self.topics.contains(topic.meta()) {
            self.topics.push(topic.to_ref());
        }
        self
    }

    /// Number of distinct topics.
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// True if no topic was added.
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

impl<T, R> Default for TopicSet<T, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, R> IntoTopics<T, R> for TopicSet<T, R> {
    fn into_topics(self) -> Vec<TopicRef> {
        self.topics
    }
}

/// Drops repeated topics, keeping the first occurrence.
pub(crate) fn dedup(topics: Vec<TopicRef>) -> Vec<TopicRef> {
    let mut out: Vec<TopicRef> = Vec::with_capacity(topics.len());
    for topic in topics {
        if !out.contains(&topic) {
            out.push(topic);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_and_array_keep_order() {
        let topics: [Topic<u8>; 2] = [Topic::new("x"), Topic::new("y")];
        let refs = (&topics).into_topics();
        assert_eq!(refs[0].name(), "x");
        assert_eq!(refs[1].name(), "y");
        assert_eq!(topics[..].into_topics().len(), 2);
    }

    #[test]
    fn test_dedup_keeps_first() {
        let a = Topic::<u8>::new("a");
        let b = Topic::<u8>::new("b");
        let out = dedup(vec![a.to_ref(), b.to_ref(), a.to_ref()]);
        assert_eq!(out, vec![a.to_ref(), b.to_ref()]);
    }
}
