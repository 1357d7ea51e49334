//! # Per-bus registry: topic → registrations.
//!
//! The registry is plain data guarded by the bus. It is mutated by subscribe, dispose
//! and registration disposal, and read by the drain turn of its bus.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::topics::TopicRef;

use super::Registration;

/// Active registrations of one bus, grouped by topic in registration order.
#[derive(Default)]
pub(crate) struct Registry {
    slots: HashMap<TopicRef, Vec<Arc<Registration>>>,
    closed: bool,
}

impl Registry {
    /// Adds `registration` under `topic`.
    ///
    /// # Panics
    /// If the same registration is already stored under `topic`.
    pub(crate) fn register(&mut self, topic: &TopicRef, registration: Arc<Registration>) {
        let slot = self.slots.entry(topic.clone()).or_default();
        assert!(
            !slot.iter().any(|r| r.id() == registration.id()),
            "registration #{} is already registered on topic {topic:?}",
            registration.id()
        );
        slot.push(registration);
    }

    /// Removes the registration with `id` from `topic`, keeping the order of the others.
    ///
    /// # Panics
    /// If the registration is not stored under `topic`.
    pub(crate) fn unregister(&mut self, topic: &TopicRef, id: u64) {
        let Some(slot) = self.slots.get_mut(topic) else {
            panic!("topic {topic:?} has no registrations, cannot remove #{id}");
        };
        let Some(pos) = slot.iter().position(|r| r.id() == id) else {
            panic!("registration #{id} is not registered on topic {topic:?}");
        };
        slot.remove(pos);
        if slot.is_empty() {
            self.slots.remove(topic);
        }
    }

    /// Active registrations for `topic`, ascending priority; equal priorities keep
    /// registration order.
    pub(crate) fn active_for(&self, topic: &TopicRef) -> Vec<Arc<Registration>> {
        let mut list: Vec<Arc<Registration>> = self
            .slots
            .get(topic)
            .map(|slot| {
                slot.iter()
                    .filter(|r| r.is_active() && r.is_alive())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        list.sort_by_key(|r| r.priority());
        list
    }

    /// Registrations under `topic` whose owner is gone; the caller disposes them
    /// once the registry lock is released.
    pub(crate) fn orphans(&self, topic: &TopicRef) -> Vec<Arc<Registration>> {
        self.slots
            .get(topic)
            .map(|slot| slot.iter().filter(|r| !r.is_alive()).cloned().collect())
            .unwrap_or_default()
    }

    /// True if any registration is stored under `topic`.
    pub(crate) fn contains(&self, topic: &TopicRef) -> bool {
        self.slots.get(topic).is_some_and(|slot| !slot.is_empty())
    }

    /// Number of registrations stored under `topic`.
    pub(crate) fn count(&self, topic: &TopicRef) -> usize {
        self.slots.get(topic).map_or(0, Vec::len)
    }

    /// Total number of (topic, registration) entries.
    pub(crate) fn len(&self) -> usize {
        self.slots.values().map(Vec::len).sum()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    /// Empties the registry for good and returns every distinct registration it held.
    pub(crate) fn close(&mut self) -> Vec<Arc<Registration>> {
        self.closed = true;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for (_, slot) in self.slots.drain() {
            for registration in slot {
                if seen.insert(registration.id()) {
                    out.push(registration);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Sink, Terms};
    use crate::topics::Topic;
    use crate::Reply;
    use std::sync::Weak;

    fn registration(topics: &[TopicRef], priority: i32) -> Arc<Registration> {
        let registration = Registration::new(
            Weak::new(),
            topics.to_vec(),
            Terms {
                priority,
                limit: None,
            },
            Sink::Handler(Arc::new(|_: &crate::Message<'_>| Reply::value(()))),
            None,
        );
        registration.mark_active();
        Arc::new(registration)
    }

    #[test]
    fn test_active_for_is_stable_by_priority() {
        let topic = Topic::<u8>::new("t").to_ref();
        let mut registry = Registry::default();
        let a = registration(&[topic.clone()], 1);
        let b = registration(&[topic.clone()], 0);
        let c = registration(&[topic.clone()], 1);
        for r in [&a, &b, &c] {
            registry.register(&topic, Arc::clone(r));
        }

        let ids: Vec<u64> = registry.active_for(&topic).iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec![b.id(), a.id(), c.id()]);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_duplicate_register_panics() {
        let topic = Topic::<u8>::new("t").to_ref();
        let mut registry = Registry::default();
        let a = registration(&[topic.clone()], 0);
        registry.register(&topic, Arc::clone(&a));
        registry.register(&topic, a);
    }

    #[test]
    #[should_panic(expected = "is not registered")]
    fn test_unregister_missing_panics() {
        let topic = Topic::<u8>::new("t").to_ref();
        let mut registry = Registry::default();
        let a = registration(&[topic.clone()], 0);
        let b = registration(&[topic.clone()], 0);
        registry.register(&topic, a);
        registry.unregister(&topic, b.id());
    }

    #[test]
    fn test_close_returns_each_registration_once() {
        let x = Topic::<u8>::new("x").to_ref();
        let y = Topic::<u8>::new("y").to_ref();
        let mut registry = Registry::default();
        let both = registration(&[x.clone(), y.clone()], 0);
        registry.register(&x, Arc::clone(&both));
        registry.register(&y, Arc::clone(&both));
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(&y));

        let drained = registry.close();
        assert_eq!(drained.len(), 1);
        assert!(registry.is_closed());
        assert_eq!(registry.count(&x), 0);
    }
}
