//! # Chain builder: composes interceptors into one veto check and one wrapper.

use std::sync::Arc;

use crate::handlers::{HandlerFn, Reply};
use crate::message::Message;

use super::interceptor::{InterceptorRef, Next};

/// Composed handler wrapper.
pub(crate) type Wrap = Arc<dyn Fn(&Message<'_>, &HandlerFn) -> Reply + Send + Sync>;

type Veto = Arc<dyn Fn(&Message<'_>) -> bool + Send + Sync>;

/// Interceptors of one bus composed into nested functions.
pub(crate) struct Chain {
    veto: Veto,
    wrap: Wrap,
}

impl Chain {
    /// Composes `interceptors` (oldest first): every layer wraps the ones added before it.
    pub(crate) fn compose(interceptors: &[InterceptorRef]) -> Self {
        let mut veto: Veto = Arc::new(|_: &Message<'_>| false);
        let mut wrap: Wrap = Arc::new(|message: &Message<'_>, handler: &HandlerFn| handler(message));

        for interceptor in interceptors {
            let inner = veto;
            let layer = Arc::clone(interceptor);
            veto = Arc::new(move |message: &Message<'_>| layer.veto(message) || inner(message));

            let inner = wrap;
            let layer = Arc::clone(interceptor);
            wrap = Arc::new(move |message: &Message<'_>, handler: &HandlerFn| {
                let next = Next {
                    inner: &inner,
                    handler,
                    message: *message,
                };
                layer.wrap(message, next)
            });
        }

        Self { veto, wrap }
    }

    /// Asks every interceptor, most recently added first.
    pub(crate) fn vetoes(&self, message: &Message<'_>) -> bool {
        (self.veto)(message)
    }

    /// Invokes `handler` through every wrapping layer.
    pub(crate) fn call(&self, message: &Message<'_>, handler: &HandlerFn) -> Reply {
        (self.wrap)(message, handler)
    }
}

/// Interceptors registered on a bus plus the cached composition.
#[derive(Default)]
pub(crate) struct InterceptorSet {
    items: Vec<InterceptorRef>,
    composed: Option<Arc<Chain>>,
}

impl InterceptorSet {
    /// Adds an interceptor; adding the same one twice is a no-op.
    pub(crate) fn add(&mut self, interceptor: InterceptorRef) {
        if !self.items.iter().any(|i| Arc::ptr_eq(i, &interceptor)) {
            self.items.push(interceptor);
            self.composed = None;
        }
    }

    /// Removes an interceptor by identity; returns `false` if it was not present.
    pub(crate) fn remove(&mut self, interceptor: &InterceptorRef) -> bool {
        let before = self.items.len();
        self.items.retain(|i| !Arc::ptr_eq(i, interceptor));
        let removed = self.items.len() != before;
        if removed {
            self.composed = None;
        }
        removed
    }

    /// Returns the composed chain, rebuilding it if the set changed.
    pub(crate) fn chain(&mut self) -> Arc<Chain> {
        if let Some(chain) = &self.composed {
            return Arc::clone(chain);
        }
        let chain = Arc::new(Chain::compose(&self.items));
        self.composed = Some(Arc::clone(&chain));
        chain
    }

    /// Copy used to seed a child bus.
    pub(crate) fn snapshot(&self) -> Self {
        Self {
            items: self.items.clone(),
            composed: self.composed.clone(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
        self.composed = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptors::{veto_fn, wrap_fn};
    use crate::message::Payload;
    use crate::topics::Topic;
    use parking_lot::Mutex;

    fn recording_layer(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> InterceptorRef {
        wrap_fn(name, move |_msg, next| {
            log.lock().push(format!("{name}:before"));
            let reply = next.run();
            log.lock().push(format!("{name}:after"));
            reply
        })
    }

    #[test]
    fn test_most_recent_interceptor_is_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut set = InterceptorSet::default();
        set.add(recording_layer("a", log.clone()));
        set.add(recording_layer("b", log.clone()));

        let topic = Topic::<u32>::new("t").to_ref();
        let payload: Payload = Arc::new(1u32);
        let handler_log = log.clone();
        let handler: HandlerFn = Arc::new(move |_: &Message<'_>| {
            handler_log.lock().push("handler".into());
            Reply::value(())
        });

        set.chain().call(&Message::new(&topic, &payload), &handler);

        assert_eq!(
            *log.lock(),
            vec!["b:before", "a:before", "handler", "a:after", "b:after"]
        );
    }

    #[test]
    fn test_veto_asks_most_recent_first_and_short_circuits() {
        let asked = Arc::new(Mutex::new(Vec::new()));
        let mut set = InterceptorSet::default();

        let a = asked.clone();
        set.add(veto_fn("a", move |_| {
            a.lock().push("a");
            false
        }));
        let b = asked.clone();
        set.add(veto_fn("b", move |_| {
            b.lock().push("b");
            true
        }));

        let topic = Topic::<u32>::new("t").to_ref();
        let payload: Payload = Arc::new(1u32);
        assert!(set.chain().vetoes(&Message::new(&topic, &payload)));
        assert_eq!(*asked.lock(), vec!["b"]);
    }

    #[test]
    fn test_chain_is_rebuilt_after_change() {
        let mut set = InterceptorSet::default();
        let first = set.chain();
        assert!(Arc::ptr_eq(&first, &set.chain()));

        let layer: InterceptorRef = veto_fn("all", |_| true);
        set.add(layer.clone());
        let second = set.chain();
        assert!(!Arc::ptr_eq(&first, &second));

        assert!(set.remove(&layer));
        assert!(!set.remove(&layer));
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn test_run_with_replaces_payload() {
        let mut set = InterceptorSet::default();
        set.add(wrap_fn("double", |msg, next| {
            let n = *msg.payload::<u32>().unwrap();
            next.run_with(Arc::new(n * 2))
        }));

        let topic = Topic::<u32, u32>::new("t").to_ref();
        let payload: Payload = Arc::new(21u32);
        let handler: HandlerFn =
            Arc::new(|msg: &Message<'_>| Reply::value(*msg.payload::<u32>().unwrap()));

        match set.chain().call(&Message::new(&topic, &payload), &handler) {
            Reply::Ready(Ok(v)) => assert_eq!(*v.downcast::<u32>().unwrap(), 42),
            other => panic!("unexpected reply: {other:?}"),
        }
    }
}
