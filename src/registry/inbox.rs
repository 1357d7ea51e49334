//! # Inbox: lazy, consumer-pulled subscription.
//!
//! An inbox is validated when it is created but only registered on its first pull.
//! Until then it receives nothing and does not appear in the registry.
//!
//! ## Flow
//! ```text
//! delivery ──► waiting receiver?  ── yes ──► hand over directly
//!                      │
//!                      no ──► backlog (FIFO)
//!
//! recv() ──► backlog non-empty? ── yes ──► oldest item
//!                      │
//!                      no ──► disposed? ── yes ──► None
//!                                  │
//!                                  no ──► wait for delivery or disposal
//! ```

use std::collections::VecDeque;
use std::convert::Infallible;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::BusError;
use crate::handlers::{sync_handler, HandlerFn};

use super::Registration;

pub(crate) struct Queue<T> {
    backlog: VecDeque<T>,
    waiting: VecDeque<oneshot::Sender<T>>,
}

impl<T> Queue<T> {
    fn push(&mut self, mut item: T) {
        while let Some(waiter) = self.waiting.pop_front() {
            match waiter.send(item) {
                Ok(()) => return,
                Err(back) => item = back,
            }
        }
        self.backlog.push_back(item);
    }
}

pub(crate) type SharedQueue<T> = Arc<Mutex<Queue<T>>>;

/// Handler that pushes each delivered payload into `queue`.
pub(crate) fn queue_handler<T>() -> (HandlerFn, SharedQueue<T>)
where
    T: Clone + Send + Sync + 'static,
{
    let queue: SharedQueue<T> = Arc::new(Mutex::new(Queue {
        backlog: VecDeque::new(),
        waiting: VecDeque::new(),
    }));
    let sink = Arc::clone(&queue);
    let handler = sync_handler(move |item: T| {
        sink.lock().push(item);
        Ok::<_, Infallible>(())
    });
    (handler, queue)
}

/// Pull-based subscription returned by [`Bus::inbox`](crate::Bus::inbox).
///
/// The first [`recv`](Inbox::recv) registers the inbox on its bus. Dropping the inbox
/// disposes it.
///
/// ## Example
/// ```rust
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), canopy::BusError> {
/// use std::sync::Arc;
/// use canopy::{Bus, Topic};
///
/// let bus = Bus::new();
/// let ticks: Topic<u32> = Topic::new("ticks");
///
/// let inbox = Arc::new(bus.with_limit(2).inbox(&ticks)?);
/// let consumer = {
///     let inbox = Arc::clone(&inbox);
///     tokio::spawn(async move {
///         let a = inbox.recv().await;
///         let b = inbox.recv().await;
///         let c = inbox.recv().await;
///         (a, b, c)
///     })
/// };
///
/// // Nothing is delivered until the first pull registers the inbox.
/// while !inbox.is_active() {
///     tokio::task::yield_now().await;
/// }
/// bus.publish(&ticks, 1)?;
/// bus.publish(&ticks, 2)?;
/// bus.publish(&ticks, 3)?;
///
/// assert_eq!(consumer.await.unwrap(), (Some(1), Some(2), None));
/// # Ok(())
/// # }
/// ```
pub struct Inbox<T> {
    registration: Arc<Registration>,
    queue: SharedQueue<T>,
    started: AtomicBool,
}

impl<T> Inbox<T>
where
    T: Send + 'static,
{
    pub(crate) fn new(registration: Arc<Registration>, queue: SharedQueue<T>) -> Self {
        Self {
            registration,
            queue,
            started: AtomicBool::new(false),
        }
    }

    /// Registers the inbox now instead of on the first pull.
    pub(crate) fn start(&self) -> Result<(), BusError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.registration.activate().inspect_err(|_| self.registration.dispose())
    }

    /// Receives the next payload.
    ///
    /// Returns `None` once the inbox is disposed and its backlog is empty. Items already
    /// buffered when the limit is reached are still returned. If the first pull cannot
    /// register the inbox, the failure is logged and `None` is returned; use
    /// [`try_recv`](Inbox::try_recv) to observe it.
    pub async fn recv(&self) -> Option<T> {
        match self.try_recv().await {
            Ok(item) => item,
            Err(err) => {
                tracing::warn!(error = %err, label = err.as_label(), "inbox could not subscribe");
                None
            }
        }
    }

    /// Like [`recv`](Inbox::recv), but surfaces the registration failure of the first pull.
    ///
    /// # Errors
    /// [`BusError::SingleSubscriber`] or [`BusError::Disposed`] from the pull that registers
    /// the inbox. Later pulls on an inbox that failed to register return `Ok(None)`.
    pub async fn try_recv(&self) -> Result<Option<T>, BusError> {
        self.start()?;

        let rx = {
            let mut queue = self.queue.lock();
            if let Some(item) = queue.backlog.pop_front() {
                return Ok(Some(item));
            }
            if self.registration.is_disposed() {
                return Ok(None);
            }
            let (tx, rx) = oneshot::channel();
            queue.waiting.push_back(tx);
            rx
        };

        let closed = self.registration.closed().clone();
        Ok(tokio::select! {
            biased;
            item = rx => item.ok(),
            _ = closed.cancelled() => None,
        })
    }

    /// Turns the inbox into a stream that ends when the inbox is disposed.
    pub fn into_stream(self) -> impl Stream<Item = T> {
        futures::stream::unfold(self, |inbox| async move {
            let item = inbox.recv().await?;
            Some((item, inbox))
        })
    }

    /// Disposes the inbox; pending and future `recv` calls return `None`
    /// once the backlog is drained.
    pub fn dispose(&self) {
        self.registration.dispose();
    }

    /// True once disposed.
    pub fn is_disposed(&self) -> bool {
        self.registration.is_disposed()
    }

    /// True once the first pull registered the inbox and until it is disposed.
    pub fn is_active(&self) -> bool {
        self.registration.is_active()
    }

    /// Number of payloads received but not pulled yet.
    pub fn backlog(&self) -> usize {
        self.queue.lock().backlog.len()
    }
}

impl<T> Drop for Inbox<T> {
    fn drop(&mut self) {
        self.registration.dispose();
    }
}

impl<T> fmt::Debug for Inbox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inbox")
            .field("id", &self.registration.id())
            .field("active", &self.registration.is_active())
            .field("disposed", &self.registration.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_prefers_live_waiters_then_backlog() {
        let (_handler, queue) = queue_handler::<u32>();
        let mut q = queue.lock();

        let (dead_tx, dead_rx) = oneshot::channel();
        drop(dead_rx);
        let (live_tx, mut live_rx) = oneshot::channel();
        q.waiting.push_back(dead_tx);
        q.waiting.push_back(live_tx);

        q.push(1);
        q.push(2);

        assert_eq!(live_rx.try_recv().unwrap(), 1);
        assert!(q.waiting.is_empty());
        assert_eq!(q.backlog, VecDeque::from(vec![2]));
    }
}
