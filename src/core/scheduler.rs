//! # Scheduler: one drain turn at a time per hierarchy.
//!
//! Every bus of a hierarchy shares the scheduler of its root. A bus with pending mail
//! is queued here once; a single spawned turn drains queued buses in order until the
//! run-queue is empty, then goes idle.
//!
//! ```text
//! publish ──► mailbox.push ──► first mail? ──► ready.push(bus) ──► idle? ──► tokio::spawn(turn)
//!
//! turn: loop {
//!   bus = ready.pop()  ── none ──► running = false, wake flush() waiters, exit
//!   bus.drain()        (may push more buses, including itself)
//! }
//! ```
//!
//! The scheduler also owns the membership lock that serializes single-cardinality
//! checks with registry inserts across the whole tree.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::bus::BusInner;

#[derive(Default)]
struct RunQueue {
    ready: VecDeque<Arc<BusInner>>,
    running: bool,
}

#[derive(Default)]
pub(crate) struct Scheduler {
    queue: Mutex<RunQueue>,
    idle: Notify,
    /// Held across the tree-wide single-cardinality scan and the registry insert.
    pub(crate) membership: Mutex<()>,
}

impl Scheduler {
    /// Queues `bus` for draining, starting a turn if none is running.
    ///
    /// Must be called from within a Tokio runtime.
    pub(crate) fn schedule(self: &Arc<Self>, bus: Arc<BusInner>) {
        let start = {
            let mut queue = self.queue.lock();
            queue.ready.push_back(bus);
            !std::mem::replace(&mut queue.running, true)
        };
        if start {
            let me = Arc::clone(self);
            tokio::spawn(async move { me.turn() });
        }
    }

    fn turn(&self) {
        loop {
            let next = {
                let mut queue = self.queue.lock();
                match queue.ready.pop_front() {
                    Some(bus) => bus,
                    None => {
                        queue.running = false;
                        break;
                    }
                }
            };
            next.drain();
        }
        self.idle.notify_waiters();
    }

    pub(crate) fn is_idle(&self) -> bool {
        !self.queue.lock().running
    }

    /// Resolves once no turn is running.
    pub(crate) async fn idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }
}
