//! # Dispatch pipeline: drains a mailbox and delivers one message at a time.
//!
//! For every envelope, in mailbox order:
//! ```text
//! disposed? ──► drop (an awaiting publisher sees `PublishError::Dropped`)
//! veto      ──► vetoed: stop (awaited: `Vetoed`); veto panicked: report `Interceptor`
//! lookup    ──► active registrations, ascending priority, stable
//! listeners ──► only where `publish` was called
//! broadcast ──► Children: copy to every child (recursive) | Parent: copy to the parent (one hop)
//! invoke    ──► each registration through the interceptor chain, panics isolated
//! settle    ──► fire-and-forget: errors → error callback
//!               awaited: local outcomes, then each broadcast branch, in order → reply
//! ```
//!
//! Synchronous handlers finish inside the drain turn. Pending replies are driven by
//! spawned tasks, so they never hold back the mailbox.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use tokio::sync::oneshot;

use crate::error::{panic_message, BoxError, DispatchError};
use crate::handlers::Reply;
use crate::listeners::announce;
use crate::message::{Envelope, Message, Outcome};
use crate::topics::{Direction, TopicRef};

use super::bus::BusInner;

type Branch = oneshot::Receiver<Vec<Outcome>>;

/// Result of one registration, possibly still running.
enum Step {
    Done(Outcome),
    Running(BoxFuture<'static, Outcome>),
}

impl Step {
    fn from_reply(topic: &TopicRef, reply: Reply) -> Self {
        match reply {
            Reply::Ready(result) => Step::Done(result.map_err(|err| failure(topic, err))),
            Reply::Pending(fut) => {
                let topic = topic.clone();
                Step::Running(
                    AssertUnwindSafe(fut)
                        .catch_unwind()
                        .map(move |res| match res {
                            Ok(Ok(value)) => Ok(value),
                            Ok(Err(err)) => Err(failure(&topic, err)),
                            Err(panic) => Err(DispatchError::panicked(&topic, &*panic)),
                        })
                        .boxed(),
                )
            }
        }
    }

    fn into_future(self) -> BoxFuture<'static, Outcome> {
        match self {
            Step::Done(outcome) => futures::future::ready(outcome).boxed(),
            Step::Running(fut) => fut,
        }
    }
}

/// Keeps dispatch failures raised by adapters (e.g. payload type) as they are.
fn failure(topic: &TopicRef, err: BoxError) -> DispatchError {
    match err.downcast::<DispatchError>() {
        Ok(err) => *err,
        Err(err) => DispatchError::handler(topic, err),
    }
}

impl BusInner {
    /// Appends `envelope` to the mailbox; returns `false` if the bus is disposed.
    pub(crate) fn enqueue(self: &Arc<Self>, envelope: Envelope) -> bool {
        let schedule = {
            let mut mailbox = self.mailbox.lock();
            if self.is_disposed() {
                return false;
            }
            mailbox.queue.push_back(envelope);
            !std::mem::replace(&mut mailbox.scheduled, true)
        };
        if schedule {
            self.scheduler.schedule(Arc::clone(self));
        }
        true
    }

    /// Dispatches queued mail until the mailbox is empty, including mail added meanwhile.
    pub(crate) fn drain(self: &Arc<Self>) {
        loop {
            let next = {
                let mut mailbox = self.mailbox.lock();
                match mailbox.queue.pop_front() {
                    Some(envelope) => envelope,
                    None => {
                        mailbox.scheduled = false;
                        return;
                    }
                }
            };
            self.dispatch(next);
        }
    }

    fn dispatch(self: &Arc<Self>, mut envelope: Envelope) {
        if self.is_disposed() {
            return;
        }
        let reply = envelope.reply.take();
        let message = envelope.view();
        let topic = message.topic();

        let chain = self.interceptors.lock().chain();
        match catch_unwind(AssertUnwindSafe(|| chain.vetoes(&message))) {
            Ok(false) => {}
            Ok(true) => {
                tracing::trace!(bus = self.id, topic = %topic, "message vetoed");
                if let Some(reply) = reply {
                    let _ = reply.send(vec![Err(DispatchError::Vetoed {
                        topic: topic.clone(),
                    })]);
                }
                return;
            }
            Err(panic) => {
                let err = DispatchError::Interceptor {
                    topic: topic.clone(),
                    reason: panic_message(&*panic),
                };
                match reply {
                    Some(reply) => {
                        let _ = reply.send(vec![Err(err)]);
                    }
                    None => self.report(err),
                }
                return;
            }
        }

        self.prune(topic);
        let registrations = self.registry.lock().active_for(topic);

        if envelope.notify {
            let listeners = self.listeners.lock().snapshot();
            announce(&listeners, &message, registrations.len(), |err| self.report(err));
        }

        let branches = if envelope.broadcast {
            self.broadcast(&envelope, reply.is_some())
        } else {
            Vec::new()
        };

        let mut steps = Vec::with_capacity(registrations.len());
        for registration in &registrations {
            match catch_unwind(AssertUnwindSafe(|| registration.deliver(&message, &chain))) {
                Ok(Some(reply)) => steps.push(Step::from_reply(topic, reply)),
                Ok(None) => {}
                Err(panic) => steps.push(Step::Done(Err(DispatchError::panicked(topic, &*panic)))),
            }
        }

        match reply {
            Some(reply) => self.settle(steps, branches, reply),
            None => self.settle_detached(steps),
        }
    }

    /// Forwards a copy to the targets of the topic's direction.
    fn broadcast(self: &Arc<Self>, envelope: &Envelope, awaited: bool) -> Vec<Branch> {
        let (targets, recursive) = match envelope.topic.direction() {
            Direction::Children => (self.children.lock().clone(), true),
            Direction::Parent => (self.parent().into_iter().collect(), false),
        };

        let mut branches = Vec::new();
        for target in targets {
            let reply = if awaited {
                let (tx, rx) = oneshot::channel();
                branches.push(rx);
                Some(tx)
            } else {
                None
            };
            target.enqueue(envelope.forwarded(recursive, reply));
        }
        branches
    }

    fn settle(&self, steps: Vec<Step>, branches: Vec<Branch>, reply: oneshot::Sender<Vec<Outcome>>) {
        if branches.is_empty() && steps.iter().all(|s| matches!(s, Step::Done(_))) {
            let outcomes = steps
                .into_iter()
                .filter_map(|s| match s {
                    Step::Done(outcome) => Some(outcome),
                    Step::Running(_) => None,
                })
                .collect();
            let _ = reply.send(outcomes);
            return;
        }

        let local = join_all(steps.into_iter().map(Step::into_future));
        tokio::spawn(async move {
            let mut outcomes = local.await;
            for branch in branches {
                // A closed branch is a target disposed before dispatch: nothing to add.
                if let Ok(more) = branch.await {
                    outcomes.extend(more);
                }
            }
            let _ = reply.send(outcomes);
        });
    }

    fn settle_detached(&self, steps: Vec<Step>) {
        for step in steps {
            match step {
                Step::Done(Ok(_)) => {}
                Step::Done(Err(err)) => self.report(err),
                Step::Running(fut) => {
                    let on_error = Arc::clone(&self.on_error);
                    tokio::spawn(async move {
                        if let Err(err) = fut.await {
                            super::config::report(&on_error, err);
                        }
                    });
                }
            }
        }
    }
}
