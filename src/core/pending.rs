//! # Pending: the future returned by awaited publishes.
//!
//! Resolution rules, applied to the outcomes collected in invocation order
//! (local registrations first, then each broadcast branch):
//! ```text
//! 0 failures ──► Multi:  Ok(Vec<R>)
//!                Single: Ok(R) | NoSubscribers (0 values) | Ambiguous (> 1 value)
//! 1 failure  ──► Err(Failed(err))   (a veto is reported as Err(Vetoed))
//! n failures ──► Err(Aggregate([err, ...]))
//! bus disposed before dispatch ──► Err(Dropped)
//! ```

use std::any::type_name;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{AggregateError, DispatchError, PublishError};
use crate::message::Outcome;
use crate::topics::{Cardinality, TopicRef};

/// Result of [`Bus::publish_await`](crate::Bus::publish_await).
///
/// Dropping it does not cancel delivery; the results are discarded.
#[must_use = "the results of an awaited publish are discarded unless it is awaited"]
pub struct Pending<R, C> {
    topic: TopicRef,
    rx: oneshot::Receiver<Vec<Outcome>>,
    _marker: PhantomData<fn() -> (R, C)>,
}

impl<R, C> Pending<R, C> {
    pub(crate) fn new(topic: TopicRef, rx: oneshot::Receiver<Vec<Outcome>>) -> Self {
        Self {
            topic,
            rx,
            _marker: PhantomData,
        }
    }
}

impl<R: 'static, C: Cardinality> Future for Pending<R, C> {
    type Output = Result<C::Output<R>, PublishError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Err(_)) => Poll::Ready(Err(PublishError::Dropped)),
            Poll::Ready(Ok(outcomes)) => Poll::Ready(resolve::<R, C>(&this.topic, outcomes)),
        }
    }
}

fn resolve<R: 'static, C: Cardinality>(
    topic: &TopicRef,
    outcomes: Vec<Outcome>,
) -> Result<C::Output<R>, PublishError> {
    let mut values = Vec::with_capacity(outcomes.len());
    let mut errors = Vec::new();
    for outcome in outcomes {
        match outcome.map(|value| value.downcast::<R>()) {
            Ok(Ok(value)) => values.push(*value),
            Ok(Err(_)) => errors.push(DispatchError::ResultType {
                topic: topic.clone(),
                expected: type_name::<R>(),
            }),
            Err(err) => errors.push(err),
        }
    }

    match errors.len() {
        0 => C::collect(topic, values),
        1 => Err(errors.remove(0).into()),
        _ => Err(PublishError::Aggregate(AggregateError::new(errors))),
    }
}

impl<R, C> fmt::Debug for Pending<R, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending").field("topic", &self.topic).finish()
    }
}
