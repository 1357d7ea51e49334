//! Error types used by the bus, the dispatch pipeline, and awaited publishes.
//!
//! This module defines four error types:
//!
//! - [`BusError`]: validation failures raised synchronously at the call site.
//! - [`DispatchError`]: one isolated failure of a handler, listener, or interceptor.
//! - [`PublishError`]: the outcome of an awaited publish that did not produce values.
//! - [`AggregateError`]: more than one [`DispatchError`] from one awaited publish.
//!
//! All enums provide `as_label` for logs/metrics.

use std::any::Any;
use std::fmt;

use thiserror::Error;

use crate::topics::TopicRef;

/// Boxed error returned by user handlers, listeners and interceptors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// # Validation errors raised by bus operations.
///
/// These are always returned synchronously by the offending call; nothing is enqueued
/// or registered when one of them is produced.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The bus was disposed; no further mutation or publishing is possible.
    #[error("bus is disposed")]
    Disposed,

    /// A subscription limit must be greater than zero.
    #[error("subscription limit must be greater than zero, got {limit}")]
    InvalidLimit {
        /// The rejected limit.
        limit: usize,
    },

    /// A subscribe call was given an empty topic list.
    #[error("at least one topic is required")]
    EmptyTopics,

    /// A single-cardinality topic already has a subscriber somewhere in this hierarchy.
    #[error("topic '{topic}' allows a single subscriber and already has one in this hierarchy")]
    SingleSubscriber {
        /// The topic that rejected the subscription.
        topic: TopicRef,
    },

    /// Publishing needs a Tokio runtime to run the dispatch turn, and none is entered.
    #[error("publishing requires a running Tokio runtime")]
    NoRuntime,
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use canopy::BusError;
    ///
    /// assert_eq!(BusError::Disposed.as_label(), "bus_disposed");
    /// assert_eq!(BusError::InvalidLimit { limit: 0 }.as_label(), "bus_invalid_limit");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::Disposed => "bus_disposed",
            BusError::InvalidLimit { .. } => "bus_invalid_limit",
            BusError::EmptyTopics => "bus_empty_topics",
            BusError::SingleSubscriber { .. } => "bus_single_subscriber",
            BusError::NoRuntime => "bus_no_runtime",
        }
    }
}

/// # One isolated failure during dispatch.
///
/// Fire-and-forget publishes hand each of these to the bus error callback, one at a time.
/// Awaited publishes return them to the publisher instead (see [`PublishError`]).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DispatchError {
    /// A subscriber handler (or an interceptor layer wrapping it) returned an error.
    #[error("handler on topic '{topic}' failed: {source}")]
    Handler {
        /// Topic of the message being delivered.
        topic: TopicRef,
        /// The error returned by the handler.
        #[source]
        source: BoxError,
    },

    /// An all-messages listener returned an error or panicked.
    #[error("listener '{listener}' failed on topic '{topic}': {reason}")]
    Listener {
        /// Topic of the message being announced.
        topic: TopicRef,
        /// Listener name, see [`Listen::name`](crate::Listen::name).
        listener: &'static str,
        /// Error message or panic payload.
        reason: String,
    },

    /// A veto check panicked; the message was not delivered.
    #[error("veto check on topic '{topic}' panicked: {reason}")]
    Interceptor {
        /// Topic of the suppressed message.
        topic: TopicRef,
        /// Panic payload.
        reason: String,
    },

    /// A handler or interceptor layer panicked.
    #[error("handler on topic '{topic}' panicked: {reason}")]
    Panicked {
        /// Topic of the message being delivered.
        topic: TopicRef,
        /// Panic payload.
        reason: String,
    },

    /// A handler received a payload of an unexpected type (an interceptor replaced it).
    #[error("handler on topic '{topic}' expected payload of type {expected}")]
    PayloadType {
        /// Topic of the message being delivered.
        topic: TopicRef,
        /// The payload type the handler was registered for.
        expected: &'static str,
    },

    /// A handler produced a value of an unexpected type for an awaited publish.
    #[error("handler on topic '{topic}' returned a value that is not {expected}")]
    ResultType {
        /// Topic of the message being delivered.
        topic: TopicRef,
        /// The result type the publisher expected.
        expected: &'static str,
    },

    /// An interceptor on a broadcast target vetoed the message.
    #[error("message on topic '{topic}' was vetoed")]
    Vetoed {
        /// Topic of the vetoed message.
        topic: TopicRef,
    },
}

impl DispatchError {
    pub(crate) fn handler(topic: &TopicRef, source: BoxError) -> Self {
        DispatchError::Handler {
            topic: topic.clone(),
            source,
        }
    }

    pub(crate) fn panicked(topic: &TopicRef, payload: &(dyn Any + Send)) -> Self {
        DispatchError::Panicked {
            topic: topic.clone(),
            reason: panic_message(payload),
        }
    }

    /// Returns the topic of the message that failed.
    pub fn topic(&self) -> &TopicRef {
        match self {
            DispatchError::Handler { topic, .. }
            | DispatchError::Listener { topic, .. }
            | DispatchError::Interceptor { topic, .. }
            | DispatchError::Panicked { topic, .. }
            | DispatchError::PayloadType { topic, .. }
            | DispatchError::ResultType { topic, .. }
            | DispatchError::Vetoed { topic } => topic,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::Handler { .. } => "dispatch_handler_failed",
            DispatchError::Listener { .. } => "dispatch_listener_failed",
            DispatchError::Interceptor { .. } => "dispatch_interceptor_failed",
            DispatchError::Panicked { .. } => "dispatch_handler_panicked",
            DispatchError::PayloadType { .. } => "dispatch_payload_type",
            DispatchError::ResultType { .. } => "dispatch_result_type",
            DispatchError::Vetoed { .. } => "dispatch_vetoed",
        }
    }
}

/// Several failures collected from one awaited publish, in invocation order.
#[derive(Debug)]
pub struct AggregateError {
    errors: Vec<DispatchError>,
}

impl AggregateError {
    pub(crate) fn new(errors: Vec<DispatchError>) -> Self {
        Self { errors }
    }

    /// Individual failures, in invocation order.
    pub fn errors(&self) -> &[DispatchError] {
        &self.errors
    }

    /// Consumes the aggregate, returning the individual failures.
    pub fn into_errors(self) -> Vec<DispatchError> {
        self.errors
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} handlers failed", self.errors.len())?;
        for (i, err) in self.errors.iter().enumerate() {
            write!(f, "; [{i}] {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

/// # Failure of an awaited publish.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PublishError {
    /// An interceptor on the publishing bus vetoed the message; nothing was delivered.
    #[error("publish on topic '{topic}' was vetoed")]
    Vetoed {
        /// Topic of the vetoed message.
        topic: TopicRef,
    },

    /// A single-cardinality topic had no subscriber to answer.
    #[error("no subscribers for topic '{topic}'")]
    NoSubscribers {
        /// Topic without subscribers.
        topic: TopicRef,
    },

    /// A single-cardinality topic produced more than one value.
    #[error("topic '{topic}' allows a single subscriber but produced {count} values")]
    Ambiguous {
        /// Topic that produced too many values.
        topic: TopicRef,
        /// Number of values produced.
        count: usize,
    },

    /// Exactly one handler failed.
    #[error(transparent)]
    Failed(DispatchError),

    /// More than one handler failed.
    #[error(transparent)]
    Aggregate(AggregateError),

    /// The bus was disposed before the message was dispatched.
    #[error("bus was disposed before the message was dispatched")]
    Dropped,
}

impl PublishError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            PublishError::Vetoed { .. } => "publish_vetoed",
            PublishError::NoSubscribers { .. } => "publish_no_subscribers",
            PublishError::Ambiguous { .. } => "publish_ambiguous",
            PublishError::Failed(_) => "publish_failed",
            PublishError::Aggregate(_) => "publish_aggregate",
            PublishError::Dropped => "publish_dropped",
        }
    }
}

impl From<DispatchError> for PublishError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Vetoed { topic } => PublishError::Vetoed { topic },
            other => PublishError::Failed(other),
        }
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topics::Topic;

    #[test]
    fn test_panic_message_variants() {
        let s: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*s), "boom");
        let s: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*s), "bang");
        let s: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(&*s), "unknown panic");
    }

    #[test]
    fn test_vetoed_dispatch_maps_to_publish_vetoed() {
        let topic = Topic::<u32>::new("orders");
        let err: PublishError = DispatchError::Vetoed {
            topic: topic.to_ref(),
        }
        .into();
        assert!(matches!(err, PublishError::Vetoed { .. }));
        assert_eq!(err.as_label(), "publish_vetoed");
    }

    #[test]
    fn test_aggregate_display_lists_errors_in_order() {
        let topic = Topic::<u32>::new("jobs").to_ref();
        let agg = AggregateError::new(vec![
            DispatchError::handler(&topic, "first".into()),
            DispatchError::handler(&topic, "second".into()),
        ]);
        let text = agg.to_string();
        assert!(text.starts_with("2 handlers failed"));
        assert!(text.find("first").unwrap() < text.find("second").unwrap());
    }
}
