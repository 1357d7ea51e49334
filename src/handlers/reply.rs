use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::BoxError;
use crate::message::Message;

/// Type-erased handler result.
pub type Value = Box<dyn Any + Send>;

/// Erased handler stored in a registration.
pub(crate) type HandlerFn = Arc<dyn Fn(&Message<'_>) -> Reply + Send + Sync>;

/// What a handler (or an interceptor layer) hands back to the dispatcher.
///
/// ## Example
/// ```rust
/// use canopy::Reply;
///
/// let ok = Reply::value(3u32);
/// let failed = Reply::error("no stock");
/// let later = Reply::pending(async { Ok::<_, std::io::Error>(6u32) });
///
/// assert!(ok.is_ready());
/// assert!(failed.is_ready());
/// assert!(!later.is_ready());
/// ```
pub enum Reply {
    /// Completed synchronously.
    Ready(Result<Value, BoxError>),
    /// Completes later; driven outside the drain turn.
    Pending(BoxFuture<'static, Result<Value, BoxError>>),
}

impl Reply {
    /// Ready value.
    pub fn value<R: Send + 'static>(value: R) -> Self {
        Reply::Ready(Ok(Box::new(value)))
    }

    /// Ready failure.
    pub fn error(err: impl Into<BoxError>) -> Self {
        Reply::Ready(Err(err.into()))
    }

    /// Ready value or failure from a typed result.
    pub fn from_result<R, E>(result: Result<R, E>) -> Self
    where
        R: Send + 'static,
        E: Into<BoxError>,
    {
        match result {
            Ok(value) => Reply::value(value),
            Err(err) => Reply::error(err),
        }
    }

    /// Pending reply from a typed future.
    pub fn pending<F, R, E>(fut: F) -> Self
    where
        F: Future<Output = Result<R, E>> + Send + 'static,
        R: Send + 'static,
        E: Into<BoxError>,
    {
        Reply::Pending(
            async move {
                match fut.await {
                    Ok(value) => Ok(Box::new(value) as Value),
                    Err(err) => Err(err.into()),
                }
            }
            .boxed(),
        )
    }

    /// True if the reply completed synchronously.
    pub fn is_ready(&self) -> bool {
        matches!(self, Reply::Ready(_))
    }
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Ready(Ok(_)) => f.write_str("Reply::Ready(Ok(..))"),
            Reply::Ready(Err(err)) => write!(f, "Reply::Ready(Err({err}))"),
            Reply::Pending(_) => f.write_str("Reply::Pending(..)"),
        }
    }
}
