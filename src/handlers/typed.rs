use std::any::type_name;
use std::future::Future;
use std::sync::Arc;

use crate::error::{BoxError, DispatchError};
use crate::message::Message;

use super::reply::{HandlerFn, Reply};

fn payload_mismatch<T>(message: &Message<'_>) -> Reply {
    Reply::error(DispatchError::PayloadType {
        topic: message.topic().clone(),
        expected: type_name::<T>(),
    })
}

/// Wraps `Fn(T) -> Result<R, E>` into an erased handler.
pub(crate) fn sync_handler<T, R, E, F>(f: F) -> HandlerFn
where
    T: Clone + Send + Sync + 'static,
    R: Send + 'static,
    E: Into<BoxError>,
    F: Fn(T) -> Result<R, E> + Send + Sync + 'static,
{
    Arc::new(move |message: &Message<'_>| match message.payload::<T>() {
        Some(payload) => Reply::from_result(f(payload.clone())),
        None => payload_mismatch::<T>(message),
    })
}

/// Wraps `Fn(T) -> Future<Output = Result<R, E>>` into an erased handler.
pub(crate) fn async_handler<T, R, E, F, Fut>(f: F) -> HandlerFn
where
    T: Clone + Send + Sync + 'static,
    R: Send + 'static,
    E: Into<BoxError>,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    Arc::new(move |message: &Message<'_>| match message.payload::<T>() {
        Some(payload) => Reply::pending(f(payload.clone())),
        None => payload_mismatch::<T>(message),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Payload;
    use crate::topics::Topic;

    #[test]
    fn test_sync_handler_receives_cloned_payload() {
        let topic = Topic::<u32, u32>::new("t").to_ref();
        let payload: Payload = Arc::new(7u32);
        let handler = sync_handler(|n: u32| Ok::<_, BoxError>(n * 3));

        match handler(&Message::new(&topic, &payload)) {
            Reply::Ready(Ok(value)) => assert_eq!(*value.downcast::<u32>().unwrap(), 21),
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[test]
    fn test_wrong_payload_type_is_an_error() {
        let topic = Topic::<u32, u32>::new("t").to_ref();
        let payload: Payload = Arc::new("text");
        let handler = sync_handler(|n: u32| Ok::<_, BoxError>(n));

        match handler(&Message::new(&topic, &payload)) {
            Reply::Ready(Err(err)) => assert!(err.to_string().contains("u32")),
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_async_handler_is_pending() {
        let topic = Topic::<u32, u32>::new("t").to_ref();
        let payload: Payload = Arc::new(2u32);
        let handler = async_handler(|n: u32| async move { Ok::<_, BoxError>(n + 1) });

        match handler(&Message::new(&topic, &payload)) {
            Reply::Pending(fut) => {
                let value = fut.await.unwrap();
                assert_eq!(*value.downcast::<u32>().unwrap(), 3);
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }
}
