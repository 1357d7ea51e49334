use std::fmt;
use std::sync::Arc;

use super::Registration;

/// Handle to a callback subscription.
///
/// Cloning shares the same registration. Dropping the handle does **not** unsubscribe;
/// call [`dispose`](Subscription::dispose), or let the limit or the bus end it.
#[must_use = "dropping a Subscription keeps it active; keep the handle to dispose it later"]
#[derive(Clone)]
pub struct Subscription {
    registration: Arc<Registration>,
}

impl Subscription {
    pub(crate) fn new(registration: Arc<Registration>) -> Self {
        Self { registration }
    }

    /// Removes the subscription from every topic it was bound to. Idempotent.
    pub fn dispose(&self) {
        self.registration.dispose();
    }

    /// True once disposed (explicitly, by its limit, or by its bus).
    pub fn is_disposed(&self) -> bool {
        self.registration.is_disposed()
    }

    /// Messages left before auto-disposal; `None` if unlimited.
    pub fn remaining(&self) -> Option<usize> {
        self.registration.remaining()
    }

    /// Resolves once the subscription is disposed.
    pub async fn closed(&self) {
        self.registration.closed().cancelled().await;
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.registration.id())
            .field("topics", &self.registration.topics())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
