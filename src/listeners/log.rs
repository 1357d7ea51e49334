//! # LogWriter: simple traffic logger
//!
//! A minimal listener that logs every published message through `tracing`.
//! Use it for tests or demos.
//!
//! ## Example output
//! ```text
//! INFO canopy::listeners: [publish] topic="orders" subscribers=2
//! ```

use crate::error::BoxError;
use crate::listeners::Listen;
use crate::message::Message;

/// Traffic logging listener.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Listen for LogWriter {
    fn on_message(&self, message: &Message<'_>, subscribers: usize) -> Result<(), BoxError> {
        tracing::info!(
            target: "canopy::listeners",
            topic = %message.topic(),
            topic_id = message.topic().id(),
            subscribers,
            "[publish]"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
