use async_trait::async_trait;
use tracing::info;

use crate::{AppointmentEvent, NotificationError, NotificationTopic};

/// Outbound notification seam. Callers treat every failure as recoverable:
/// a dispatch error is logged and never undoes the action that produced the event.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        topic: NotificationTopic,
        event: &AppointmentEvent,
    ) -> Result<(), NotificationError>;
}

/// Fallback used when no broker is configured; the event only reaches the log.
#[derive(Debug, Default, Clone)]
pub struct LoggingDispatcher;

impl LoggingDispatcher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationDispatcher for LoggingDispatcher {
    async fn dispatch(
        &self,
        topic: NotificationTopic,
        event: &AppointmentEvent,
    ) -> Result<(), NotificationError> {
        let payload = serde_json::to_string(event)?;
        info!(topic = %topic, appointment_id = event.appointment_id, "Notification (log only): {}", payload);
        Ok(())
    }
}
