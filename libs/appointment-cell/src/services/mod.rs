pub mod booking;
pub mod clock;
pub mod reminder;
pub mod resolver;
pub mod specialization;
pub mod store;
pub mod video;

pub use booking::AppointmentBookingService;
pub use clock::{Clock, ManualClock, SystemClock};
pub use reminder::{ReminderScheduler, ReminderSweep, SweepReport};
pub use resolver::SlotResolver;
pub use specialization::SpecializationService;
pub use store::{AppointmentStore, InMemoryAppointmentStore, SupabaseAppointmentStore};
pub use video::VideoRoomService;

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use shared_config::AppConfig;

use crate::models::{AppointmentError, SchedulingRules};

/// Settings shared by the appointment services.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub rules: SchedulingRules,
    pub call_timeout: Duration,
    /// Pending-payment links are `{payment_page_url}?orderId={order}`.
    pub payment_page_url: String,
    pub video_call_base_url: String,
}

impl ServiceSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            rules: SchedulingRules::from_config(config),
            call_timeout: config.collaborator_timeout(),
            payment_page_url: config.payment_page_url.trim_end_matches('/').to_string(),
            video_call_base_url: config.video_call_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn pending_payment_url(&self, order_id: &str) -> String {
        format!("{}?orderId={}", self.payment_page_url, order_id)
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Runs one collaborator or store call under `limit`.
pub(crate) async fn bounded<T, F>(operation: &str, limit: Duration, call: F) -> Result<T, AppointmentError>
where
    F: Future<Output = Result<T, AppointmentError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!("{} exceeded {:?}", operation, limit);
            Err(AppointmentError::Timeout {
                operation: operation.to_string(),
                seconds: limit.as_secs(),
            })
        }
    }
}
