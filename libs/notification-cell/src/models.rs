use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical destinations consumed by the external notification worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTopic {
    /// Video room created; the event carries the patient's join URL.
    VideoRoomReady,
    /// Same-day reminder produced by the daily sweep.
    DailyReminder,
}

impl NotificationTopic {
    pub fn name(&self) -> &'static str {
        match self {
            NotificationTopic::VideoRoomReady => "appointment_topic",
            NotificationTopic::DailyReminder => "alert_topic",
        }
    }

    /// Redis list the worker consumes for this topic.
    pub fn queue_key(&self) -> String {
        format!("notifications:{}", self.name())
    }
}

impl fmt::Display for NotificationTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Transient notification payload; produced once per triggering action, never stored here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentEvent {
    pub appointment_id: i64,
    pub email: String,
    pub doctor_id: String,
    /// Local calendar date, `YYYY-MM-DD`.
    pub appointment_date: String,
    #[serde(rename = "type")]
    pub appointment_type: String,
    #[serde(rename = "videoURL", default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
}
