use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use shared_config::AppConfig;

use crate::models::{AppointmentError, AvailabilitySlot, DoctorAvailability, StatsPeriod};
use super::ServiceHttp;

#[async_trait]
pub trait DoctorClient: Send + Sync {
    async fn available_slots(
        &self,
        category_id: i32,
        requested_at: DateTime<Utc>,
    ) -> Result<Vec<AvailabilitySlot>, AppointmentError>;

    async fn doctor_availability(&self, doctor_id: &str) -> Result<DoctorAvailability, AppointmentError>;

    async fn total_doctor_count(&self, period: StatsPeriod) -> Result<i64, AppointmentError>;
}

#[derive(Deserialize)]
struct SlotsResponse {
    #[serde(default)]
    available_slots: Vec<AvailabilitySlot>,
}

#[derive(Deserialize)]
struct DoctorCountResponse {
    doctor_count: i64,
}

pub struct HttpDoctorClient {
    http: ServiceHttp,
}

impl HttpDoctorClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: ServiceHttp::new("doctor", &config.doctor_service_url, config.collaborator_timeout()),
        }
    }
}

#[async_trait]
impl DoctorClient for HttpDoctorClient {
    async fn available_slots(
        &self,
        category_id: i32,
        requested_at: DateTime<Utc>,
    ) -> Result<Vec<AvailabilitySlot>, AppointmentError> {
        let path = format!(
            "/doctors/availability?category_id={}&requested_at={}",
            category_id,
            urlencoding::encode(&requested_at.to_rfc3339())
        );
        let response: SlotsResponse = self.http.get(&path).await?;
        Ok(response.available_slots)
    }

    async fn doctor_availability(&self, doctor_id: &str) -> Result<DoctorAvailability, AppointmentError> {
        let path = format!("/doctors/{}/availability", urlencoding::encode(doctor_id));
        self.http.get(&path).await
    }

    async fn total_doctor_count(&self, period: StatsPeriod) -> Result<i64, AppointmentError> {
        let path = format!("/doctors/count?period={}", period.as_str());
        let response: DoctorCountResponse = self.http.get(&path).await?;
        Ok(response.doctor_count)
    }
}
