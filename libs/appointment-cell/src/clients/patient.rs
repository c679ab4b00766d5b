use async_trait::async_trait;
use serde::Deserialize;

use shared_config::AppConfig;

use crate::models::{AppointmentError, PatientProfile};
use super::ServiceHttp;

#[async_trait]
pub trait PatientClient: Send + Sync {
    async fn profile(&self, patient_id: &str) -> Result<PatientProfile, AppointmentError>;

    async fn total_patient_count(&self) -> Result<i64, AppointmentError>;
}

#[derive(Deserialize)]
struct PatientCountResponse {
    patient_count: i64,
}

pub struct HttpPatientClient {
    http: ServiceHttp,
}

impl HttpPatientClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: ServiceHttp::new("patient", &config.patient_service_url, config.collaborator_timeout()),
        }
    }
}

#[async_trait]
impl PatientClient for HttpPatientClient {
    async fn profile(&self, patient_id: &str) -> Result<PatientProfile, AppointmentError> {
        let path = format!("/patients/{}/profile", urlencoding::encode(patient_id));
        self.http.get(&path).await
    }

    async fn total_patient_count(&self) -> Result<i64, AppointmentError> {
        let response: PatientCountResponse = self.http.get("/patients/count").await?;
        Ok(response.patient_count)
    }
}
