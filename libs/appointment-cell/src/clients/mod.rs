// libs/appointment-cell/src/clients/mod.rs
//! HTTP clients for the doctor, payment and patient services.

use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};

use crate::models::AppointmentError;

pub mod doctor;
pub mod patient;
pub mod payment;

pub use doctor::{DoctorClient, HttpDoctorClient};
pub use patient::{HttpPatientClient, PatientClient};
pub use payment::{HttpPaymentClient, PaymentClient};

/// JSON-over-HTTP plumbing shared by the collaborator clients. Every failure
/// becomes `AppointmentError::Collaborator` naming the service.
#[derive(Clone)]
pub(crate) struct ServiceHttp {
    client: Client,
    base_url: String,
    service: &'static str,
}

impl ServiceHttp {
    pub(crate) fn new(service: &'static str, base_url: &str, timeout: Duration) -> Self {
        let client = Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
            error!("Failed to build {} client with timeout, using defaults: {}", service, e);
            Client::new()
        });

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service,
        }
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, AppointmentError> {
        self.send::<T, ()>(Method::GET, path, None).await
    }

    pub(crate) async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, AppointmentError> {
        self.send(Method::POST, path, Some(body)).await
    }

    async fn send<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, AppointmentError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} service: {} {}", self.service, method, url);

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppointmentError::collaborator(self.service, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("{} service returned {}: {}", self.service, status, text);
            return Err(AppointmentError::collaborator(
                self.service,
                format!("HTTP {}: {}", status.as_u16(), text),
            ));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AppointmentError::collaborator(self.service, format!("invalid response body: {}", e)))
    }
}
