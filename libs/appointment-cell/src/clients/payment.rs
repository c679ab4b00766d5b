use async_trait::async_trait;
use serde::Deserialize;

use shared_config::AppConfig;

use crate::models::{AppointmentError, PaymentOrder, PaymentOrderRequest, StatsPeriod};
use super::ServiceHttp;

#[async_trait]
pub trait PaymentClient: Send + Sync {
    /// Returns the order as reported; callers decide what a non-success status means.
    async fn create_order(&self, request: &PaymentOrderRequest) -> Result<PaymentOrder, AppointmentError>;

    async fn total_revenue(&self, period: StatsPeriod) -> Result<f64, AppointmentError>;
}

#[derive(Deserialize)]
struct RevenueResponse {
    total_revenue: f64,
}

pub struct HttpPaymentClient {
    http: ServiceHttp,
}

impl HttpPaymentClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: ServiceHttp::new("payment", &config.payment_service_url, config.collaborator_timeout()),
        }
    }
}

#[async_trait]
impl PaymentClient for HttpPaymentClient {
    async fn create_order(&self, request: &PaymentOrderRequest) -> Result<PaymentOrder, AppointmentError> {
        self.http.post("/orders", request).await
    }

    async fn total_revenue(&self, period: StatsPeriod) -> Result<f64, AppointmentError> {
        let path = format!("/revenue?period={}", period.as_str());
        let response: RevenueResponse = self.http.get(&path).await?;
        Ok(response.total_revenue)
    }
}
