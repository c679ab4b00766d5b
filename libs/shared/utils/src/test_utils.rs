use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use shared_config::AppConfig;

/// Configuration pointing every collaborator at test servers.
pub struct TestConfig {
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub doctor_service_url: String,
    pub payment_service_url: String,
    pub patient_service_url: String,
    pub collaborator_timeout_secs: u64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_service_key: "test-service-key".to_string(),
            doctor_service_url: "http://localhost:8081".to_string(),
            payment_service_url: "http://localhost:8082".to_string(),
            patient_service_url: "http://localhost:8083".to_string(),
            collaborator_timeout_secs: 2,
        }
    }
}

impl TestConfig {
    /// Every collaborator served by the same mock server.
    pub fn with_mock_server(uri: &str) -> Self {
        Self {
            supabase_url: uri.to_string(),
            doctor_service_url: uri.to_string(),
            payment_service_url: uri.to_string(),
            patient_service_url: uri.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_service_key: self.supabase_service_key.clone(),
            doctor_service_url: self.doctor_service_url.clone(),
            payment_service_url: self.payment_service_url.clone(),
            patient_service_url: self.patient_service_url.clone(),
            collaborator_timeout_secs: self.collaborator_timeout_secs,
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

/// Canned collaborator payloads in the shapes the services return.
pub struct MockCollaboratorResponses;

impl MockCollaboratorResponses {
    /// `unavailable` entries are ANSIC timestamps, e.g. `Tue Oct 20 09:00:00 2026`.
    pub fn doctor_availability_response(doctor_id: &str, unavailable: &[&str]) -> serde_json::Value {
        let entries: Vec<serde_json::Value> = unavailable
            .iter()
            .map(|date_time| json!({ "date_time": date_time, "is_available": "unavailable" }))
            .collect();

        json!({
            "doctor_id": doctor_id,
            "doctor_availability": entries
        })
    }

    pub fn available_slots_response(doctor_ids: &[&str]) -> serde_json::Value {
        let slots: Vec<serde_json::Value> = doctor_ids
            .iter()
            .map(|id| json!({
                "doctor_id": id,
                "doctor_name": format!("Dr. {}", id),
                "is_available": true
            }))
            .collect();

        json!({ "available_slots": slots })
    }

    pub fn payment_order_response(order_id: &str) -> serde_json::Value {
        json!({
            "status": "success",
            "order_id": order_id,
            "payment_url": format!("http://localhost:8080/api/v1/payment?orderId={}", order_id),
            "message": "order created"
        })
    }

    pub fn failed_payment_response(message: &str) -> serde_json::Value {
        json!({
            "status": "failed",
            "order_id": "",
            "payment_url": "",
            "message": message
        })
    }

    pub fn patient_profile_response(patient_id: &str, email: &str) -> serde_json::Value {
        json!({
            "patient_id": patient_id,
            "email": email,
            "name": "Test Patient"
        })
    }

    pub fn random_order_id() -> String {
        format!("order_{}", Uuid::new_v4().simple())
    }
}

/// Rows as PostgREST returns them from the appointments table.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn appointment_row(
        appointment_id: i64,
        patient_id: &str,
        doctor_id: &str,
        appointment_time: DateTime<Utc>,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "appointment_id": appointment_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "specialization_id": 1,
            "appointment_time": appointment_time,
            "duration_minutes": 60,
            "status": status,
            "payment_id": format!("order_{}", appointment_id),
            "appointment_type": "in-person",
            "cancellation_reason": null,
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z",
            "appointment_day": appointment_time.date_naive(),
            "appointment_end": appointment_time + chrono::Duration::hours(1)
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code
        })
    }
}
