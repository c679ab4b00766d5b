// libs/appointment-cell/src/services/store/supabase.rs
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};

use shared_database::{DatabaseError, SupabaseClient};

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, AppointmentType, SchedulingRules,
    Specialization, SpecializationStats, StatsPeriod, VideoTreatment,
};
use super::AppointmentStore;

const APPOINTMENTS: &str = "appointments";
const VIDEO_TREATMENTS: &str = "video_treatments";
const SPECIALIZATIONS: &str = "specializations";

#[derive(Debug, Deserialize)]
struct IdRow {
    appointment_id: i64,
}

/// Postgres-backed store reached through PostgREST.
///
/// Double-booking protection lives in the schema: an exclusion constraint on
/// the doctor's time range and a partial unique index on
/// `(doctor_id, patient_id, appointment_day)`. Either violation comes back
/// as HTTP 409 and is reported as `SlotConflict`.
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
    rules: SchedulingRules,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>, rules: SchedulingRules) -> Self {
        Self { supabase, rules }
    }

    fn appointment_row(&self, appointment: &Appointment) -> Result<Value, AppointmentError> {
        let mut row = serde_json::to_value(appointment)
            .map_err(|e| AppointmentError::Database(format!("Failed to encode appointment: {}", e)))?;

        if let Value::Object(fields) = &mut row {
            fields.insert(
                "appointment_day".to_string(),
                json!(self.rules.local_date(appointment.appointment_time)),
            );
            fields.insert("appointment_end".to_string(), json!(appointment.end_time()));
        }

        Ok(row)
    }

    async fn select_appointments(&self, filters: &[String]) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "{}?{}&order=appointment_time.asc",
            APPOINTMENTS,
            filters.join("&")
        );
        debug!("Selecting appointments: {}", path);
        self.supabase.select(&path).await.map_err(database_error)
    }

    fn period_args(&self, period: StatsPeriod, now: DateTime<Utc>) -> Value {
        json!({
            "period": period.as_str(),
            "now": now,
            "utc_offset_minutes": self.rules.utc_offset.local_minus_utc() / 60,
        })
    }
}

fn ts(time: DateTime<Utc>) -> String {
    urlencoding::encode(&time.to_rfc3339()).into_owned()
}

fn eq(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

fn database_error(e: DatabaseError) -> AppointmentError {
    match e {
        DatabaseError::Conflict(_) => AppointmentError::SlotConflict,
        other => {
            error!("Appointment store error: {}", other);
            AppointmentError::Database(other.to_string())
        }
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn latest_appointment_id(&self) -> Result<i64, AppointmentError> {
        let rows: Vec<IdRow> = self
            .supabase
            .select("appointments?select=appointment_id&order=appointment_id.desc&limit=1")
            .await
            .map_err(database_error)?;

        Ok(rows.first().map(|row| row.appointment_id).unwrap_or(0))
    }

    async fn next_appointment_id(&self) -> Result<i64, AppointmentError> {
        self.supabase
            .rpc("next_appointment_id", json!({}))
            .await
            .map_err(database_error)
    }

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        let row = self.appointment_row(&appointment)?;
        let mut stored: Vec<Appointment> = self.supabase.insert(APPOINTMENTS, row).await.map_err(|e| {
            if matches!(e, DatabaseError::Conflict(_)) {
                warn!(
                    "Insert of appointment {} rejected by constraint for doctor {}",
                    appointment.appointment_id, appointment.doctor_id
                );
            }
            database_error(e)
        })?;

        stored
            .pop()
            .ok_or_else(|| AppointmentError::Database("Insert returned no representation".to_string()))
    }

    async fn find_for_patient(
        &self,
        appointment_id: i64,
        patient_id: &str,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let rows = self
            .select_appointments(&[
                format!("appointment_id=eq.{}", appointment_id),
                format!("patient_id=eq.{}", eq(patient_id)),
            ])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn find_by_payment_id(&self, payment_id: &str) -> Result<Option<Appointment>, AppointmentError> {
        let rows = self
            .select_appointments(&[format!("payment_id=eq.{}", eq(payment_id))])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn find_by_patient(&self, patient_id: &str) -> Result<Vec<Appointment>, AppointmentError> {
        self.select_appointments(&[format!("patient_id=eq.{}", eq(patient_id))])
            .await
    }

    async fn find_patient_booking_on(
        &self,
        doctor_id: &str,
        patient_id: &str,
        date: NaiveDate,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let rows = self
            .select_appointments(&[
                format!("doctor_id=eq.{}", eq(doctor_id)),
                format!("patient_id=eq.{}", eq(patient_id)),
                format!("appointment_day=eq.{}", date),
                "status=neq.cancelled".to_string(),
            ])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn count_doctor_overlaps(
        &self,
        doctor_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<usize, AppointmentError> {
        let rows = self
            .select_appointments(&[
                format!("doctor_id=eq.{}", eq(doctor_id)),
                "status=neq.cancelled".to_string(),
                format!("appointment_time=lt.{}", ts(end)),
                format!("appointment_end=gt.{}", ts(start)),
            ])
            .await?;
        Ok(rows.len())
    }

    async fn find_in_window(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.select_appointments(&[
            "status=neq.cancelled".to_string(),
            format!("appointment_time=gte.{}", ts(from)),
            format!("appointment_time=lte.{}", ts(to)),
        ])
        .await
    }

    async fn find_upcoming_video(
        &self,
        patient_id: &str,
        after: DateTime<Utc>,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let rows = self
            .select_appointments(&[
                format!("patient_id=eq.{}", eq(patient_id)),
                format!("appointment_type=eq.{}", eq(&AppointmentType::Video.to_string())),
                "status=neq.cancelled".to_string(),
                format!("appointment_time=gt.{}", ts(after)),
                "limit=1".to_string(),
            ])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn transition_status(
        &self,
        appointment_id: i64,
        expected: AppointmentStatus,
        next: AppointmentStatus,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!(
            "{}?appointment_id=eq.{}&status=eq.{}",
            APPOINTMENTS, appointment_id, expected
        );

        let mut changes = json!({
            "status": next,
            "updated_at": now,
        });
        if let (Some(reason), Value::Object(fields)) = (reason, &mut changes) {
            fields.insert("cancellation_reason".to_string(), json!(reason));
        }

        let updated: Vec<Appointment> = self
            .supabase
            .update(&path, changes)
            .await
            .map_err(database_error)?;

        Ok(updated.into_iter().next())
    }

    async fn save_video_treatment(&self, treatment: VideoTreatment) -> Result<VideoTreatment, AppointmentError> {
        let row = serde_json::to_value(&treatment)
            .map_err(|e| AppointmentError::Database(format!("Failed to encode video treatment: {}", e)))?;

        let mut stored: Vec<VideoTreatment> = self
            .supabase
            .insert(VIDEO_TREATMENTS, row)
            .await
            .map_err(database_error)?;

        stored
            .pop()
            .ok_or_else(|| AppointmentError::Database("Insert returned no representation".to_string()))
    }

    async fn create_specialization(
        &self,
        name: &str,
        description: &str,
    ) -> Result<Specialization, AppointmentError> {
        let row = json!({ "name": name, "description": description });
        let result: Result<Vec<Specialization>, DatabaseError> =
            self.supabase.insert(SPECIALIZATIONS, row).await;

        match result {
            Ok(mut stored) => stored
                .pop()
                .ok_or_else(|| AppointmentError::Database("Insert returned no representation".to_string())),
            Err(DatabaseError::Conflict(_)) => Err(AppointmentError::DuplicateSpecialization(name.to_string())),
            Err(e) => Err(database_error(e)),
        }
    }

    async fn specialization_stats(
        &self,
        period: StatsPeriod,
        now: DateTime<Utc>,
    ) -> Result<Vec<SpecializationStats>, AppointmentError> {
        self.supabase
            .rpc("appointment_specialization_stats", self.period_args(period, now))
            .await
            .map_err(database_error)
    }

    async fn count_appointments(&self, period: StatsPeriod, now: DateTime<Utc>) -> Result<i64, AppointmentError> {
        self.supabase
            .rpc("count_appointments", self.period_args(period, now))
            .await
            .map_err(database_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use shared_config::AppConfig;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer) -> SupabaseAppointmentStore {
        let config = AppConfig {
            supabase_url: server.uri(),
            supabase_service_key: "service-key".to_string(),
            ..AppConfig::default()
        };
        SupabaseAppointmentStore::new(Arc::new(SupabaseClient::new(&config)), SchedulingRules::default())
    }

    fn appointment_json(id: i64, status: &str) -> Value {
        json!({
            "appointment_id": id,
            "patient_id": "patient-1",
            "doctor_id": "doctor-1",
            "specialization_id": 1,
            "appointment_time": "2026-10-20T10:00:00Z",
            "duration_minutes": 60,
            "status": status,
            "payment_id": "order_1",
            "appointment_type": "video",
            "cancellation_reason": null,
            "created_at": "2026-10-18T10:00:00Z",
            "updated_at": "2026-10-18T10:00:00Z",
            "appointment_day": "2026-10-20",
            "appointment_end": "2026-10-20T11:00:00Z"
        })
    }

    #[tokio::test]
    async fn test_latest_id_defaults_to_zero() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/appointments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        assert_eq!(store_for(&server).latest_appointment_id().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_sends_day_and_end_columns() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/appointments"))
            .and(body_partial_json(json!({
                "appointment_day": "2026-10-20",
                "appointment_end": "2026-10-20T11:00:00Z"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([appointment_json(1, "pending")])))
            .mount(&server)
            .await;

        let appointment: Appointment = serde_json::from_value(appointment_json(1, "pending")).unwrap();
        let stored = store_for(&server).insert(appointment).await.unwrap();
        assert_eq!(stored.appointment_id, 1);
        assert_eq!(
            stored.appointment_time,
            Utc.with_ymd_and_hms(2026, 10, 20, 10, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_constraint_violation_is_slot_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/appointments"))
            .respond_with(ResponseTemplate::new(409).set_body_string("appointments_no_doctor_overlap"))
            .mount(&server)
            .await;

        let appointment: Appointment = serde_json::from_value(appointment_json(2, "pending")).unwrap();
        let result = store_for(&server).insert(appointment).await;
        assert_matches!(result, Err(AppointmentError::SlotConflict));
    }

    #[tokio::test]
    async fn test_transition_filters_on_expected_status() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/appointments"))
            .and(query_param("appointment_id", "eq.1"))
            .and(query_param("status", "eq.confirmed"))
            .and(body_partial_json(json!({
                "status": "cancelled",
                "updated_at": "2026-10-19T08:00:00Z",
                "cancellation_reason": "sick"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment_json(1, "cancelled")])))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let updated = store
            .transition_status(
                1,
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
                Some("sick".to_string()),
                Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap(),
            )
            .await
            .unwrap();
        assert_matches!(updated, Some(a) if a.status == AppointmentStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_duplicate_specialization() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/specializations"))
            .respond_with(ResponseTemplate::new(409).set_body_string("duplicate key"))
            .mount(&server)
            .await;

        let result = store_for(&server).create_specialization("Cardiology", "").await;
        assert_eq!(result, Err(AppointmentError::DuplicateSpecialization("Cardiology".to_string())));
    }

    #[tokio::test]
    async fn test_stats_rpc_passes_period() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/appointment_specialization_stats"))
            .and(body_partial_json(json!({ "period": "week", "utc_offset_minutes": 0 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "name": "Cardiology", "count": 3 }
            ])))
            .mount(&server)
            .await;

        let stats = store_for(&server)
            .specialization_stats(StatsPeriod::Week, Utc::now())
            .await
            .unwrap();
        assert_eq!(stats, vec![SpecializationStats { name: "Cardiology".to_string(), count: 3 }]);
    }
}
