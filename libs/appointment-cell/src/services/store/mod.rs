// libs/appointment-cell/src/services/store/mod.rs
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, Specialization, SpecializationStats,
    StatsPeriod, VideoTreatment,
};

pub mod memory;
pub mod supabase;

pub use memory::InMemoryAppointmentStore;
pub use supabase::SupabaseAppointmentStore;

/// Exclusive owner of appointment, video-treatment and specialization records.
///
/// Every operation is atomic for a single record. `insert` re-validates the
/// doctor overlap and patient same-day rules at write time, so a caller's
/// earlier availability check can never let a double booking through.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Highest allocated appointment id, or 0 for an empty store.
    async fn latest_appointment_id(&self) -> Result<i64, AppointmentError>;

    /// Atomically allocates the next id. Ids are never handed out twice;
    /// an id whose booking is abandoned leaves a gap.
    async fn next_appointment_id(&self) -> Result<i64, AppointmentError>;

    /// Fails with `SlotConflict` when an active appointment of the same doctor
    /// overlaps, or the patient already holds an active appointment with that
    /// doctor on the same clinic day.
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, AppointmentError>;

    async fn find_for_patient(
        &self,
        appointment_id: i64,
        patient_id: &str,
    ) -> Result<Option<Appointment>, AppointmentError>;

    async fn find_by_payment_id(&self, payment_id: &str) -> Result<Option<Appointment>, AppointmentError>;

    /// All of a patient's appointments, earliest first.
    async fn find_by_patient(&self, patient_id: &str) -> Result<Vec<Appointment>, AppointmentError>;

    /// Active appointment of `patient_id` with `doctor_id` on the given clinic day.
    async fn find_patient_booking_on(
        &self,
        doctor_id: &str,
        patient_id: &str,
        date: NaiveDate,
    ) -> Result<Option<Appointment>, AppointmentError>;

    /// Active appointments of the doctor intersecting `[start, end)`.
    async fn count_doctor_overlaps(
        &self,
        doctor_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<usize, AppointmentError>;

    /// Active appointments starting within `[from, to]`, earliest first.
    async fn find_in_window(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    /// Earliest active video appointment of the patient strictly after `after`.
    async fn find_upcoming_video(
        &self,
        patient_id: &str,
        after: DateTime<Utc>,
    ) -> Result<Option<Appointment>, AppointmentError>;

    /// Compare-and-set on status. Returns `None` when the record is missing or
    /// its status is no longer `expected`. `now` becomes `updated_at`.
    async fn transition_status(
        &self,
        appointment_id: i64,
        expected: AppointmentStatus,
        next: AppointmentStatus,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Option<Appointment>, AppointmentError>;

    async fn save_video_treatment(&self, treatment: VideoTreatment) -> Result<VideoTreatment, AppointmentError>;

    /// Fails with `DuplicateSpecialization` when the name already exists.
    async fn create_specialization(
        &self,
        name: &str,
        description: &str,
    ) -> Result<Specialization, AppointmentError>;

    async fn specialization_stats(
        &self,
        period: StatsPeriod,
        now: DateTime<Utc>,
    ) -> Result<Vec<SpecializationStats>, AppointmentError>;

    async fn count_appointments(&self, period: StatsPeriod, now: DateTime<Utc>) -> Result<i64, AppointmentError>;
}
