// libs/appointment-cell/src/services/store/memory.rs
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, AppointmentType, SchedulingRules,
    Specialization, SpecializationStats, StatsPeriod, VideoTreatment,
};
use super::AppointmentStore;

#[derive(Default)]
struct StoreState {
    appointments: BTreeMap<i64, Appointment>,
    sequence: i64,
    video_treatments: Vec<VideoTreatment>,
    specializations: Vec<Specialization>,
}

/// Process-local store. All writes go through one lock, which serialises id
/// allocation and the overlap re-check with the insert itself.
pub struct InMemoryAppointmentStore {
    rules: SchedulingRules,
    state: RwLock<StoreState>,
}

impl InMemoryAppointmentStore {
    pub fn new(rules: SchedulingRules) -> Self {
        Self {
            rules,
            state: RwLock::new(StoreState::default()),
        }
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.appointments.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn video_treatments(&self) -> Vec<VideoTreatment> {
        self.state.read().await.video_treatments.clone()
    }
}

impl Default for InMemoryAppointmentStore {
    fn default() -> Self {
        Self::new(SchedulingRules::default())
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn latest_appointment_id(&self) -> Result<i64, AppointmentError> {
        let state = self.state.read().await;
        Ok(state.appointments.keys().next_back().copied().unwrap_or(0))
    }

    async fn next_appointment_id(&self) -> Result<i64, AppointmentError> {
        let mut state = self.state.write().await;
        let latest = state.appointments.keys().next_back().copied().unwrap_or(0);
        state.sequence = state.sequence.max(latest) + 1;
        debug!("Allocated appointment id {}", state.sequence);
        Ok(state.sequence)
    }

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        let mut state = self.state.write().await;

        if state.appointments.contains_key(&appointment.appointment_id) {
            return Err(AppointmentError::Database(format!(
                "duplicate appointment id {}",
                appointment.appointment_id
            )));
        }

        let day = self.rules.local_date(appointment.appointment_time);
        let clash = state.appointments.values().filter(|a| a.is_active()).any(|existing| {
            let same_doctor = existing.doctor_id == appointment.doctor_id;
            let overlaps = existing.overlaps(appointment.appointment_time, appointment.end_time());
            let same_patient_day = existing.patient_id == appointment.patient_id
                && self.rules.local_date(existing.appointment_time) == day;
            same_doctor && (overlaps || same_patient_day)
        });

        if clash {
            warn!(
                "Rejected insert of appointment {}: doctor {} slot at {} already taken",
                appointment.appointment_id, appointment.doctor_id, appointment.appointment_time
            );
            return Err(AppointmentError::SlotConflict);
        }

        state.sequence = state.sequence.max(appointment.appointment_id);
        state.appointments.insert(appointment.appointment_id, appointment.clone());
        Ok(appointment)
    }

    async fn find_for_patient(
        &self,
        appointment_id: i64,
        patient_id: &str,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let state = self.state.read().await;
        Ok(state
            .appointments
            .get(&appointment_id)
            .filter(|a| a.patient_id == patient_id)
            .cloned())
    }

    async fn find_by_payment_id(&self, payment_id: &str) -> Result<Option<Appointment>, AppointmentError> {
        let state = self.state.read().await;
        Ok(state.appointments.values().find(|a| a.payment_id == payment_id).cloned())
    }

    async fn find_by_patient(&self, patient_id: &str) -> Result<Vec<Appointment>, AppointmentError> {
        let state = self.state.read().await;
        let mut appointments: Vec<Appointment> = state
            .appointments
            .values()
            .filter(|a| a.patient_id == patient_id)
            .cloned()
            .collect();
        appointments.sort_by_key(|a| a.appointment_time);
        Ok(appointments)
    }

    async fn find_patient_booking_on(
        &self,
        doctor_id: &str,
        patient_id: &str,
        date: NaiveDate,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let state = self.state.read().await;
        Ok(state
            .appointments
            .values()
            .find(|a| {
                a.is_active()
                    && a.doctor_id == doctor_id
                    && a.patient_id == patient_id
                    && self.rules.local_date(a.appointment_time) == date
            })
            .cloned())
    }

    async fn count_doctor_overlaps(
        &self,
        doctor_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<usize, AppointmentError> {
        let state = self.state.read().await;
        Ok(state
            .appointments
            .values()
            .filter(|a| a.is_active() && a.doctor_id == doctor_id && a.overlaps(start, end))
            .count())
    }

    async fn find_in_window(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let state = self.state.read().await;
        let mut appointments: Vec<Appointment> = state
            .appointments
            .values()
            .filter(|a| a.is_active() && a.appointment_time >= from && a.appointment_time <= to)
            .cloned()
            .collect();
        appointments.sort_by_key(|a| a.appointment_time);
        Ok(appointments)
    }

    async fn find_upcoming_video(
        &self,
        patient_id: &str,
        after: DateTime<Utc>,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let state = self.state.read().await;
        Ok(state
            .appointments
            .values()
            .filter(|a| {
                a.is_active()
                    && a.patient_id == patient_id
                    && a.appointment_type == AppointmentType::Video
                    && a.appointment_time > after
            })
            .min_by_key(|a| a.appointment_time)
            .cloned())
    }

    async fn transition_status(
        &self,
        appointment_id: i64,
        expected: AppointmentStatus,
        next: AppointmentStatus,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let mut state = self.state.write().await;
        let Some(appointment) = state.appointments.get_mut(&appointment_id) else {
            return Ok(None);
        };
        if appointment.status != expected {
            return Ok(None);
        }

        appointment.status = next;
        if reason.is_some() {
            appointment.cancellation_reason = reason;
        }
        appointment.updated_at = now;
        Ok(Some(appointment.clone()))
    }

    async fn save_video_treatment(&self, treatment: VideoTreatment) -> Result<VideoTreatment, AppointmentError> {
        let mut state = self.state.write().await;
        if !state.appointments.contains_key(&treatment.appointment_id) {
            return Err(AppointmentError::NotFound(format!(
                "appointment {} for video treatment",
                treatment.appointment_id
            )));
        }
        state.video_treatments.push(treatment.clone());
        Ok(treatment)
    }

    async fn create_specialization(
        &self,
        name: &str,
        description: &str,
    ) -> Result<Specialization, AppointmentError> {
        let mut state = self.state.write().await;
        if state
            .specializations
            .iter()
            .any(|s| s.name.eq_ignore_ascii_case(name))
        {
            return Err(AppointmentError::DuplicateSpecialization(name.to_string()));
        }

        let specialization = Specialization {
            id: state.specializations.len() as i32 + 1,
            name: name.to_string(),
            description: description.to_string(),
        };
        state.specializations.push(specialization.clone());
        Ok(specialization)
    }

    async fn specialization_stats(
        &self,
        period: StatsPeriod,
        now: DateTime<Utc>,
    ) -> Result<Vec<SpecializationStats>, AppointmentError> {
        let state = self.state.read().await;
        let names: HashMap<i32, &str> = state
            .specializations
            .iter()
            .map(|s| (s.id, s.name.as_str()))
            .collect();

        let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
        for appointment in state.appointments.values() {
            if !period.contains(&self.rules, now, appointment.appointment_time) {
                continue;
            }
            if let Some(name) = names.get(&appointment.specialization_id) {
                *counts.entry(*name).or_default() += 1;
            }
        }

        Ok(counts
            .into_iter()
            .map(|(name, count)| SpecializationStats { name: name.to_string(), count })
            .collect())
    }

    async fn count_appointments(&self, period: StatsPeriod, now: DateTime<Utc>) -> Result<i64, AppointmentError> {
        let state = self.state.read().await;
        Ok(state
            .appointments
            .values()
            .filter(|a| period.contains(&self.rules, now, a.appointment_time))
            .count() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, day, h, m, 0).unwrap()
    }

    fn appointment(id: i64, doctor: &str, patient: &str, time: DateTime<Utc>) -> Appointment {
        Appointment {
            appointment_id: id,
            patient_id: patient.to_string(),
            doctor_id: doctor.to_string(),
            specialization_id: 1,
            appointment_time: time,
            duration_minutes: 60,
            status: AppointmentStatus::Pending,
            payment_id: format!("order_{}", id),
            appointment_type: AppointmentType::InPerson,
            cancellation_reason: None,
            created_at: time,
            updated_at: time,
        }
    }

    #[tokio::test]
    async fn test_latest_id_is_zero_when_empty() {
        let store = InMemoryAppointmentStore::default();
        assert_eq!(store.latest_appointment_id().await.unwrap(), 0);
        assert_eq!(store.next_appointment_id().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_ids_never_reused_after_abandoned_allocation() {
        let store = InMemoryAppointmentStore::default();
        let first = store.next_appointment_id().await.unwrap();
        // Allocation abandoned (e.g. payment failed); nothing inserted.
        let second = store.next_appointment_id().await.unwrap();
        assert!(second > first);
        assert_eq!(store.latest_appointment_id().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_allocations_are_unique() {
        let store = Arc::new(InMemoryAppointmentStore::default());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move { store.next_appointment_id().await.unwrap() }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 32);
        assert_eq!(ids.first(), Some(&1));
        assert_eq!(ids.last(), Some(&32));
    }

    #[tokio::test]
    async fn test_insert_rejects_doctor_overlap() {
        let store = InMemoryAppointmentStore::default();
        store.insert(appointment(1, "doc", "p1", at(20, 10, 0))).await.unwrap();

        let result = store.insert(appointment(2, "doc", "p2", at(20, 10, 30))).await;
        assert_eq!(result, Err(AppointmentError::SlotConflict));

        // Back-to-back is fine.
        assert!(store.insert(appointment(3, "doc", "p2", at(20, 11, 0))).await.is_ok());
    }

    #[tokio::test]
    async fn test_insert_rejects_same_patient_doctor_day() {
        let store = InMemoryAppointmentStore::default();
        store.insert(appointment(1, "doc", "p1", at(20, 9, 0))).await.unwrap();

        let result = store.insert(appointment(2, "doc", "p1", at(20, 15, 0))).await;
        assert_eq!(result, Err(AppointmentError::SlotConflict));

        // Another doctor the same day is allowed.
        assert!(store.insert(appointment(3, "other", "p1", at(20, 15, 0))).await.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_appointments_free_the_slot() {
        let store = InMemoryAppointmentStore::default();
        store.insert(appointment(1, "doc", "p1", at(20, 10, 0))).await.unwrap();
        store
            .transition_status(1, AppointmentStatus::Pending, AppointmentStatus::Cancelled, None, at(20, 8, 0))
            .await
            .unwrap();

        assert_eq!(store.count_doctor_overlaps("doc", at(20, 10, 0), at(20, 11, 0)).await.unwrap(), 0);
        assert!(store.insert(appointment(2, "doc", "p2", at(20, 10, 0))).await.is_ok());
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_set() {
        let store = InMemoryAppointmentStore::default();
        store.insert(appointment(1, "doc", "p1", at(20, 10, 0))).await.unwrap();

        let missed = store
            .transition_status(1, AppointmentStatus::Confirmed, AppointmentStatus::Cancelled, None, at(20, 8, 0))
            .await
            .unwrap();
        assert!(missed.is_none());

        let confirmed = store
            .transition_status(1, AppointmentStatus::Pending, AppointmentStatus::Confirmed, None, at(20, 8, 0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(confirmed.status, AppointmentStatus::Confirmed);
        assert_eq!(confirmed.updated_at, at(20, 8, 0));
    }

    #[tokio::test]
    async fn test_window_and_video_queries() {
        let store = InMemoryAppointmentStore::default();
        let mut video = appointment(1, "doc", "p1", at(20, 10, 0));
        video.appointment_type = AppointmentType::Video;
        store.insert(video).await.unwrap();
        store.insert(appointment(2, "doc", "p2", at(21, 10, 0))).await.unwrap();

        let window = store.find_in_window(at(20, 0, 0), at(20, 0, 0) + Duration::hours(12)).await.unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].appointment_id, 1);

        let upcoming = store.find_upcoming_video("p1", at(20, 9, 0)).await.unwrap();
        assert_eq!(upcoming.map(|a| a.appointment_id), Some(1));
        assert!(store.find_upcoming_video("p1", at(20, 10, 0)).await.unwrap().is_none());
        assert!(store.find_upcoming_video("p2", at(20, 9, 0)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_specializations_and_stats() {
        let store = InMemoryAppointmentStore::default();
        store.create_specialization("Cardiology", "Heart").await.unwrap();
        assert_eq!(
            store.create_specialization("cardiology", "dup").await,
            Err(AppointmentError::DuplicateSpecialization("cardiology".to_string()))
        );

        store.insert(appointment(1, "doc", "p1", at(20, 10, 0))).await.unwrap();
        store.insert(appointment(2, "doc", "p2", at(20, 12, 0))).await.unwrap();

        let stats = store.specialization_stats(StatsPeriod::Day, at(20, 8, 0)).await.unwrap();
        assert_eq!(stats, vec![SpecializationStats { name: "Cardiology".to_string(), count: 2 }]);
        assert_eq!(store.count_appointments(StatsPeriod::Day, at(21, 8, 0)).await.unwrap(), 0);
        assert_eq!(store.count_appointments(StatsPeriod::All, at(21, 8, 0)).await.unwrap(), 2);
    }
}
