// libs/appointment-cell/src/services/resolver.rs
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{debug, info};

use crate::models::{AppointmentError, AppointmentStatus, SchedulingRules, SlotResolution};
use crate::services::bounded;
use crate::services::store::AppointmentStore;

/// Decides whether a doctor/patient/time combination is bookable.
///
/// Reads through the store only; never writes.
pub struct SlotResolver {
    store: Arc<dyn AppointmentStore>,
    rules: SchedulingRules,
    call_timeout: StdDuration,
}

impl SlotResolver {
    pub fn new(store: Arc<dyn AppointmentStore>, rules: SchedulingRules, call_timeout: StdDuration) -> Self {
        Self { store, rules, call_timeout }
    }

    pub fn rules(&self) -> &SchedulingRules {
        &self.rules
    }

    pub async fn resolve(
        &self,
        doctor_id: &str,
        patient_id: &str,
        requested_time: DateTime<Utc>,
        duration: Duration,
    ) -> Result<SlotResolution, AppointmentError> {
        let day = self.rules.local_date(requested_time);
        let same_day = bounded(
            "store.find_patient_booking_on",
            self.call_timeout,
            self.store.find_patient_booking_on(doctor_id, patient_id, day),
        )
        .await?;

        if let Some(existing) = same_day {
            debug!(
                "Patient {} already holds appointment {} with doctor {} on {}",
                patient_id, existing.appointment_id, doctor_id, day
            );
            return Ok(match existing.status {
                AppointmentStatus::Pending => SlotResolution::PendingPayment { existing },
                _ => SlotResolution::AlreadyBooked { existing },
            });
        }

        let overlapping = self.overlaps(doctor_id, requested_time, duration).await?;
        if overlapping == 0 && self.rules.is_within_working_hours(requested_time) {
            return Ok(SlotResolution::Available);
        }

        info!(
            "Doctor {} not bookable at {} ({} overlapping), searching for an alternative",
            doctor_id, requested_time, overlapping
        );
        self.suggest(doctor_id, requested_time, duration).await
    }

    /// Walks forward in fixed steps, wrapping to the next opening whenever a
    /// candidate slot would not fit the working day.
    async fn suggest(
        &self,
        doctor_id: &str,
        requested_time: DateTime<Utc>,
        duration: Duration,
    ) -> Result<SlotResolution, AppointmentError> {
        let horizon = requested_time + Duration::days(self.rules.lookahead_days);
        let step = Duration::hours(self.rules.search_step_hours);
        let mut candidate = requested_time;

        loop {
            candidate = match self.rules.next_bookable_start(candidate + step) {
                Some(next) => next,
                None => return Ok(SlotResolution::NoSlotAvailable),
            };

            if candidate > horizon {
                info!("No free slot for doctor {} within {} days", doctor_id, self.rules.lookahead_days);
                return Ok(SlotResolution::NoSlotAvailable);
            }

            if self.overlaps(doctor_id, candidate, duration).await? == 0 {
                return Ok(SlotResolution::Suggested { suggested_time: candidate });
            }
        }
    }

    async fn overlaps(
        &self,
        doctor_id: &str,
        start: DateTime<Utc>,
        duration: Duration,
    ) -> Result<usize, AppointmentError> {
        bounded(
            "store.count_doctor_overlaps",
            self.call_timeout,
            self.store.count_doctor_overlaps(doctor_id, start, start + duration),
        )
        .await
    }
}
