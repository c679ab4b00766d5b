// libs/appointment-cell/src/services/booking.rs
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::clients::{DoctorClient, PaymentClient};
use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, AvailabilitySlot, BookingOutcome,
    CancelAppointmentRequest, ConfirmAppointmentRequest, DoctorAvailability, PaymentOrderRequest,
    SlotResolution, APPOINTMENT_DURATION_MINUTES,
};
use crate::services::clock::Clock;
use crate::services::resolver::SlotResolver;
use crate::services::store::AppointmentStore;
use crate::services::{bounded, ServiceSettings};

const APPOINTMENT_FEE_TYPE: &str = "appointment fee";

/// Sequences doctor availability, slot resolution, payment-order creation
/// and the store write for a booking.
pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
    resolver: SlotResolver,
    doctors: Arc<dyn DoctorClient>,
    payments: Arc<dyn PaymentClient>,
    clock: Arc<dyn Clock>,
    settings: ServiceSettings,
}

impl AppointmentBookingService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        doctors: Arc<dyn DoctorClient>,
        payments: Arc<dyn PaymentClient>,
        clock: Arc<dyn Clock>,
        settings: ServiceSettings,
    ) -> Self {
        let resolver = SlotResolver::new(Arc::clone(&store), settings.rules.clone(), settings.call_timeout);
        Self {
            store,
            resolver,
            doctors,
            payments,
            clock,
            settings,
        }
    }

    // ==============================================================================
    // AVAILABILITY
    // ==============================================================================

    pub async fn check_availability(
        &self,
        category_id: i32,
        requested_at: DateTime<Utc>,
    ) -> Result<Vec<AvailabilitySlot>, AppointmentError> {
        debug!("Checking availability for category {} at {}", category_id, requested_at);

        let slots = bounded(
            "doctor.available_slots",
            self.settings.call_timeout,
            self.doctors.available_slots(category_id, requested_at),
        )
        .await?;

        info!("Doctor service returned {} slots for category {}", slots.len(), category_id);
        Ok(slots)
    }

    pub async fn check_availability_by_doctor(&self, doctor_id: &str) -> Result<DoctorAvailability, AppointmentError> {
        bounded(
            "doctor.doctor_availability",
            self.settings.call_timeout,
            self.doctors.doctor_availability(doctor_id),
        )
        .await
    }

    // ==============================================================================
    // CONFIRMATION
    // ==============================================================================

    /// Reserves a slot pending payment, or returns guidance when the slot
    /// cannot be reserved. Nothing is written unless the payment order succeeds.
    pub async fn confirm_appointment(
        &self,
        request: ConfirmAppointmentRequest,
    ) -> Result<BookingOutcome, AppointmentError> {
        info!(
            "Confirming appointment for patient {} with doctor {} at {}",
            request.patient_id, request.doctor_id, request.appointment_time
        );
        self.validate_confirm_request(&request)?;

        let requested_day = self.settings.rules.local_date(request.appointment_time);
        let availability = self.check_availability_by_doctor(&request.doctor_id).await?;
        if availability.unavailable_dates(&self.settings.rules)?.contains(&requested_day) {
            info!("Doctor {} declared {} unavailable", request.doctor_id, requested_day);
            return Err(AppointmentError::DoctorUnavailable);
        }

        let resolution = self
            .resolver
            .resolve(
                &request.doctor_id,
                &request.patient_id,
                request.appointment_time,
                self.settings.rules.slot_duration(),
            )
            .await?;

        match resolution {
            SlotResolution::Available => {}
            SlotResolution::PendingPayment { existing } => {
                info!(
                    "Patient {} has pending appointment {} on {}",
                    request.patient_id, existing.appointment_id, requested_day
                );
                return Ok(BookingOutcome::PendingPayment {
                    appointment_id: existing.appointment_id,
                    payment_url: self.settings.pending_payment_url(&existing.payment_id),
                    message: format!(
                        "you have already booked an appointment for this day ({}) but not completed the payment, please complete the payment to confirm your schedule",
                        existing.appointment_time
                    ),
                });
            }
            SlotResolution::AlreadyBooked { existing } => {
                return Err(AppointmentError::AlreadyBooked(existing.appointment_time.to_rfc3339()));
            }
            SlotResolution::Suggested { suggested_time } => {
                let local = self.settings.rules.local(suggested_time);
                return Ok(BookingOutcome::SuggestedSlot {
                    suggested_time,
                    message: format!(
                        "No slot available. Suggested next slot: {}",
                        local.format("%Y-%m-%d %-I:%M %p")
                    ),
                });
            }
            SlotResolution::NoSlotAvailable => {
                return Ok(BookingOutcome::NoSlotAvailable {
                    message: "No available slots within working hours".to_string(),
                });
            }
        }

        let appointment_id = bounded(
            "store.next_appointment_id",
            self.settings.call_timeout,
            self.store.next_appointment_id(),
        )
        .await?;

        let order_request = PaymentOrderRequest {
            patient_id: request.patient_id.clone(),
            amount: self.settings.rules.appointment_fee,
            appointment_id,
            order_type: APPOINTMENT_FEE_TYPE.to_string(),
        };
        let order = bounded(
            "payment.create_order",
            self.settings.call_timeout,
            self.payments.create_order(&order_request),
        )
        .await
        .map_err(|e| {
            error!("Payment order for appointment {} failed: {}", appointment_id, e);
            e
        })?;

        if !order.is_success() {
            warn!(
                "Payment service refused order for appointment {}: {}",
                appointment_id, order.message
            );
            return Err(AppointmentError::collaborator("payment", order.message));
        }

        let now = self.clock.now();
        let appointment = Appointment {
            appointment_id,
            patient_id: request.patient_id,
            doctor_id: request.doctor_id,
            specialization_id: request.specialization_id,
            appointment_time: request.appointment_time,
            duration_minutes: APPOINTMENT_DURATION_MINUTES,
            status: AppointmentStatus::Pending,
            payment_id: order.order_id.clone(),
            appointment_type: request.appointment_type,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        };

        let stored = bounded("store.insert", self.settings.call_timeout, self.store.insert(appointment))
            .await
            .map_err(|e| {
                warn!(
                    "Appointment {} not stored after payment order {} was created: {}",
                    appointment_id, order.order_id, e
                );
                e
            })?;

        let payment_url = if order.payment_url.is_empty() {
            self.settings.pending_payment_url(&order.order_id)
        } else {
            order.payment_url
        };

        info!(
            "Appointment {} reserved for patient {}, awaiting payment {}",
            stored.appointment_id, stored.patient_id, stored.payment_id
        );

        Ok(BookingOutcome::Reserved {
            appointment_id: stored.appointment_id,
            payment_id: stored.payment_id,
            payment_url,
            message: "Appointment successfully confirmed".to_string(),
        })
    }

    fn validate_confirm_request(&self, request: &ConfirmAppointmentRequest) -> Result<(), AppointmentError> {
        if request.patient_id.trim().is_empty() {
            return Err(AppointmentError::Validation("patient_id is required".to_string()));
        }
        if request.doctor_id.trim().is_empty() {
            return Err(AppointmentError::Validation("doctor_id is required".to_string()));
        }
        if request.appointment_time <= self.clock.now() {
            return Err(AppointmentError::Validation(
                "appointment time must be in the future".to_string(),
            ));
        }
        Ok(())
    }

    // ==============================================================================
    // LIFECYCLE
    // ==============================================================================

    pub async fn cancel_appointment(
        &self,
        appointment_id: i64,
        request: CancelAppointmentRequest,
    ) -> Result<String, AppointmentError> {
        info!("Cancelling appointment {} for patient {}", appointment_id, request.patient_id);

        let appointment = bounded(
            "store.find_for_patient",
            self.settings.call_timeout,
            self.store.find_for_patient(appointment_id, &request.patient_id),
        )
        .await?
        .ok_or_else(|| AppointmentError::NotFound("appointment not found".to_string()))?;

        if appointment.status == AppointmentStatus::Pending {
            return Err(AppointmentError::PaymentNotCompleted);
        }
        if appointment.appointment_time <= self.clock.now() {
            return Err(AppointmentError::AlreadyStarted);
        }
        if appointment.status == AppointmentStatus::Cancelled {
            return Err(AppointmentError::AlreadyCancelled);
        }

        let reason = Some(request.reason.trim().to_string()).filter(|r| !r.is_empty());
        let cancelled = bounded(
            "store.transition_status",
            self.settings.call_timeout,
            self.store.transition_status(
                appointment_id,
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
                reason,
                self.clock.now(),
            ),
        )
        .await?;

        match cancelled {
            Some(_) => {
                info!("Appointment {} cancelled", appointment_id);
                Ok("Appointment cancelled successfully".to_string())
            }
            None => {
                // Status moved between the read and the write.
                warn!("Appointment {} changed concurrently during cancellation", appointment_id);
                Err(AppointmentError::AlreadyCancelled)
            }
        }
    }

    /// Payment-side callback: Pending → Confirmed. Repeated calls are no-ops.
    pub async fn complete_payment(&self, order_id: &str) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment_details(order_id).await?;

        match appointment.status {
            AppointmentStatus::Confirmed => {
                debug!("Appointment {} already confirmed", appointment.appointment_id);
                Ok(appointment)
            }
            AppointmentStatus::Cancelled => Err(AppointmentError::AlreadyCancelled),
            AppointmentStatus::Pending => {
                let updated = bounded(
                    "store.transition_status",
                    self.settings.call_timeout,
                    self.store.transition_status(
                        appointment.appointment_id,
                        AppointmentStatus::Pending,
                        AppointmentStatus::Confirmed,
                        None,
                        self.clock.now(),
                    ),
                )
                .await?;

                match updated {
                    Some(confirmed) => {
                        info!(
                            "Payment {} completed, appointment {} confirmed",
                            order_id, confirmed.appointment_id
                        );
                        Ok(confirmed)
                    }
                    None => {
                        let current = self.get_appointment_details(order_id).await?;
                        match current.status {
                            AppointmentStatus::Confirmed => Ok(current),
                            _ => Err(AppointmentError::AlreadyCancelled),
                        }
                    }
                }
            }
        }
    }

    // ==============================================================================
    // QUERIES
    // ==============================================================================

    pub async fn get_upcoming_appointments(&self, patient_id: &str) -> Result<Vec<Appointment>, AppointmentError> {
        let now = self.clock.now();
        let appointments = bounded(
            "store.find_by_patient",
            self.settings.call_timeout,
            self.store.find_by_patient(patient_id),
        )
        .await?;

        let mut upcoming: Vec<Appointment> = appointments
            .into_iter()
            .filter(|a| a.appointment_time > now)
            .collect();
        upcoming.sort_by_key(|a| a.appointment_time);
        Ok(upcoming)
    }

    pub async fn get_appointment_details(&self, order_id: &str) -> Result<Appointment, AppointmentError> {
        bounded(
            "store.find_by_payment_id",
            self.settings.call_timeout,
            self.store.find_by_payment_id(order_id),
        )
        .await?
        .ok_or_else(|| AppointmentError::NotFound(format!("appointment for order {}", order_id)))
    }
}
