// libs/appointment-cell/src/state.rs
use std::sync::Arc;

use notification_cell::NotificationDispatcher;

use crate::clients::{DoctorClient, PatientClient, PaymentClient};
use crate::services::{
    AppointmentBookingService, AppointmentStore, Clock, ReminderSweep, ServiceSettings,
    SpecializationService, VideoRoomService,
};

/// Collaborators every appointment service is built from.
pub struct AppointmentDeps {
    pub store: Arc<dyn AppointmentStore>,
    pub doctors: Arc<dyn DoctorClient>,
    pub payments: Arc<dyn PaymentClient>,
    pub patients: Arc<dyn PatientClient>,
    pub dispatcher: Arc<dyn NotificationDispatcher>,
    pub clock: Arc<dyn Clock>,
    pub settings: ServiceSettings,
}

/// Router state shared by the appointment handlers.
pub struct AppState {
    pub booking: AppointmentBookingService,
    pub video: VideoRoomService,
    pub specializations: SpecializationService,
    pub reminders: Arc<ReminderSweep>,
}

impl AppState {
    pub fn new(deps: AppointmentDeps) -> Self {
        let booking = AppointmentBookingService::new(
            Arc::clone(&deps.store),
            Arc::clone(&deps.doctors),
            Arc::clone(&deps.payments),
            Arc::clone(&deps.clock),
            deps.settings.clone(),
        );
        let video = VideoRoomService::new(
            Arc::clone(&deps.store),
            Arc::clone(&deps.patients),
            Arc::clone(&deps.dispatcher),
            Arc::clone(&deps.clock),
            deps.settings.clone(),
        );
        let specializations = SpecializationService::new(
            Arc::clone(&deps.store),
            Arc::clone(&deps.doctors),
            Arc::clone(&deps.payments),
            Arc::clone(&deps.patients),
            Arc::clone(&deps.clock),
            deps.settings.clone(),
        );
        let reminders = Arc::new(ReminderSweep::new(
            deps.store,
            deps.patients,
            deps.dispatcher,
            deps.clock,
            deps.settings,
        ));

        Self {
            booking,
            video,
            specializations,
            reminders,
        }
    }
}
