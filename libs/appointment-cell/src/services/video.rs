// libs/appointment-cell/src/services/video.rs
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use notification_cell::{AppointmentEvent, NotificationDispatcher, NotificationTopic};

use crate::clients::PatientClient;
use crate::models::{Appointment, AppointmentError, CreateVideoRoomRequest, VideoRoom, VideoTreatment};
use crate::services::clock::Clock;
use crate::services::store::AppointmentStore;
use crate::services::{bounded, ServiceSettings};

pub struct VideoRoomService {
    store: Arc<dyn AppointmentStore>,
    patients: Arc<dyn PatientClient>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    settings: ServiceSettings,
}

impl VideoRoomService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        patients: Arc<dyn PatientClient>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        clock: Arc<dyn Clock>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            store,
            patients,
            dispatcher,
            clock,
            settings,
        }
    }

    /// Creates a room for the patient's next video appointment and returns the
    /// doctor's join link. The patient's link is sent as a notification.
    pub async fn create_room(&self, request: CreateVideoRoomRequest) -> Result<VideoRoom, AppointmentError> {
        info!(
            "Creating video room for patient {} with doctor {}",
            request.patient_id, request.doctor_id
        );

        let now = self.clock.now();
        let appointment = bounded(
            "store.find_upcoming_video",
            self.settings.call_timeout,
            self.store.find_upcoming_video(&request.patient_id, now),
        )
        .await?
        .ok_or(AppointmentError::NoVideoAppointment)?;

        let room_id = Uuid::new_v4().to_string();
        let treatment = VideoTreatment {
            room_id: room_id.clone(),
            appointment_id: appointment.appointment_id,
            specialization_id: request.specialization_id,
            created_at: now,
        };
        bounded(
            "store.save_video_treatment",
            self.settings.call_timeout,
            self.store.save_video_treatment(treatment),
        )
        .await?;

        let room_url = format!("{}/doctor/video-call/{}", self.settings.video_call_base_url, room_id);
        let patient_url = format!("{}/patient/video-call/{}", self.settings.video_call_base_url, room_id);
        self.notify_patient(appointment.clone(), request.doctor_id, patient_url);

        info!("Video room {} created for appointment {}", room_id, appointment.appointment_id);
        Ok(VideoRoom {
            room_id,
            appointment_id: appointment.appointment_id,
            room_url,
        })
    }

    fn notify_patient(&self, appointment: Appointment, doctor_id: String, patient_url: String) {
        let patients = Arc::clone(&self.patients);
        let dispatcher = Arc::clone(&self.dispatcher);
        let call_timeout = self.settings.call_timeout;
        let appointment_date = self
            .settings
            .rules
            .local_date(appointment.appointment_time)
            .format("%Y-%m-%d")
            .to_string();

        tokio::spawn(async move {
            let profile = match bounded("patient.profile", call_timeout, patients.profile(&appointment.patient_id)).await {
                Ok(profile) => profile,
                Err(e) => {
                    warn!(
                        "Skipping video room notification for appointment {}: {}",
                        appointment.appointment_id, e
                    );
                    return;
                }
            };

            let event = AppointmentEvent {
                appointment_id: appointment.appointment_id,
                email: profile.email,
                doctor_id,
                appointment_date,
                appointment_type: appointment.appointment_type.to_string(),
                video_url: Some(patient_url),
            };

            if let Err(e) = dispatcher.dispatch(NotificationTopic::VideoRoomReady, &event).await {
                error!(
                    "Failed to dispatch video room event for appointment {}: {}",
                    appointment.appointment_id, e
                );
            }
        });
    }
}
