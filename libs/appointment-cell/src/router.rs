// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::state::AppState;

pub fn appointment_routes(state: Arc<AppState>) -> Router {
    Router::new()
        // Availability
        .route("/availability", get(handlers::check_availability))
        .route("/doctors/{doctor_id}/availability", get(handlers::check_doctor_availability))

        // Booking lifecycle
        .route("/confirm", post(handlers::confirm_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/payments/{order_id}/complete", post(handlers::complete_payment))

        // Listings
        .route("/patients/{patient_id}/upcoming", get(handlers::get_upcoming_appointments))
        .route("/orders/{order_id}", get(handlers::get_appointment_details))

        // Video, catalogue and admin
        .route("/video-rooms", post(handlers::create_video_room))
        .route("/specializations", post(handlers::add_specialization))
        .route("/statistics", get(handlers::fetch_statistics))
        .route("/reminders/run", post(handlers::run_reminder_sweep))
        .with_state(state)
}
