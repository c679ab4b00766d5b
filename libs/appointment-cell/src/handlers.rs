// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use shared_models::error::AppError;

use crate::models::{
    AddSpecializationRequest, AppointmentError, CancelAppointmentRequest, ConfirmAppointmentRequest,
    CreateVideoRoomRequest, StatsPeriod,
};
use crate::state::AppState;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub category_id: i32,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct StatisticsQuery {
    pub period: Option<String>,
}

fn to_app_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::NotFound(msg) => AppError::NotFound(msg),
        AppointmentError::Validation(msg) => AppError::ValidationError(msg),
        AppointmentError::Collaborator { .. } => AppError::ExternalService(e.to_string()),
        AppointmentError::Timeout { .. } => AppError::Timeout(e.to_string()),
        AppointmentError::Database(msg) => AppError::Database(msg),
        other if other.is_validation_conflict() => AppError::Conflict(other.to_string()),
        other => AppError::Internal(other.to_string()),
    }
}

// ==============================================================================
// AVAILABILITY HANDLERS
// ==============================================================================

pub async fn check_availability(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let slots = state
        .booking
        .check_availability(query.category_id, query.requested_at)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "available_slots": slots
    })))
}

pub async fn check_doctor_availability(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let availability = state
        .booking
        .check_availability_by_doctor(&doctor_id)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "doctor_id": availability.doctor_id,
        "doctor_availability": availability.doctor_availability
    })))
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

pub async fn confirm_appointment(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ConfirmAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let outcome = state
        .booking
        .confirm_appointment(request)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "payment_url": outcome.payment_url(),
        "message": outcome.message(),
        "booking": outcome
    })))
}

pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<i64>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let message = state
        .booking
        .cancel_appointment(appointment_id, request)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "message": message
    })))
}

pub async fn complete_payment(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .booking
        .complete_payment(&order_id)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Payment completed, appointment confirmed",
        "appointment": appointment
    })))
}

// ==============================================================================
// QUERY HANDLERS
// ==============================================================================

pub async fn get_upcoming_appointments(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let appointments = state
        .booking
        .get_upcoming_appointments(&patient_id)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "appointments": appointments
    })))
}

pub async fn get_appointment_details(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .booking
        .get_appointment_details(&order_id)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

// ==============================================================================
// VIDEO, CATALOGUE AND ADMIN HANDLERS
// ==============================================================================

pub async fn create_video_room(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateVideoRoomRequest>,
) -> Result<Json<Value>, AppError> {
    let room = state.video.create_room(request).await.map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "room_id": room.room_id,
        "appointment_id": room.appointment_id,
        "room_url": room.room_url
    })))
}

pub async fn add_specialization(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AddSpecializationRequest>,
) -> Result<Json<Value>, AppError> {
    let specialization = state
        .specializations
        .add_specialization(request)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Category created successfully",
        "specialization": specialization
    })))
}

pub async fn fetch_statistics(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<Value>, AppError> {
    let period = query
        .period
        .as_deref()
        .map(StatsPeriod::from_param)
        .unwrap_or(StatsPeriod::All);

    let report = state
        .specializations
        .fetch_statistics(period)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "period": report.period,
        "specialization_stats": report.specialization_stats,
        "totals": report.totals
    })))
}

pub async fn run_reminder_sweep(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let report = state.reminders.run_once().await.map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "started": report.is_some(),
        "report": report
    })))
}
