// libs/appointment-cell/src/models.rs
use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone,
    Timelike, Utc,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use shared_config::AppConfig;

/// Every appointment occupies one hour.
pub const APPOINTMENT_DURATION_MINUTES: i64 = 60;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub appointment_id: i64,
    pub patient_id: String,
    pub doctor_id: String,
    pub specialization_id: i32,
    pub appointment_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub status: AppointmentStatus,
    /// Order reference returned by the payment service.
    pub payment_id: String,
    pub appointment_type: AppointmentType,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn end_time(&self) -> DateTime<Utc> {
        self.appointment_time + Duration::minutes(self.duration_minutes)
    }

    /// Cancelled appointments free their slot.
    pub fn is_active(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }

    /// Half-open interval test: `[start, end)` against this appointment's window.
    /// Touching boundaries do not overlap, so back-to-back bookings are allowed.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.appointment_time < end && start < self.end_time()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AppointmentType {
    #[serde(rename = "video", alias = "Video", alias = "online")]
    Video,

    #[serde(rename = "in-person", alias = "in_person", alias = "InPerson", alias = "offline")]
    InPerson,
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentType::Video => write!(f, "video"),
            AppointmentType::InPerson => write!(f, "in-person"),
        }
    }
}

/// Room created for a video consultation, linked to its appointment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoTreatment {
    pub room_id: String,
    pub appointment_id: i64,
    pub specialization_id: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRoom {
    pub room_id: String,
    pub appointment_id: i64,
    /// Join link for the doctor; the patient's link travels in the notification.
    pub room_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Specialization {
    pub id: i32,
    pub name: String,
    pub description: String,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmAppointmentRequest {
    pub patient_id: String,
    pub doctor_id: String,
    pub specialization_id: i32,
    pub appointment_time: DateTime<Utc>,
    pub appointment_type: AppointmentType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub patient_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVideoRoomRequest {
    pub patient_id: String,
    pub doctor_id: String,
    pub specialization_id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddSpecializationRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Result of a confirmation attempt that did not fail.
///
/// Only `Reserved` creates a record; the other variants are guidance for the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BookingOutcome {
    Reserved {
        appointment_id: i64,
        payment_id: String,
        payment_url: String,
        message: String,
    },
    PendingPayment {
        appointment_id: i64,
        payment_url: String,
        message: String,
    },
    SuggestedSlot {
        suggested_time: DateTime<Utc>,
        message: String,
    },
    NoSlotAvailable {
        message: String,
    },
}

impl BookingOutcome {
    pub fn payment_url(&self) -> Option<&str> {
        match self {
            BookingOutcome::Reserved { payment_url, .. }
            | BookingOutcome::PendingPayment { payment_url, .. } => Some(payment_url),
            _ => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            BookingOutcome::Reserved { message, .. }
            | BookingOutcome::PendingPayment { message, .. }
            | BookingOutcome::SuggestedSlot { message, .. }
            | BookingOutcome::NoSlotAvailable { message } => message,
        }
    }
}

/// Outcome of the local availability check for one doctor/patient/time.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotResolution {
    Available,
    /// Same patient, doctor and day, still awaiting payment.
    PendingPayment { existing: Appointment },
    /// Same patient, doctor and day, already paid.
    AlreadyBooked { existing: Appointment },
    Suggested { suggested_time: DateTime<Utc> },
    NoSlotAvailable,
}

// ==============================================================================
// COLLABORATOR MODELS
// ==============================================================================

/// Derived on demand from doctor-service data; never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailabilitySlot {
    pub doctor_id: String,
    pub doctor_name: String,
    #[serde(default)]
    pub date_time: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorAvailability {
    pub doctor_id: String,
    #[serde(default)]
    pub doctor_availability: Vec<DoctorAvailabilityEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorAvailabilityEntry {
    /// `Mon Jan 2 15:04:05 2006` or RFC 3339.
    pub date_time: String,
    /// `"available"` or `"unavailable"`.
    pub is_available: String,
}

impl DoctorAvailabilityEntry {
    pub fn is_unavailable(&self) -> bool {
        self.is_available.eq_ignore_ascii_case("unavailable")
    }

    /// Clinic wall-clock time of the entry.
    pub fn parsed_date_time(&self, rules: &SchedulingRules) -> Option<NaiveDateTime> {
        parse_doctor_date_time(&self.date_time, rules.utc_offset)
    }
}

impl DoctorAvailability {
    /// Clinic-local dates the doctor declared unavailable; fails on the first unparseable entry.
    pub fn unavailable_dates(&self, rules: &SchedulingRules) -> Result<Vec<NaiveDate>, AppointmentError> {
        self.doctor_availability
            .iter()
            .filter(|entry| entry.is_unavailable())
            .map(|entry| {
                entry.parsed_date_time(rules).map(|dt| dt.date()).ok_or_else(|| {
                    AppointmentError::Collaborator {
                        service: "doctor".to_string(),
                        message: format!("invalid doctor availability date format: {}", entry.date_time),
                    }
                })
            })
            .collect()
    }
}

/// ANSIC values carry no zone and are read as clinic wall-clock; RFC 3339
/// values are shifted into the clinic offset.
fn parse_doctor_date_time(raw: &str, clinic_offset: FixedOffset) -> Option<NaiveDateTime> {
    // ANSIC pads single-digit days with a space; collapse runs of whitespace first.
    let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    NaiveDateTime::parse_from_str(&normalized, "%a %b %d %H:%M:%S %Y")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw.trim())
                .ok()
                .map(|dt| dt.with_timezone(&clinic_offset).naive_local())
        })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOrderRequest {
    pub patient_id: String,
    pub amount: i64,
    pub appointment_id: i64,
    #[serde(rename = "type")]
    pub order_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentOrder {
    pub status: String,
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub payment_url: String,
    #[serde(default)]
    pub message: String,
}

impl PaymentOrder {
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientProfile {
    pub patient_id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

// ==============================================================================
// STATISTICS MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatsPeriod {
    Day,
    Week,
    Month,
    All,
}

impl StatsPeriod {
    /// Unknown values fall back to `All`.
    pub fn from_param(param: &str) -> Self {
        match param.trim().to_ascii_lowercase().as_str() {
            "day" => StatsPeriod::Day,
            "week" => StatsPeriod::Week,
            "month" => StatsPeriod::Month,
            _ => StatsPeriod::All,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatsPeriod::Day => "day",
            StatsPeriod::Week => "week",
            StatsPeriod::Month => "month",
            StatsPeriod::All => "all",
        }
    }

    /// Whether `time` falls in the current day/ISO week/month of `now`, in clinic time.
    pub fn contains(&self, rules: &SchedulingRules, now: DateTime<Utc>, time: DateTime<Utc>) -> bool {
        let today = rules.local_date(now);
        let date = rules.local_date(time);
        match self {
            StatsPeriod::Day => date == today,
            StatsPeriod::Week => date.iso_week() == today.iso_week(),
            StatsPeriod::Month => date.year() == today.year() && date.month() == today.month(),
            StatsPeriod::All => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpecializationStats {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatisticsData {
    pub total_appointments: i64,
    pub total_patients: i64,
    pub total_doctors: i64,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsReport {
    pub period: StatsPeriod,
    pub specialization_stats: Vec<SpecializationStats>,
    pub totals: StatisticsData,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error, PartialEq)]
pub enum AppointmentError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("doctor is not available on this date")]
    DoctorUnavailable,

    #[error("you have already booked an appointment for this day ({0})")]
    AlreadyBooked(String),

    #[error("this appointment payment not completed")]
    PaymentNotCompleted,

    #[error("this appointment is already started")]
    AlreadyStarted,

    #[error("this appointment is already cancelled")]
    AlreadyCancelled,

    #[error("requested slot was taken by a concurrent booking")]
    SlotConflict,

    #[error("Category is already exist: {0}")]
    DuplicateSpecialization(String),

    #[error("patient doesn't have an upcoming video appointment")]
    NoVideoAppointment,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{service} service error: {message}")]
    Collaborator { service: String, message: String },

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("Database error: {0}")]
    Database(String),
}

impl AppointmentError {
    pub fn collaborator(service: &str, message: impl Into<String>) -> Self {
        AppointmentError::Collaborator {
            service: service.to_string(),
            message: message.into(),
        }
    }

    /// Rejections the caller can act on, as opposed to system faults.
    pub fn is_validation_conflict(&self) -> bool {
        matches!(
            self,
            AppointmentError::DoctorUnavailable
                | AppointmentError::AlreadyBooked(_)
                | AppointmentError::PaymentNotCompleted
                | AppointmentError::AlreadyStarted
                | AppointmentError::AlreadyCancelled
                | AppointmentError::SlotConflict
                | AppointmentError::DuplicateSpecialization(_)
                | AppointmentError::NoVideoAppointment
                | AppointmentError::Validation(_)
        )
    }
}

// ==============================================================================
// SCHEDULING RULES
// ==============================================================================

#[derive(Debug, Clone)]
pub struct SchedulingRules {
    pub opening_hour: u32,
    /// First hour outside working hours; a slot starting exactly at it is rejected.
    pub closing_hour: u32,
    pub search_step_hours: i64,
    pub slot_minutes: i64,
    pub lookahead_days: i64,
    pub utc_offset: FixedOffset,
    pub appointment_fee: i64,
}

impl Default for SchedulingRules {
    fn default() -> Self {
        Self {
            opening_hour: 8,
            closing_hour: 19,
            search_step_hours: 4,
            slot_minutes: APPOINTMENT_DURATION_MINUTES,
            lookahead_days: 30,
            utc_offset: utc(),
            appointment_fee: 200,
        }
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

impl SchedulingRules {
    pub fn from_config(config: &AppConfig) -> Self {
        let utc_offset = FixedOffset::east_opt(config.clinic_utc_offset_minutes * 60)
            .unwrap_or_else(|| {
                warn!(
                    "CLINIC_UTC_OFFSET_MINUTES {} out of range, using UTC",
                    config.clinic_utc_offset_minutes
                );
                utc()
            });

        Self {
            lookahead_days: config.slot_search_lookahead_days.max(1),
            utc_offset,
            appointment_fee: config.appointment_fee,
            ..Self::default()
        }
    }

    pub fn slot_duration(&self) -> Duration {
        Duration::minutes(self.slot_minutes)
    }

    pub fn local(&self, time: DateTime<Utc>) -> DateTime<FixedOffset> {
        time.with_timezone(&self.utc_offset)
    }

    pub fn local_date(&self, time: DateTime<Utc>) -> NaiveDate {
        self.local(time).date_naive()
    }

    pub fn is_within_working_hours(&self, time: DateTime<Utc>) -> bool {
        let hour = self.local(time).hour();
        hour >= self.opening_hour && hour < self.closing_hour
    }

    /// Opening time on `date` in clinic time, as UTC.
    pub fn opening_on(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        self.at_local(date, NaiveTime::from_hms_opt(self.opening_hour, 0, 0)?)
    }

    /// Clinic wall-clock `date`/`time` as UTC.
    pub fn at_local(&self, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
        self.utc_offset
            .from_local_datetime(&date.and_time(time))
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Whole slot starts and ends inside the working day. Suggestions must
    /// satisfy this; direct requests only need the start hour check.
    pub fn slot_fits_working_day(&self, start: DateTime<Utc>) -> bool {
        if !self.is_within_working_hours(start) {
            return false;
        }
        let local_start = self.local(start);
        let local_end = self.local(start + self.slot_duration());
        let closing = NaiveTime::from_hms_opt(self.closing_hour, 0, 0);
        local_end.date_naive() == local_start.date_naive()
            && closing.is_some_and(|closing| local_end.time() <= closing)
    }

    /// `time` itself when inside working hours, otherwise the next opening.
    pub fn next_working_time(&self, time: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.is_within_working_hours(time) {
            return Some(time);
        }
        self.next_opening_after(time)
    }

    /// `start` itself when the whole slot fits the working day, otherwise the next opening.
    pub fn next_bookable_start(&self, start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.slot_fits_working_day(start) {
            return Some(start);
        }
        self.next_opening_after(start)
    }

    fn next_opening_after(&self, time: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local = self.local(time);
        let date = if local.hour() < self.opening_hour {
            local.date_naive()
        } else {
            local.date_naive().succ_opt()?
        };
        self.opening_on(date)
    }
}
