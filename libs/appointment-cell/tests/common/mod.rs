#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;
use tokio::sync::mpsc;

use appointment_cell::clients::{DoctorClient, PatientClient, PaymentClient};
use appointment_cell::*;
use notification_cell::{AppointmentEvent, NotificationDispatcher, NotificationError, NotificationTopic};

pub const DOCTOR: &str = "doctor-1";
pub const PATIENT: &str = "patient-1";

/// 2026-10-20 at the given UTC hour/minute.
pub fn at(h: u32, m: u32) -> DateTime<Utc> {
    day_at(20, h, m)
}

pub fn day_at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, day, h, m, 0).unwrap()
}

pub fn confirm_request(patient: &str, doctor: &str, time: DateTime<Utc>) -> ConfirmAppointmentRequest {
    ConfirmAppointmentRequest {
        patient_id: patient.to_string(),
        doctor_id: doctor.to_string(),
        specialization_id: 1,
        appointment_time: time,
        appointment_type: AppointmentType::InPerson,
    }
}

pub fn stored_appointment(
    id: i64,
    patient: &str,
    doctor: &str,
    time: DateTime<Utc>,
    status: AppointmentStatus,
    kind: AppointmentType,
) -> Appointment {
    Appointment {
        appointment_id: id,
        patient_id: patient.to_string(),
        doctor_id: doctor.to_string(),
        specialization_id: 1,
        appointment_time: time,
        duration_minutes: 60,
        status,
        payment_id: format!("order_{}", id),
        appointment_type: kind,
        cancellation_reason: None,
        created_at: time,
        updated_at: time,
    }
}

// ==============================================================================
// FAKE COLLABORATORS
// ==============================================================================

#[derive(Default)]
pub struct FakeDoctorClient {
    pub unavailable: Mutex<Vec<DoctorAvailabilityEntry>>,
    pub slots: Mutex<Vec<AvailabilitySlot>>,
    pub doctor_count: i64,
    pub fail: bool,
}

impl FakeDoctorClient {
    /// `date_time` in either format the doctor service sends (ANSIC or RFC 3339).
    pub fn unavailable_on(&self, date_time: &str) {
        self.unavailable.lock().unwrap().push(DoctorAvailabilityEntry {
            date_time: date_time.to_string(),
            is_available: "unavailable".to_string(),
        });
    }
}

#[async_trait]
impl DoctorClient for FakeDoctorClient {
    async fn available_slots(
        &self,
        _category_id: i32,
        _requested_at: DateTime<Utc>,
    ) -> Result<Vec<AvailabilitySlot>, AppointmentError> {
        if self.fail {
            return Err(AppointmentError::collaborator("doctor", "unreachable"));
        }
        Ok(self.slots.lock().unwrap().clone())
    }

    async fn doctor_availability(&self, doctor_id: &str) -> Result<DoctorAvailability, AppointmentError> {
        if self.fail {
            return Err(AppointmentError::collaborator("doctor", "unreachable"));
        }
        Ok(DoctorAvailability {
            doctor_id: doctor_id.to_string(),
            doctor_availability: self.unavailable.lock().unwrap().clone(),
        })
    }

    async fn total_doctor_count(&self, _period: StatsPeriod) -> Result<i64, AppointmentError> {
        if self.fail {
            return Err(AppointmentError::collaborator("doctor", "unreachable"));
        }
        Ok(self.doctor_count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PaymentMode {
    Success,
    Refused,
    Unreachable,
    Hang,
}

pub struct FakePaymentClient {
    pub mode: Mutex<PaymentMode>,
    pub requests: Mutex<Vec<PaymentOrderRequest>>,
    pub revenue: f64,
}

impl Default for FakePaymentClient {
    fn default() -> Self {
        Self {
            mode: Mutex::new(PaymentMode::Success),
            requests: Mutex::new(Vec::new()),
            revenue: 0.0,
        }
    }
}

impl FakePaymentClient {
    pub fn set_mode(&self, mode: PaymentMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentClient for FakePaymentClient {
    async fn create_order(&self, request: &PaymentOrderRequest) -> Result<PaymentOrder, AppointmentError> {
        self.requests.lock().unwrap().push(request.clone());
        let mode = *self.mode.lock().unwrap();

        match mode {
            PaymentMode::Success => {
                let order_id = format!("order_{}", request.appointment_id);
                Ok(PaymentOrder {
                    status: "success".to_string(),
                    payment_url: format!("https://pay.example.com/{}", order_id),
                    order_id,
                    message: "order created".to_string(),
                })
            }
            PaymentMode::Refused => Ok(PaymentOrder {
                status: "failed".to_string(),
                order_id: String::new(),
                payment_url: String::new(),
                message: "card declined".to_string(),
            }),
            PaymentMode::Unreachable => Err(AppointmentError::collaborator("payment", "connection refused")),
            PaymentMode::Hang => {
                tokio::time::sleep(StdDuration::from_secs(30)).await;
                Err(AppointmentError::collaborator("payment", "hung"))
            }
        }
    }

    async fn total_revenue(&self, _period: StatsPeriod) -> Result<f64, AppointmentError> {
        Ok(self.revenue)
    }
}

#[derive(Default)]
pub struct FakePatientClient {
    pub emails: Mutex<HashMap<String, String>>,
    pub patient_count: i64,
    pub lookups: AtomicUsize,
}

impl FakePatientClient {
    pub fn with_patient(self, patient_id: &str, email: &str) -> Self {
        self.emails
            .lock()
            .unwrap()
            .insert(patient_id.to_string(), email.to_string());
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PatientClient for FakePatientClient {
    async fn profile(&self, patient_id: &str) -> Result<PatientProfile, AppointmentError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let email = self.emails.lock().unwrap().get(patient_id).cloned();
        match email {
            Some(email) => Ok(PatientProfile {
                patient_id: patient_id.to_string(),
                email,
                name: None,
            }),
            None => Err(AppointmentError::collaborator("patient", format!("{} not found", patient_id))),
        }
    }

    async fn total_patient_count(&self) -> Result<i64, AppointmentError> {
        Ok(self.patient_count)
    }
}

/// Forwards every event to a channel the test can read.
pub struct ChannelDispatcher {
    tx: mpsc::UnboundedSender<(NotificationTopic, AppointmentEvent)>,
}

impl ChannelDispatcher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(NotificationTopic, AppointmentEvent)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl NotificationDispatcher for ChannelDispatcher {
    async fn dispatch(&self, topic: NotificationTopic, event: &AppointmentEvent) -> Result<(), NotificationError> {
        self.tx
            .send((topic, event.clone()))
            .map_err(|e| NotificationError::Unavailable(e.to_string()))
    }
}

pub struct FailingDispatcher;

#[async_trait]
impl NotificationDispatcher for FailingDispatcher {
    async fn dispatch(&self, _topic: NotificationTopic, _event: &AppointmentEvent) -> Result<(), NotificationError> {
        Err(NotificationError::Unavailable("broker down".to_string()))
    }
}

// ==============================================================================
// HARNESS
// ==============================================================================

pub struct Harness {
    pub store: Arc<InMemoryAppointmentStore>,
    pub clock: Arc<ManualClock>,
    pub doctors: Arc<FakeDoctorClient>,
    pub payments: Arc<FakePaymentClient>,
    pub patients: Arc<FakePatientClient>,
    pub events: mpsc::UnboundedReceiver<(NotificationTopic, AppointmentEvent)>,
    pub state: Arc<AppState>,
}

pub struct HarnessBuilder {
    now: DateTime<Utc>,
    doctors: FakeDoctorClient,
    payments: FakePaymentClient,
    patients: FakePatientClient,
    dispatcher: Option<Arc<dyn NotificationDispatcher>>,
    settings: ServiceSettings,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            now: at(6, 0),
            doctors: FakeDoctorClient::default(),
            payments: FakePaymentClient::default(),
            patients: FakePatientClient::default().with_patient(PATIENT, "patient@example.com"),
            dispatcher: None,
            settings: ServiceSettings {
                call_timeout: StdDuration::from_millis(300),
                ..ServiceSettings::default()
            },
        }
    }
}

impl HarnessBuilder {
    pub fn now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn doctors(mut self, doctors: FakeDoctorClient) -> Self {
        self.doctors = doctors;
        self
    }

    pub fn payments(mut self, payments: FakePaymentClient) -> Self {
        self.payments = payments;
        self
    }

    pub fn patients(mut self, patients: FakePatientClient) -> Self {
        self.patients = patients;
        self
    }

    pub fn utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.settings.rules.utc_offset = FixedOffset::east_opt(minutes * 60).unwrap();
        self
    }

    pub fn dispatcher(mut self, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn build(self) -> Harness {
        let store = Arc::new(InMemoryAppointmentStore::new(self.settings.rules.clone()));
        let clock = Arc::new(ManualClock::new(self.now));
        let doctors = Arc::new(self.doctors);
        let payments = Arc::new(self.payments);
        let patients = Arc::new(self.patients);
        let (channel, events) = ChannelDispatcher::new();
        let dispatcher = self.dispatcher.unwrap_or_else(|| Arc::new(channel));

        let state = Arc::new(AppState::new(AppointmentDeps {
            store: store.clone(),
            doctors: doctors.clone(),
            payments: payments.clone(),
            patients: patients.clone(),
            dispatcher,
            clock: clock.clone(),
            settings: self.settings,
        }));

        Harness {
            store,
            clock,
            doctors,
            payments,
            patients,
            events,
            state,
        }
    }
}

impl Harness {
    pub fn new() -> Self {
        HarnessBuilder::default().build()
    }

    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    pub fn booking(&self) -> &AppointmentBookingService {
        &self.state.booking
    }

    /// Waits briefly for the next dispatched event.
    pub async fn next_event(&mut self) -> Option<(NotificationTopic, AppointmentEvent)> {
        tokio::time::timeout(StdDuration::from_secs(2), self.events.recv())
            .await
            .ok()
            .flatten()
    }

    /// True when nothing is dispatched within a short grace period.
    pub async fn no_event(&mut self) -> bool {
        tokio::time::timeout(StdDuration::from_millis(200), self.events.recv())
            .await
            .is_err()
    }
}
