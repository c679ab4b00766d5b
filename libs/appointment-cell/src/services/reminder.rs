// libs/appointment-cell/src/services/reminder.rs
use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use notification_cell::{AppointmentEvent, NotificationDispatcher, NotificationTopic};

use crate::clients::PatientClient;
use crate::models::AppointmentError;
use crate::services::clock::Clock;
use crate::services::store::AppointmentStore;
use crate::services::{bounded, ServiceSettings};

/// Appointments starting within this window get a reminder.
pub const REMINDER_WINDOW_HOURS: i64 = 12;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub considered: usize,
    pub dispatched: usize,
    /// Patient profile could not be fetched.
    pub skipped: usize,
    /// Dispatcher rejected the event.
    pub failed: usize,
}

/// One pass over upcoming appointments, sending a reminder per appointment.
pub struct ReminderSweep {
    store: Arc<dyn AppointmentStore>,
    patients: Arc<dyn PatientClient>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    settings: ServiceSettings,
    running: AtomicBool,
}

struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ReminderSweep {
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
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Returns `Ok(None)` without doing anything while another run is in flight.
    pub async fn run_once(&self) -> Result<Option<SweepReport>, AppointmentError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Reminder sweep already running, skipping this run");
            return Ok(None);
        }
        let _guard = RunGuard(&self.running);

        let now = self.clock.now();
        let until = now + Duration::hours(REMINDER_WINDOW_HOURS);
        let appointments = bounded(
            "store.find_in_window",
            self.settings.call_timeout,
            self.store.find_in_window(now, until),
        )
        .await?;

        info!("Sending reminders for {} appointments before {}", appointments.len(), until);

        let mut report = SweepReport {
            considered: appointments.len(),
            ..SweepReport::default()
        };
        let mut emails: HashMap<String, Option<String>> = HashMap::new();

        for appointment in appointments {
            if !appointment.is_active() {
                continue;
            }

            if !emails.contains_key(&appointment.patient_id) {
                let email = match bounded(
                    "patient.profile",
                    self.settings.call_timeout,
                    self.patients.profile(&appointment.patient_id),
                )
                .await
                {
                    Ok(profile) => Some(profile.email),
                    Err(e) => {
                        warn!("Failed to fetch profile of patient {}: {}", appointment.patient_id, e);
                        None
                    }
                };
                emails.insert(appointment.patient_id.clone(), email);
            }

            let Some(email) = emails.get(&appointment.patient_id).cloned().flatten() else {
                report.skipped += 1;
                continue;
            };

            let event = AppointmentEvent {
                appointment_id: appointment.appointment_id,
                email,
                doctor_id: appointment.doctor_id.clone(),
                appointment_date: self
                    .settings
                    .rules
                    .local_date(appointment.appointment_time)
                    .format("%Y-%m-%d")
                    .to_string(),
                appointment_type: appointment.appointment_type.to_string(),
                video_url: None,
            };

            match self.dispatcher.dispatch(NotificationTopic::DailyReminder, &event).await {
                Ok(()) => report.dispatched += 1,
                Err(e) => {
                    error!("Failed to send reminder for appointment {}: {}", appointment.appointment_id, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Reminder sweep done: {} dispatched, {} skipped, {} failed",
            report.dispatched, report.skipped, report.failed
        );
        Ok(Some(report))
    }
}

/// Runs the sweep once a day at a fixed local time until shut down.
pub struct ReminderScheduler {
    sweep: Arc<ReminderSweep>,
    clock: Arc<dyn Clock>,
    at: NaiveTime,
    settings: ServiceSettings,
}

impl ReminderScheduler {
    pub fn new(sweep: Arc<ReminderSweep>, clock: Arc<dyn Clock>, at: NaiveTime, settings: ServiceSettings) -> Self {
        Self {
            sweep,
            clock,
            at,
            settings,
        }
    }

    /// Next occurrence of the configured local time strictly after `now`.
    pub fn next_run_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let rules = &self.settings.rules;
        let mut date = rules.local_date(now);
        loop {
            match rules.at_local(date, self.at) {
                Some(candidate) if candidate > now => return candidate,
                _ => {}
            }
            date = match date.succ_opt() {
                Some(next) => next,
                None => return now + Duration::days(1),
            };
        }
    }

    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Reminder scheduler started, daily at {}", self.at);
            loop {
                let now = self.clock.now();
                let next = self.next_run_after(now);
                let wait = (next - now).to_std().unwrap_or_default();
                debug!("Next reminder sweep at {}", next);

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {
                        if let Err(e) = self.sweep.run_once().await {
                            error!("Reminder sweep failed: {}", e);
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Reminder scheduler stopped");
        })
    }
}
