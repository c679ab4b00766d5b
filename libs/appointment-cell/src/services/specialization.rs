// libs/appointment-cell/src/services/specialization.rs
use std::sync::Arc;
use tracing::info;

use crate::clients::{DoctorClient, PatientClient, PaymentClient};
use crate::models::{
    AddSpecializationRequest, AppointmentError, Specialization, StatisticsData, StatisticsReport,
    StatsPeriod,
};
use crate::services::clock::Clock;
use crate::services::store::AppointmentStore;
use crate::services::{bounded, ServiceSettings};

/// Specialization catalogue and the admin statistics view.
pub struct SpecializationService {
    store: Arc<dyn AppointmentStore>,
    doctors: Arc<dyn DoctorClient>,
    payments: Arc<dyn PaymentClient>,
    patients: Arc<dyn PatientClient>,
    clock: Arc<dyn Clock>,
    settings: ServiceSettings,
}

impl SpecializationService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        doctors: Arc<dyn DoctorClient>,
        payments: Arc<dyn PaymentClient>,
        patients: Arc<dyn PatientClient>,
        clock: Arc<dyn Clock>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            store,
            doctors,
            payments,
            patients,
            clock,
            settings,
        }
    }

    pub async fn add_specialization(
        &self,
        request: AddSpecializationRequest,
    ) -> Result<Specialization, AppointmentError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AppointmentError::Validation("specialization name is required".to_string()));
        }

        let specialization = bounded(
            "store.create_specialization",
            self.settings.call_timeout,
            self.store.create_specialization(name, request.description.trim()),
        )
        .await?;

        info!("Specialization {} created with id {}", specialization.name, specialization.id);
        Ok(specialization)
    }

    /// Collects local counts and collaborator totals concurrently; any failure
    /// fails the whole report.
    pub async fn fetch_statistics(&self, period: StatsPeriod) -> Result<StatisticsReport, AppointmentError> {
        let now = self.clock.now();
        let limit = self.settings.call_timeout;
        info!("Fetching statistics for period {}", period.as_str());

        let (specialization_stats, total_appointments, total_patients, total_doctors, total_revenue) = tokio::join!(
            bounded("store.specialization_stats", limit, self.store.specialization_stats(period, now)),
            bounded("store.count_appointments", limit, self.store.count_appointments(period, now)),
            bounded("patient.total_patient_count", limit, self.patients.total_patient_count()),
            bounded("doctor.total_doctor_count", limit, self.doctors.total_doctor_count(period)),
            bounded("payment.total_revenue", limit, self.payments.total_revenue(period)),
        );

        Ok(StatisticsReport {
            period,
            specialization_stats: specialization_stats?,
            totals: StatisticsData {
                total_appointments: total_appointments?,
                total_patients: total_patients?,
                total_doctors: total_doctors?,
                total_revenue: total_revenue?,
            },
        })
    }
}
