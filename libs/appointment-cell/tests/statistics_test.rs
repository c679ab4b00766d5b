mod common;

use assert_matches::assert_matches;

use appointment_cell::*;
use common::*;

fn specialization(name: &str) -> AddSpecializationRequest {
    AddSpecializationRequest {
        name: name.to_string(),
        description: format!("{} department", name),
    }
}

#[tokio::test]
async fn test_add_specialization_rejects_duplicates() {
    let harness = Harness::new();

    let created = harness
        .state
        .specializations
        .add_specialization(specialization("Cardiology"))
        .await
        .unwrap();
    assert_eq!(created.id, 1);

    let duplicate = harness
        .state
        .specializations
        .add_specialization(specialization("CARDIOLOGY"))
        .await;
    assert_matches!(duplicate, Err(AppointmentError::DuplicateSpecialization(_)));

    let blank = harness
        .state
        .specializations
        .add_specialization(specialization("  "))
        .await;
    assert_matches!(blank, Err(AppointmentError::Validation(_)));
}

#[tokio::test]
async fn test_statistics_combine_local_and_collaborator_totals() {
    let harness = Harness::builder()
        .now(at(6, 0))
        .doctors(FakeDoctorClient { doctor_count: 12, ..FakeDoctorClient::default() })
        .payments(FakePaymentClient { revenue: 1400.0, ..FakePaymentClient::default() })
        .patients(FakePatientClient { patient_count: 40, ..FakePatientClient::default() })
        .build();

    let specializations = &harness.state.specializations;
    specializations.add_specialization(specialization("Cardiology")).await.unwrap();
    specializations.add_specialization(specialization("Dermatology")).await.unwrap();

    let mut derm = stored_appointment(3, "p3", "doctor-3", at(14, 0), AppointmentStatus::Confirmed, AppointmentType::InPerson);
    derm.specialization_id = 2;
    for appointment in [
        stored_appointment(1, "p1", DOCTOR, at(9, 0), AppointmentStatus::Confirmed, AppointmentType::InPerson),
        stored_appointment(2, "p2", DOCTOR, at(11, 0), AppointmentStatus::Pending, AppointmentType::Video),
        derm,
        stored_appointment(4, "p4", DOCTOR, day_at(1, 9, 0), AppointmentStatus::Confirmed, AppointmentType::InPerson),
    ] {
        harness.store.insert(appointment).await.unwrap();
    }

    let today = specializations.fetch_statistics(StatsPeriod::Day).await.unwrap();
    assert_eq!(today.totals.total_appointments, 3);
    assert_eq!(today.totals.total_doctors, 12);
    assert_eq!(today.totals.total_patients, 40);
    assert_eq!(today.totals.total_revenue, 1400.0);
    assert_eq!(
        today.specialization_stats,
        vec![
            SpecializationStats { name: "Cardiology".to_string(), count: 2 },
            SpecializationStats { name: "Dermatology".to_string(), count: 1 },
        ]
    );

    let month = specializations.fetch_statistics(StatsPeriod::Month).await.unwrap();
    assert_eq!(month.totals.total_appointments, 4);
}

#[tokio::test]
async fn test_statistics_fail_when_collaborator_fails() {
    let harness = Harness::builder()
        .doctors(FakeDoctorClient { fail: true, ..FakeDoctorClient::default() })
        .build();

    let result = harness.state.specializations.fetch_statistics(StatsPeriod::Week).await;
    assert_matches!(result, Err(AppointmentError::Collaborator { .. }));
}
