use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::appointment_routes;
use appointment_cell::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Appointment API is running!" }))
        .nest("/appointments", appointment_routes(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use appointment_cell::clients::{HttpDoctorClient, HttpPatientClient, HttpPaymentClient};
    use appointment_cell::{AppointmentDeps, InMemoryAppointmentStore, ServiceSettings, SystemClock};
    use notification_cell::LoggingDispatcher;
    use shared_config::AppConfig;

    fn test_state() -> Arc<AppState> {
        let config = AppConfig::default();
        let settings = ServiceSettings::from_config(&config);
        Arc::new(AppState::new(AppointmentDeps {
            store: Arc::new(InMemoryAppointmentStore::new(settings.rules.clone())),
            doctors: Arc::new(HttpDoctorClient::new(&config)),
            payments: Arc::new(HttpPaymentClient::new(&config)),
            patients: Arc::new(HttpPatientClient::new(&config)),
            dispatcher: Arc::new(LoggingDispatcher::new()),
            clock: Arc::new(SystemClock),
            settings,
        }))
    }

    #[tokio::test]
    async fn test_root_and_nested_routes() {
        let app = create_router(test_state());

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/appointments/orders/order_missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
