use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::Context;
use chrono::NaiveTime;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::clients::{HttpDoctorClient, HttpPatientClient, HttpPaymentClient};
use appointment_cell::{
    AppState, AppointmentDeps, AppointmentStore, Clock, InMemoryAppointmentStore, ReminderScheduler,
    ServiceSettings, SupabaseAppointmentStore, SystemClock,
};
use notification_cell::{LoggingDispatcher, NotificationDispatcher, RedisNotificationDispatcher};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting appointment API server");

    // Load configuration
    let config = AppConfig::from_env();
    let settings = ServiceSettings::from_config(&config);

    let store: Arc<dyn AppointmentStore> = if config.is_database_configured() {
        info!("Using Supabase appointment store at {}", config.supabase_url);
        Arc::new(SupabaseAppointmentStore::new(
            Arc::new(SupabaseClient::new(&config)),
            settings.rules.clone(),
        ))
    } else {
        warn!("Database not configured, appointments are kept in memory only");
        Arc::new(InMemoryAppointmentStore::new(settings.rules.clone()))
    };

    let dispatcher = notification_dispatcher(&config).await;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let state = Arc::new(AppState::new(AppointmentDeps {
        store,
        doctors: Arc::new(HttpDoctorClient::new(&config)),
        payments: Arc::new(HttpPaymentClient::new(&config)),
        patients: Arc::new(HttpPatientClient::new(&config)),
        dispatcher,
        clock: Arc::clone(&clock),
        settings: settings.clone(),
    }));

    // Daily reminders
    let (hour, minute) = config.reminder_time;
    let reminder_at = NaiveTime::from_hms_opt(hour, minute, 0)
        .with_context(|| format!("invalid reminder time {:02}:{:02}", hour, minute))?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reminders = ReminderScheduler::new(Arc::clone(&state.reminders), clock, reminder_at, settings)
        .spawn(shutdown_rx);

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = reminders.await {
        warn!("Reminder scheduler ended abnormally: {}", e);
    }

    info!("Appointment API stopped");
    Ok(())
}

async fn notification_dispatcher(config: &AppConfig) -> Arc<dyn NotificationDispatcher> {
    match config.redis_url.as_deref() {
        Some(url) => match RedisNotificationDispatcher::new(url).await {
            Ok(dispatcher) => Arc::new(dispatcher),
            Err(e) => {
                warn!("Redis unavailable ({}), notifications will only be logged", e);
                Arc::new(LoggingDispatcher::new())
            }
        },
        None => {
            warn!("REDIS_URL not set, notifications will only be logged");
            Arc::new(LoggingDispatcher::new())
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
