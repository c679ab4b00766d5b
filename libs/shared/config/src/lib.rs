use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub redis_url: Option<String>,
    pub doctor_service_url: String,
    pub payment_service_url: String,
    pub patient_service_url: String,
    pub collaborator_timeout_secs: u64,
    pub appointment_fee: i64,
    pub payment_page_url: String,
    pub video_call_base_url: String,
    pub clinic_utc_offset_minutes: i32,
    pub slot_search_lookahead_days: i64,
    /// Local wall-clock time of the daily reminder sweep, as (hour, minute).
    pub reminder_time: (u32, u32),
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            port: parsed_var("APPT_PORT", 3000),
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, falling back to in-memory appointment store");
                    String::new()
                }),
            supabase_service_key: env::var("SUPABASE_SERVICE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_KEY not set, using empty value");
                    String::new()
                }),
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
            doctor_service_url: string_var("DOCTOR_SERVICE_URL", "http://localhost:8081"),
            payment_service_url: string_var("PAYMENT_SERVICE_URL", "http://localhost:8082"),
            patient_service_url: string_var("PATIENT_SERVICE_URL", "http://localhost:8083"),
            collaborator_timeout_secs: parsed_var("COLLABORATOR_TIMEOUT_SECS", 5),
            appointment_fee: parsed_var("APPOINTMENT_FEE", 200),
            payment_page_url: string_var("PAYMENT_PAGE_URL", "http://localhost:8080/api/v1/payment"),
            video_call_base_url: string_var("VIDEO_CALL_BASE_URL", "http://localhost:8080/api/v1"),
            clinic_utc_offset_minutes: parsed_var("CLINIC_UTC_OFFSET_MINUTES", 0),
            slot_search_lookahead_days: parsed_var("SLOT_SEARCH_LOOKAHEAD_DAYS", 30),
            reminder_time: env::var("REMINDER_TIME")
                .ok()
                .and_then(|raw| parse_clock_time(&raw))
                .unwrap_or_else(|| {
                    warn!("REMINDER_TIME not set or invalid, using default 07:00");
                    (7, 0)
                }),
        };

        if config.redis_url.is_none() {
            warn!("REDIS_URL not set - notifications will only be logged");
        }

        config
    }

    /// True when the Postgres-backed store can be used.
    pub fn is_database_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_service_key.is_empty()
    }

    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_secs(self.collaborator_timeout_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            supabase_url: String::new(),
            supabase_service_key: String::new(),
            redis_url: None,
            doctor_service_url: "http://localhost:8081".to_string(),
            payment_service_url: "http://localhost:8082".to_string(),
            patient_service_url: "http://localhost:8083".to_string(),
            collaborator_timeout_secs: 5,
            appointment_fee: 200,
            payment_page_url: "http://localhost:8080/api/v1/payment".to_string(),
            video_call_base_url: "http://localhost:8080/api/v1".to_string(),
            clinic_utc_offset_minutes: 0,
            slot_search_lookahead_days: 30,
            reminder_time: (7, 0),
        }
    }
}

fn string_var(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        warn!("{} not set, using default {}", key, default);
        default.to_string()
    })
}

fn parsed_var<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

/// Parses `HH:MM` into (hour, minute).
fn parse_clock_time(raw: &str) -> Option<(u32, u32)> {
    let (hour, minute) = raw.trim().split_once(':')?;
    let hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.parse().ok()?;
    (hour < 24 && minute < 60).then_some((hour, minute))
}
