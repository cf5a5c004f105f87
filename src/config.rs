use std::env;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub calendar_api_url: String,
    pub calendar_api_token: String,
    pub notifier_api_url: String,
    pub notifier_api_token: String,

    /// Minimum lead time before a slot may start. Applied uniformly to
    /// listing and booking.
    pub min_lead_minutes: i64,
    pub slot_interval_min: i64,
    pub max_slot_results: usize,

    pub waitlist_max_wait_days: i64,
    pub waitlist_match_tolerance_hours: i64,
    pub waitlist_notify_top: usize,
    pub waitlist_notification_cap: i32,

    pub notification_max_retries: i32,
    /// Fixed retry delay. Deliberately not exponential.
    pub notification_retry_minutes: i64,
    pub notification_retention_days: i64,

    pub reconcile_window_days: i64,
    pub reconcile_interval_secs: u64,
    pub dispatch_interval_secs: u64,
    pub maintenance_interval_secs: u64,

    pub reminder_lead_hours: i64,
    pub late_cancel_hours: i64,
    pub port_timeout_secs: u64,
}

fn env_i64(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            calendar_api_url: env::var("CALENDAR_API_URL")
                .unwrap_or_else(|_| "http://localhost:8100/api/v1".to_string()),
            calendar_api_token: env::var("CALENDAR_API_TOKEN").unwrap_or_default(),
            notifier_api_url: env::var("NOTIFIER_API_URL")
                .unwrap_or_else(|_| "http://localhost:8200/api/v1/send".to_string()),
            notifier_api_token: env::var("NOTIFIER_API_TOKEN").unwrap_or_default(),
            min_lead_minutes: env_i64("MIN_LEAD_MINUTES", 30),
            slot_interval_min: env_i64("SLOT_INTERVAL_MIN", 30),
            max_slot_results: env_u64("MAX_SLOT_RESULTS", 20) as usize,
            waitlist_max_wait_days: env_i64("WAITLIST_MAX_WAIT_DAYS", 14),
            waitlist_match_tolerance_hours: env_i64("WAITLIST_MATCH_TOLERANCE_HOURS", 2),
            waitlist_notify_top: env_u64("WAITLIST_NOTIFY_TOP", 3) as usize,
            waitlist_notification_cap: env_i64("WAITLIST_NOTIFICATION_CAP", 10) as i32,
            notification_max_retries: env_i64("NOTIFICATION_MAX_RETRIES", 3) as i32,
            notification_retry_minutes: env_i64("NOTIFICATION_RETRY_MINUTES", 5),
            notification_retention_days: env_i64("NOTIFICATION_RETENTION_DAYS", 30),
            reconcile_window_days: env_i64("RECONCILE_WINDOW_DAYS", 30),
            reconcile_interval_secs: env_u64("RECONCILE_INTERVAL_SECS", 300),
            dispatch_interval_secs: env_u64("DISPATCH_INTERVAL_SECS", 60),
            maintenance_interval_secs: env_u64("MAINTENANCE_INTERVAL_SECS", 3600),
            reminder_lead_hours: env_i64("REMINDER_LEAD_HOURS", 24),
            late_cancel_hours: env_i64("LATE_CANCEL_HOURS", 24),
            port_timeout_secs: env_u64("PORT_TIMEOUT_SECS", 10),
        }
    }
}
