use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{ConnectOptions, SqlitePool};
use tera::Tera;
use tracing::info;
use tracing::log::LevelFilter;

use crate::config::Config;
use crate::domain::services::messages;
use crate::infra::calendar::http_calendar_service::HttpCalendarService;
use crate::infra::clock::SystemClock;
use crate::infra::notify::http_notifier::HttpNotifier;
use crate::infra::repositories::{
    sqlite_booking_repo::SqliteBookingRepo, sqlite_notification_repo::SqliteNotificationRepo,
    sqlite_schedule_repo::SqliteScheduleRepo, sqlite_student_repo::SqliteStudentRepo,
    sqlite_waitlist_repo::SqliteWaitlistRepo,
};
use crate::state::{AppState, Ports};

pub async fn bootstrap_state(config: &Config) -> AppState {
    info!("Initializing SQLite connection with WAL mode...");

    let opts = SqliteConnectOptions::from_str(&config.database_url)
        .expect("Invalid SQLite connection string")
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .log_statements(LevelFilter::Debug)
        .log_slow_statements(LevelFilter::Warn, Duration::from_millis(500));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(opts)
        .await
        .expect("Failed to connect to SQLite");

    run_migrations(&pool).await;

    let mut tera = Tera::default();
    messages::register_defaults(&mut tera).expect("Failed to register message templates");
    let templates = Arc::new(tera);

    let ports = Ports {
        booking_repo: Arc::new(SqliteBookingRepo::new(pool.clone())),
        student_repo: Arc::new(SqliteStudentRepo::new(pool.clone())),
        waitlist_repo: Arc::new(SqliteWaitlistRepo::new(pool.clone())),
        notification_repo: Arc::new(SqliteNotificationRepo::new(pool.clone())),
        schedule_repo: Arc::new(SqliteScheduleRepo::new(pool.clone())),
        calendar: Arc::new(HttpCalendarService::new(
            config.calendar_api_url.clone(),
            config.calendar_api_token.clone(),
            config.port_timeout_secs,
        )),
        notifier: Arc::new(HttpNotifier::new(
            config.notifier_api_url.clone(),
            config.notifier_api_token.clone(),
            config.port_timeout_secs,
        )),
        clock: Arc::new(SystemClock),
    };

    AppState::assemble(config.clone(), ports, templates)
}

async fn run_migrations(pool: &SqlitePool) {
    sqlx::migrate!("./migrations/sqlite")
        .run(pool)
        .await
        .expect("Failed to run SQLite migrations");
}
