use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use lesson_scheduler::config::Config;
use lesson_scheduler::domain::models::schedule::SchedulePolicy;
use lesson_scheduler::domain::ports::{
    CalendarEvent, CalendarEventDetails, CalendarPort, Clock, NotifierPort,
};
use lesson_scheduler::domain::services::messages;
use lesson_scheduler::error::AppError;
use lesson_scheduler::infra::repositories::{
    sqlite_booking_repo::SqliteBookingRepo, sqlite_notification_repo::SqliteNotificationRepo,
    sqlite_schedule_repo::SqliteScheduleRepo, sqlite_student_repo::SqliteStudentRepo,
    sqlite_waitlist_repo::SqliteWaitlistRepo,
};
use lesson_scheduler::state::{AppState, Ports};
use sqlx::sqlite::{SqlitePoolOptions, SqliteConnectOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tera::Tera;
use uuid::Uuid;

/// Every weekday bookable 10:00-18:00 UTC.
pub const FULL_WEEK_HOURS: &str = r#"{
    "monday":[{"start":"10:00","end":"18:00"}],
    "tuesday":[{"start":"10:00","end":"18:00"}],
    "wednesday":[{"start":"10:00","end":"18:00"}],
    "thursday":[{"start":"10:00","end":"18:00"}],
    "friday":[{"start":"10:00","end":"18:00"}],
    "saturday":[{"start":"10:00","end":"18:00"}],
    "sunday":[{"start":"10:00","end":"18:00"}]
}"#;

pub fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
        .and_utc()
}

/// Fixed "now" used by most tests: Saturday 2030-06-01 08:00 UTC.
pub fn test_now() -> DateTime<Utc> {
    dt(2030, 6, 1, 8, 0)
}

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap() = to;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Records deliveries; can be told to fail the next N sends.
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
    fail_remaining: Mutex<i64>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_remaining: Mutex::new(0),
        }
    }

    pub fn fail_next(&self, n: i64) {
        *self.fail_remaining.lock().unwrap() = n;
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl NotifierPort for RecordingNotifier {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), AppError> {
        {
            let mut remaining = self.fail_remaining.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(AppError::Notifier("Simulated channel failure".to_string()));
            }
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), text.to_string()));
        Ok(())
    }
}

/// In-memory calendar of record. Tests mutate events directly to simulate
/// out-of-band changes.
pub struct FakeCalendar {
    pub events: Mutex<Vec<CalendarEvent>>,
    fail_creates: Mutex<bool>,
    counter: AtomicU64,
}

impl FakeCalendar {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail_creates: Mutex::new(false),
            counter: AtomicU64::new(0),
        }
    }

    pub fn set_fail_creates(&self, fail: bool) {
        *self.fail_creates.lock().unwrap() = fail;
    }

    pub fn cancel_event(&self, event_id: &str) {
        let mut events = self.events.lock().unwrap();
        if let Some(event) = events.iter_mut().find(|e| e.id == event_id) {
            event.cancelled = true;
        }
    }

    pub fn move_event(&self, event_id: &str, new_start: DateTime<Utc>, new_end: DateTime<Utc>) {
        let mut events = self.events.lock().unwrap();
        if let Some(event) = events.iter_mut().find(|e| e.id == event_id) {
            event.start_time = new_start;
            event.end_time = new_end;
        }
    }

    pub fn push_foreign_event(&self, start: DateTime<Utc>, end: DateTime<Utc>, summary: &str) {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().push(CalendarEvent {
            id: format!("foreign-{}", n),
            booking_id: None,
            start_time: start,
            end_time: end,
            summary: summary.to_string(),
            cancelled: false,
        });
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

#[async_trait]
impl CalendarPort for FakeCalendar {
    async fn create_event(&self, details: &CalendarEventDetails) -> Result<String, AppError> {
        if *self.fail_creates.lock().unwrap() {
            return Err(AppError::Calendar("Simulated calendar outage".to_string()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let id = format!("cal-{}", n);
        self.events.lock().unwrap().push(CalendarEvent {
            id: id.clone(),
            booking_id: Some(details.booking_id.clone()),
            start_time: details.start_time,
            end_time: details.end_time,
            summary: details.summary.clone(),
            cancelled: false,
        });
        Ok(id)
    }

    async fn update_event(&self, event_id: &str, details: &CalendarEventDetails) -> Result<(), AppError> {
        let mut events = self.events.lock().unwrap();
        match events.iter_mut().find(|e| e.id == event_id) {
            Some(event) => {
                event.start_time = details.start_time;
                event.end_time = details.end_time;
                event.summary = details.summary.clone();
                Ok(())
            }
            None => Err(AppError::NotFound(format!("Event {} not found", event_id))),
        }
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), AppError> {
        let mut events = self.events.lock().unwrap();
        if let Some(event) = events.iter_mut().find(|e| e.id == event_id) {
            event.cancelled = true;
        }
        Ok(())
    }

    async fn list_events(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        include_cancelled: bool,
    ) -> Result<Vec<CalendarEvent>, AppError> {
        let events = self.events.lock().unwrap();
        Ok(events
            .iter()
            .filter(|e| e.start_time < to && e.end_time > from)
            .filter(|e| include_cancelled || !e.cancelled)
            .cloned()
            .collect())
    }
}

pub fn test_config(db_url: &str) -> Config {
    Config {
        database_url: db_url.to_string(),
        calendar_api_url: "http://localhost".to_string(),
        calendar_api_token: String::new(),
        notifier_api_url: "http://localhost".to_string(),
        notifier_api_token: String::new(),
        min_lead_minutes: 30,
        slot_interval_min: 30,
        max_slot_results: 20,
        waitlist_max_wait_days: 14,
        waitlist_match_tolerance_hours: 2,
        waitlist_notify_top: 3,
        waitlist_notification_cap: 10,
        notification_max_retries: 3,
        notification_retry_minutes: 5,
        notification_retention_days: 30,
        reconcile_window_days: 30,
        reconcile_interval_secs: 300,
        dispatch_interval_secs: 60,
        maintenance_interval_secs: 3600,
        reminder_lead_hours: 24,
        late_cancel_hours: 24,
        port_timeout_secs: 5,
    }
}

#[allow(dead_code)]
pub struct TestApp {
    pub state: Arc<AppState>,
    pub pool: Pool<Sqlite>,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub calendar: Arc<FakeCalendar>,
    pub db_filename: String,
}

impl TestApp {
    pub async fn new() -> Self {
        let db_filename = format!("test_{}.db", Uuid::new_v4());
        let db_url = format!("sqlite://{}?mode=rwc", db_filename);

        let connection_options = SqliteConnectOptions::from_str(&db_url)
            .unwrap()
            .create_if_missing(true)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .connect_with(connection_options)
            .await
            .expect("Failed to connect to test db");

        sqlx::migrate!("./migrations/sqlite")
            .run(&pool)
            .await
            .expect("Failed to migrate test db");

        let mut tera = Tera::default();
        messages::register_defaults(&mut tera).unwrap();
        let templates = Arc::new(tera);

        let clock = Arc::new(ManualClock::new(test_now()));
        let notifier = Arc::new(RecordingNotifier::new());
        let calendar = Arc::new(FakeCalendar::new());

        let config = test_config(&db_url);
        let schedule_repo = Arc::new(SqliteScheduleRepo::new(pool.clone()));

        let ports = Ports {
            booking_repo: Arc::new(SqliteBookingRepo::new(pool.clone())),
            student_repo: Arc::new(SqliteStudentRepo::new(pool.clone())),
            waitlist_repo: Arc::new(SqliteWaitlistRepo::new(pool.clone())),
            notification_repo: Arc::new(SqliteNotificationRepo::new(pool.clone())),
            schedule_repo: schedule_repo.clone(),
            calendar: calendar.clone(),
            notifier: notifier.clone(),
            clock: clock.clone(),
        };

        let state = Arc::new(AppState::assemble(config, ports, templates));

        let app = Self {
            state,
            pool,
            clock,
            notifier,
            calendar,
            db_filename,
        };
        app.seed_policy(FULL_WEEK_HOURS).await;
        app
    }

    pub async fn seed_policy(&self, config_json: &str) {
        let policy = SchedulePolicy {
            id: "policy".to_string(),
            timezone: "UTC".to_string(),
            config_json: config_json.to_string(),
            min_duration_min: 30,
            max_duration_min: 120,
            slot_interval_min: 30,
            buffer_after_min: 0,
            min_lead_minutes: 30,
            max_advance_days: 60,
            hourly_rate_cents: 4000,
            created_at: test_now(),
        };
        self.state
            .schedule_repo
            .upsert_policy(&policy)
            .await
            .expect("Failed to seed schedule policy");
    }

    /// Drains due notifications once, like one dispatch tick.
    pub async fn dispatch(&self) -> usize {
        self.state
            .notifications
            .process_due(50)
            .await
            .expect("dispatch failed")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_filename);
    }
}
