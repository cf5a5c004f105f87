use crate::config::Config;
use crate::domain::ports::{
    BookingRepository, CalendarPort, Clock, NotificationRepository, NotifierPort,
    ScheduleRepository, StudentRepository, WaitlistRepository,
};
use crate::domain::services::availability::AvailabilityChecker;
use crate::domain::services::booking_service::BookingService;
use crate::domain::services::notification_service::NotificationService;
use crate::domain::services::reconciler::CalendarReconciler;
use crate::domain::services::waitlist_service::WaitlistService;
use std::sync::Arc;
use tera::Tera;

/// Every port adapter the engine is wired with. Tests pass fakes here.
pub struct Ports {
    pub booking_repo: Arc<dyn BookingRepository>,
    pub student_repo: Arc<dyn StudentRepository>,
    pub waitlist_repo: Arc<dyn WaitlistRepository>,
    pub notification_repo: Arc<dyn NotificationRepository>,
    pub schedule_repo: Arc<dyn ScheduleRepository>,
    pub calendar: Arc<dyn CalendarPort>,
    pub notifier: Arc<dyn NotifierPort>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub booking_repo: Arc<dyn BookingRepository>,
    pub student_repo: Arc<dyn StudentRepository>,
    pub waitlist_repo: Arc<dyn WaitlistRepository>,
    pub notification_repo: Arc<dyn NotificationRepository>,
    pub schedule_repo: Arc<dyn ScheduleRepository>,
    pub calendar: Arc<dyn CalendarPort>,
    pub notifier: Arc<dyn NotifierPort>,
    pub clock: Arc<dyn Clock>,
    pub availability: Arc<AvailabilityChecker>,
    pub bookings: Arc<BookingService>,
    pub waitlist: Arc<WaitlistService>,
    pub notifications: Arc<NotificationService>,
    pub reconciler: Arc<CalendarReconciler>,
    pub templates: Arc<Tera>,
}

impl AppState {
    /// Assembles the service graph over a set of ports. Central wiring so
    /// production bootstrap and tests build identical graphs.
    pub fn assemble(config: Config, ports: Ports, templates: Arc<Tera>) -> Self {
        let notifications = Arc::new(NotificationService::new(
            ports.notification_repo.clone(),
            ports.notifier.clone(),
            ports.clock.clone(),
            templates.clone(),
            &config,
        ));
        let waitlist = Arc::new(WaitlistService::new(
            ports.waitlist_repo.clone(),
            ports.schedule_repo.clone(),
            notifications.clone(),
            ports.clock.clone(),
            &config,
        ));
        let bookings = Arc::new(BookingService::new(
            ports.booking_repo.clone(),
            ports.student_repo.clone(),
            ports.schedule_repo.clone(),
            ports.calendar.clone(),
            notifications.clone(),
            waitlist.clone(),
            ports.clock.clone(),
            &config,
        ));
        let availability = Arc::new(AvailabilityChecker::new(
            ports.schedule_repo.clone(),
            ports.booking_repo.clone(),
            ports.clock.clone(),
            &config,
        ));
        let reconciler = Arc::new(CalendarReconciler::new(
            ports.calendar.clone(),
            bookings.clone(),
            ports.clock.clone(),
            &config,
        ));

        Self {
            config,
            booking_repo: ports.booking_repo,
            student_repo: ports.student_repo,
            waitlist_repo: ports.waitlist_repo,
            notification_repo: ports.notification_repo,
            schedule_repo: ports.schedule_repo,
            calendar: ports.calendar,
            notifier: ports.notifier,
            clock: ports.clock,
            availability,
            bookings,
            waitlist,
            notifications,
            reconciler,
            templates,
        }
    }
}
