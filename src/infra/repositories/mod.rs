pub mod sqlite_booking_repo;
pub mod sqlite_notification_repo;
pub mod sqlite_schedule_repo;
pub mod sqlite_student_repo;
pub mod sqlite_waitlist_repo;
