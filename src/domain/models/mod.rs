pub mod booking;
pub mod notification;
pub mod schedule;
pub mod student;
pub mod waitlist;
