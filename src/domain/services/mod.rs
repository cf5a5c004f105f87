pub mod availability;
pub mod booking_service;
pub mod messages;
pub mod notification_service;
pub mod reconciler;
pub mod slots;
pub mod waitlist_service;
