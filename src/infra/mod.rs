pub mod calendar;
pub mod clock;
pub mod factory;
pub mod notify;
pub mod repositories;
