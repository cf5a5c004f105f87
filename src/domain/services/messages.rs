use crate::domain::models::booking::Booking;
use crate::domain::models::notification::NotificationKind;
use crate::domain::models::waitlist::WaitlistEntry;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

pub const BOOKING_CONFIRMED_BODY: &str = "Hi {{ student_name }}! Your {{ duration }} min lesson on {{ start_local }} is booked. Price: {{ price }}.";
pub const BOOKING_CANCELLED_BODY: &str = "Hi {{ student_name }}, your lesson on {{ start_local }} has been cancelled.{% if reason %} Reason: {{ reason }}.{% endif %}";
pub const BOOKING_RESCHEDULED_BODY: &str = "Hi {{ student_name }}, your lesson was moved to {{ start_local }} ({{ duration }} min).";
pub const BOOKING_TIME_CHANGED_BODY: &str = "Hi {{ student_name }}, the time of your lesson changed to {{ start_local }}.";
pub const WAITLIST_ADDED_BODY: &str = "Hi {{ student_name }}, you are on the waitlist at position {{ position }}. We will message you as soon as a matching slot opens up.";
pub const SLOT_AVAILABLE_BODY: &str = "Hi {{ student_name }}, a slot just opened up: {{ start_local }} ({{ duration }} min). Reply to claim it.";
pub const REMINDER_BODY: &str = "Hi {{ student_name }}, reminder: your lesson starts {{ start_local }}.";

pub fn template_name(kind: &NotificationKind) -> &'static str {
    match kind {
        NotificationKind::BookingConfirmed => "booking_confirmed",
        NotificationKind::BookingCancelled => "booking_cancelled",
        NotificationKind::BookingRescheduled => "booking_rescheduled",
        NotificationKind::BookingTimeChanged => "booking_time_changed",
        NotificationKind::WaitlistAdded => "waitlist_added",
        NotificationKind::SlotAvailable => "slot_available",
        NotificationKind::Reminder => "reminder",
    }
}

pub fn register_defaults(tera: &mut tera::Tera) -> Result<(), tera::Error> {
    tera.add_raw_template("booking_confirmed", BOOKING_CONFIRMED_BODY)?;
    tera.add_raw_template("booking_cancelled", BOOKING_CANCELLED_BODY)?;
    tera.add_raw_template("booking_rescheduled", BOOKING_RESCHEDULED_BODY)?;
    tera.add_raw_template("booking_time_changed", BOOKING_TIME_CHANGED_BODY)?;
    tera.add_raw_template("waitlist_added", WAITLIST_ADDED_BODY)?;
    tera.add_raw_template("slot_available", SLOT_AVAILABLE_BODY)?;
    tera.add_raw_template("reminder", REMINDER_BODY)?;
    Ok(())
}

pub fn format_local(instant: DateTime<Utc>, tz: &Tz) -> String {
    instant.with_timezone(tz).format("%a %d.%m.%Y %H:%M").to_string()
}

pub fn format_price(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

pub fn booking_context(booking: &Booking, tz: &Tz) -> tera::Context {
    let mut ctx = tera::Context::new();
    ctx.insert("student_name", &booking.student_name);
    ctx.insert("start_local", &format_local(booking.start_time, tz));
    ctx.insert("duration", &booking.duration_min);
    ctx.insert("price", &format_price(booking.price_cents));
    ctx.insert("reason", &booking.cancel_reason);
    ctx
}

pub fn waitlist_context(entry: &WaitlistEntry) -> tera::Context {
    let mut ctx = tera::Context::new();
    ctx.insert("student_name", &entry.student_name);
    ctx.insert("position", &entry.position);
    ctx.insert("duration", &entry.duration_min);
    ctx
}

pub fn slot_offer_context(
    entry: &WaitlistEntry,
    freed_start: DateTime<Utc>,
    duration_min: i64,
    tz: &Tz,
) -> tera::Context {
    let mut ctx = tera::Context::new();
    ctx.insert("student_name", &entry.student_name);
    ctx.insert("start_local", &format_local(freed_start, tz));
    ctx.insert("duration", &duration_min);
    ctx
}
