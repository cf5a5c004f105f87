mod common;

use chrono::NaiveDate;
use common::*;
use lesson_scheduler::domain::models::booking::{Booking, BookingStatus};
use lesson_scheduler::domain::models::notification::NotificationKind;
use lesson_scheduler::domain::models::waitlist::{WaitlistPreference, WaitlistStatus};
use lesson_scheduler::domain::services::booking_service::BookRequest;

async fn book_monday_1400(app: &TestApp) -> Booking {
    app.state
        .bookings
        .book(BookRequest {
            start: dt(2030, 6, 3, 14, 0),
            duration_min: 60,
            student_name: "Anna".to_string(),
            student_contact: "anna@example.com".to_string(),
            note: None,
        })
        .await
        .unwrap()
}

async fn reload(app: &TestApp, id: &str) -> Booking {
    app.state
        .booking_repo
        .find_by_id(id)
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn test_external_cancellation_is_applied_exactly_once() {
    let app = TestApp::new().await;
    let booking = book_monday_1400(&app).await;
    let event_id = booking.calendar_event_id.clone().unwrap();

    app.calendar.cancel_event(&event_id);
    app.state.reconciler.run_once().await.unwrap();

    let cancelled = reload(&app, &booking.id).await;
    assert_eq!(cancelled.status, BookingStatus::CancelledByTeacher);
    assert_eq!(
        cancelled.cancel_reason.as_deref(),
        Some("cancelled in external calendar")
    );
    assert!(cancelled.calendar_event_id.is_none());

    let records = app
        .state
        .notification_repo
        .list_for_booking(&booking.id)
        .await
        .unwrap();
    let cancel_notices = records
        .iter()
        .filter(|r| r.kind == NotificationKind::BookingCancelled)
        .count();
    assert_eq!(cancel_notices, 1);

    // A second pass over the same calendar state changes nothing.
    app.state.reconciler.run_once().await.unwrap();
    let after = reload(&app, &booking.id).await;
    assert_eq!(after.status, BookingStatus::CancelledByTeacher);
    let records = app
        .state
        .notification_repo
        .list_for_booking(&booking.id)
        .await
        .unwrap();
    assert_eq!(records.len(), 2);

    // The window is back on the market.
    let date = NaiveDate::from_ymd_opt(2030, 6, 3).unwrap();
    let slots = app.state.availability.slots_for_date(date, 60).await.unwrap();
    assert!(slots.iter().any(|s| s.start == dt(2030, 6, 3, 14, 0)));
}

#[tokio::test]
async fn test_external_cancellation_feeds_the_waitlist() {
    let app = TestApp::new().await;
    let booking = book_monday_1400(&app).await;
    let entry = app
        .state
        .waitlist
        .enqueue(
            "stu-1".to_string(),
            "Ben".to_string(),
            "ben@example.com".to_string(),
            WaitlistPreference {
                duration_min: 60,
                preferred_start: Some(dt(2030, 6, 3, 14, 0)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    app.calendar.cancel_event(&booking.calendar_event_id.clone().unwrap());
    app.state.reconciler.run_once().await.unwrap();

    let entry = app
        .state
        .waitlist_repo
        .find_by_id(&entry.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.status, WaitlistStatus::Notified);
    assert_eq!(entry.notification_count, 1);
}

#[tokio::test]
async fn test_external_time_change_moves_booking_once() {
    let app = TestApp::new().await;
    let booking = book_monday_1400(&app).await;
    let event_id = booking.calendar_event_id.clone().unwrap();

    app.calendar
        .move_event(&event_id, dt(2030, 6, 3, 16, 0), dt(2030, 6, 3, 17, 0));
    app.state.reconciler.run_once().await.unwrap();

    let moved = reload(&app, &booking.id).await;
    assert_eq!(moved.start_time, dt(2030, 6, 3, 16, 0));
    assert_eq!(moved.end_time, dt(2030, 6, 3, 17, 0));
    assert_eq!(moved.duration_min, 60);
    assert_eq!(moved.status, BookingStatus::Scheduled);

    // Reservations follow the move.
    let date = NaiveDate::from_ymd_opt(2030, 6, 3).unwrap();
    let slots = app.state.availability.slots_for_date(date, 60).await.unwrap();
    let starts: Vec<_> = slots.iter().map(|s| s.start).collect();
    assert!(starts.contains(&dt(2030, 6, 3, 14, 0)));
    assert!(!starts.contains(&dt(2030, 6, 3, 16, 0)));

    let records = app
        .state
        .notification_repo
        .list_for_booking(&booking.id)
        .await
        .unwrap();
    let change_notices = records
        .iter()
        .filter(|r| r.kind == NotificationKind::BookingTimeChanged)
        .count();
    assert_eq!(change_notices, 1);

    // Second pass: times already agree, nothing new.
    app.state.reconciler.run_once().await.unwrap();
    let records = app
        .state
        .notification_repo
        .list_for_booking(&booking.id)
        .await
        .unwrap();
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn test_foreign_events_are_ignored() {
    let app = TestApp::new().await;
    app.calendar
        .push_foreign_event(dt(2030, 6, 3, 9, 0), dt(2030, 6, 3, 9, 45), "Standup");

    let processed = app.state.reconciler.run_once().await.unwrap();
    assert_eq!(processed, 0);

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bookings")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(count.0, 0);
}

#[tokio::test]
async fn test_sweep_with_nothing_pending_is_a_noop() {
    let app = TestApp::new().await;
    book_monday_1400(&app).await;

    let synced = app.state.reconciler.sweep_pending_sync().await.unwrap();
    assert_eq!(synced, 0);
}
