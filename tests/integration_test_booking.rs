mod common;

use chrono::{DateTime, NaiveDate, Utc};
use common::*;
use lesson_scheduler::domain::models::booking::{BookingStatus, CancelActor, SyncStatus};
use lesson_scheduler::domain::models::notification::NotificationKind;
use lesson_scheduler::domain::services::booking_service::BookRequest;
use lesson_scheduler::error::AppError;
use tokio::task::JoinSet;

fn request(start: DateTime<Utc>, contact: &str) -> BookRequest {
    BookRequest {
        start,
        duration_min: 60,
        student_name: "Anna".to_string(),
        student_contact: contact.to_string(),
        note: None,
    }
}

#[tokio::test]
async fn test_book_creates_event_and_schedules_confirmation() {
    let app = TestApp::new().await;

    let booking = app
        .state
        .bookings
        .book(request(dt(2030, 6, 3, 14, 0), "anna@example.com"))
        .await
        .unwrap();

    assert_eq!(booking.status, BookingStatus::Scheduled);
    assert_eq!(booking.sync_status, SyncStatus::Synced);
    assert!(booking.calendar_event_id.is_some());
    assert!(booking.confirmation_sent);
    assert_eq!(booking.price_cents, 4000);
    assert_eq!(app.calendar.event_count(), 1);

    let records = app
        .state
        .notification_repo
        .list_for_booking(&booking.id)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, NotificationKind::BookingConfirmed);

    assert_eq!(app.dispatch().await, 1);
    assert_eq!(app.notifier.sent_count(), 1);

    let student = app
        .state
        .student_repo
        .find_by_contact("anna@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(student.bookings_total, 1);
}

#[tokio::test]
async fn test_taken_slot_is_rejected() {
    let app = TestApp::new().await;
    app.state
        .bookings
        .book(request(dt(2030, 6, 3, 11, 0), "anna@example.com"))
        .await
        .unwrap();

    let exact = app
        .state
        .bookings
        .book(request(dt(2030, 6, 3, 11, 0), "ben@example.com"))
        .await;
    assert!(matches!(exact, Err(AppError::SlotUnavailable)));

    let overlapping = app
        .state
        .bookings
        .book(request(dt(2030, 6, 3, 11, 30), "ben@example.com"))
        .await;
    assert!(matches!(overlapping, Err(AppError::SlotUnavailable)));
}

#[tokio::test]
async fn test_concurrent_identical_bookings_one_winner() {
    let app = TestApp::new().await;
    let mut set = JoinSet::new();

    for contact in ["anna@example.com", "ben@example.com"] {
        let bookings = app.state.bookings.clone();
        let contact = contact.to_string();
        set.spawn(async move {
            bookings
                .book(request(dt(2030, 6, 3, 11, 0), &contact))
                .await
        });
    }

    let mut winners = 0;
    let mut losers = 0;
    while let Some(result) = set.join_next().await {
        match result.unwrap() {
            Ok(_) => winners += 1,
            Err(AppError::SlotUnavailable) => losers += 1,
            Err(e) => panic!("Unexpected booking error: {}", e),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(losers, 1);

    let conflicts = app.state.booking_repo.find_overlapping_active().await.unwrap();
    assert!(conflicts.is_empty());
}

#[tokio::test]
async fn test_late_student_cancel_applies_fee_and_frees_slot() {
    let app = TestApp::new().await;
    let booking = app
        .state
        .bookings
        .book(request(dt(2030, 6, 3, 14, 0), "anna@example.com"))
        .await
        .unwrap();

    // One hour before the lesson, well inside the 24h late window.
    app.clock.set(dt(2030, 6, 3, 13, 0));
    let cancelled = app
        .state
        .bookings
        .cancel(&booking.id, CancelActor::Student, Some("sick".to_string()))
        .await
        .unwrap();

    assert_eq!(cancelled.status, BookingStatus::CancelledByStudent);
    assert!(cancelled.late_fee_applied);

    let student = app
        .state
        .student_repo
        .find_by_contact("anna@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(student.debt_cents, 4000);
    assert_eq!(student.bookings_cancelled, 1);

    let date = NaiveDate::from_ymd_opt(2030, 6, 3).unwrap();
    let slots = app.state.availability.slots_for_date(date, 60).await.unwrap();
    assert!(slots.iter().any(|s| s.start == dt(2030, 6, 3, 14, 0)));
}

#[tokio::test]
async fn test_early_cancel_has_no_fee_and_notifies() {
    let app = TestApp::new().await;
    let booking = app
        .state
        .bookings
        .book(request(dt(2030, 6, 3, 14, 0), "anna@example.com"))
        .await
        .unwrap();

    let cancelled = app
        .state
        .bookings
        .cancel(&booking.id, CancelActor::Student, None)
        .await
        .unwrap();

    assert!(!cancelled.late_fee_applied);
    let student = app
        .state
        .student_repo
        .find_by_contact("anna@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(student.debt_cents, 0);

    let records = app
        .state
        .notification_repo
        .list_for_booking(&booking.id)
        .await
        .unwrap();
    let kinds: Vec<_> = records.iter().map(|r| r.kind).collect();
    assert!(kinds.contains(&NotificationKind::BookingConfirmed));
    assert!(kinds.contains(&NotificationKind::BookingCancelled));
}

#[tokio::test]
async fn test_completed_booking_cannot_be_cancelled() {
    let app = TestApp::new().await;
    let booking = app
        .state
        .bookings
        .book(request(dt(2030, 6, 3, 14, 0), "anna@example.com"))
        .await
        .unwrap();

    app.state.bookings.confirm(&booking.id).await.unwrap();
    app.state.bookings.complete(&booking.id).await.unwrap();

    let result = app
        .state
        .bookings
        .cancel(&booking.id, CancelActor::Teacher, None)
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_reschedule_keeps_lineage_and_enforces_limit() {
    let app = TestApp::new().await;
    let original = app
        .state
        .bookings
        .book(request(dt(2030, 6, 3, 10, 0), "anna@example.com"))
        .await
        .unwrap();

    let first = app
        .state
        .bookings
        .reschedule(&original.id, dt(2030, 6, 3, 11, 0))
        .await
        .unwrap();
    assert_eq!(first.origin_booking_id.as_deref(), Some(original.id.as_str()));
    assert_eq!(first.reschedule_count, 1);

    let former = app
        .state
        .booking_repo
        .find_by_id(&original.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(former.status, BookingStatus::CancelledByStudent);
    assert!(!former.late_fee_applied);

    let second = app
        .state
        .bookings
        .reschedule(&first.id, dt(2030, 6, 3, 12, 0))
        .await
        .unwrap();
    let third = app
        .state
        .bookings
        .reschedule(&second.id, dt(2030, 6, 3, 13, 0))
        .await
        .unwrap();
    assert_eq!(third.origin_booking_id.as_deref(), Some(original.id.as_str()));
    assert_eq!(third.reschedule_count, 3);

    let blocked = app
        .state
        .bookings
        .reschedule(&third.id, dt(2030, 6, 3, 14, 0))
        .await;
    assert!(matches!(blocked, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_rebooked_slot_gets_a_fresh_confirmation() {
    let app = TestApp::new().await;
    let first = app
        .state
        .bookings
        .book(request(dt(2030, 6, 3, 14, 0), "anna@example.com"))
        .await
        .unwrap();
    app.state
        .bookings
        .cancel(&first.id, CancelActor::Student, None)
        .await
        .unwrap();

    // Identical slot, student and rendered body; the confirmation still
    // belongs to the new booking and must be enqueued.
    let second = app
        .state
        .bookings
        .book(request(dt(2030, 6, 3, 14, 0), "anna@example.com"))
        .await
        .unwrap();
    assert!(second.confirmation_sent);

    let records = app
        .state
        .notification_repo
        .list_for_booking(&second.id)
        .await
        .unwrap();
    let confirmations = records
        .iter()
        .filter(|r| r.kind == NotificationKind::BookingConfirmed)
        .count();
    assert_eq!(confirmations, 1);
}

#[tokio::test]
async fn test_off_grid_window_allows_back_to_back_bookings() {
    let app = TestApp::new().await;
    app.seed_policy(r#"{"monday":[{"start":"10:15","end":"18:15"}]}"#).await;

    let date = NaiveDate::from_ymd_opt(2030, 6, 3).unwrap();
    let slots = app.state.availability.slots_for_date(date, 60).await.unwrap();
    assert!(slots.iter().any(|s| s.start == dt(2030, 6, 3, 10, 15)));
    assert!(slots.iter().any(|s| s.start == dt(2030, 6, 3, 11, 15)));

    app.state
        .bookings
        .book(request(dt(2030, 6, 3, 10, 15), "anna@example.com"))
        .await
        .unwrap();

    // Every slot still listed after the first booking must stay bookable.
    let follow_up = app
        .state
        .bookings
        .book(request(dt(2030, 6, 3, 11, 15), "ben@example.com"))
        .await;
    assert!(follow_up.is_ok(), "listed back-to-back slot was rejected");
}

#[tokio::test]
async fn test_calendar_outage_does_not_block_booking() {
    let app = TestApp::new().await;
    app.calendar.set_fail_creates(true);

    let booking = app
        .state
        .bookings
        .book(request(dt(2030, 6, 3, 14, 0), "anna@example.com"))
        .await
        .unwrap();
    assert_eq!(booking.sync_status, SyncStatus::Error);
    assert!(booking.calendar_event_id.is_none());

    app.calendar.set_fail_creates(false);
    let synced = app.state.reconciler.sweep_pending_sync().await.unwrap();
    assert_eq!(synced, 1);

    let recovered = app
        .state
        .booking_repo
        .find_by_id(&booking.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(recovered.sync_status, SyncStatus::Synced);
    assert!(recovered.calendar_event_id.is_some());
}
