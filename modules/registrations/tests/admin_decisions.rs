//! Approve / reject / cancel, single and bulk, and their effect on the queue.

mod common;

use common::{assert_dense, harness};
use registrations::contract::model::{Decision, RegistrationStatus};
use registrations::domain::error::DomainError;
use registrations::domain::events::RegistrationDomainEvent;
use uuid::Uuid;

#[tokio::test]
async fn rejecting_an_admitted_entrant_promotes_the_head() {
    let h = harness().await;
    let event = h.event(Some(1)).await;
    let [p1, p2, p3]: [_; 3] = h.participants(3).try_into().unwrap();
    let r1 = h.register(&p1, event.id).await.unwrap().registration;
    let r2 = h.register(&p2, event.id).await.unwrap().registration;
    let r3 = h.register(&p3, event.id).await.unwrap().registration;

    let change = h
        .service
        .update_registration_status(Some(&h.admin), r1.id, Decision::Reject)
        .await
        .unwrap();
    assert_eq!(change.registration.status, RegistrationStatus::Rejected);
    assert_eq!(change.promoted.iter().map(|r| r.id).collect::<Vec<_>>(), vec![r2.id]);

    assert_eq!(h.registration(r2.id).await.status, RegistrationStatus::Registered);
    assert_eq!(h.queue(event.id).await, vec![(r3.id, 1)]);
    assert_eq!(h.admitted(event.id).await, 1);
}

#[tokio::test]
async fn rejecting_a_waitlisted_entrant_closes_the_gap() {
    let h = harness().await;
    let event = h.event(Some(1)).await;
    let ps = h.participants(4);
    let mut ids = Vec::new();
    for p in &ps {
        ids.push(h.register(p, event.id).await.unwrap().registration.id);
    }
    // ids[1..] hold positions 1, 2, 3
    h.service
        .update_registration_status(Some(&h.admin), ids[2], Decision::Reject)
        .await
        .unwrap();

    assert_eq!(h.queue(event.id).await, vec![(ids[1], 1), (ids[3], 2)]);
    let rejected = h.registration(ids[2]).await;
    assert_eq!(rejected.waitlist_position, None);
    assert_dense(&h.all(event.id).await);
}

#[tokio::test]
async fn approving_from_waitlist_needs_a_free_seat() {
    let h = harness().await;
    let event = h.event(Some(1)).await;
    let [p1, p2]: [_; 2] = h.participants(2).try_into().unwrap();
    let r1 = h.register(&p1, event.id).await.unwrap().registration;
    let r2 = h.register(&p2, event.id).await.unwrap().registration;

    let err = h
        .service
        .update_registration_status(Some(&h.admin), r2.id, Decision::Approve)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::EventFull { capacity: 1, .. }));
    assert_eq!(h.registration(r2.id).await.status, RegistrationStatus::Waitlisted);

    // Approving the seat holder keeps the pool size.
    let change = h
        .service
        .update_registration_status(Some(&h.admin), r1.id, Decision::Approve)
        .await
        .unwrap();
    assert_eq!(change.registration.status, RegistrationStatus::Approved);
    assert!(change.promoted.is_empty());
    assert_eq!(h.admitted(event.id).await, 1);
}

#[tokio::test]
async fn approving_on_uncapped_event_always_fits() {
    let h = harness().await;
    let event = h.event(None).await;
    let p = h.participant("solo");
    let r = h.register(&p, event.id).await.unwrap().registration;

    h.service
        .update_registration_status(Some(&h.admin), r.id, Decision::Reject)
        .await
        .unwrap();
    let change = h
        .service
        .update_registration_status(Some(&h.admin), r.id, Decision::Approve)
        .await
        .unwrap();
    assert_eq!(change.registration.status, RegistrationStatus::Approved);
}

#[tokio::test]
async fn participants_cannot_decide() {
    let h = harness().await;
    let event = h.event(Some(3)).await;
    let p = h.participant("self-approver");
    let r = h.register(&p, event.id).await.unwrap().registration;

    let err = h
        .service
        .update_registration_status(Some(&p), r.id, Decision::Approve)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Unauthorized { .. }));

    let err = h
        .service
        .bulk_update_registration_status(None, &[r.id], Decision::Approve)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Unauthorized { .. }));
    assert_eq!(h.registration(r.id).await.status, RegistrationStatus::Registered);
}

#[tokio::test]
async fn cancelled_registration_accepts_no_decision() {
    let h = harness().await;
    let event = h.event(Some(3)).await;
    let p = h.participant("gone");
    let r = h.register(&p, event.id).await.unwrap().registration;
    h.service.cancel_registration(Some(&p), r.id).await.unwrap();

    let err = h
        .service
        .update_registration_status(Some(&h.admin), r.id, Decision::Approve)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DomainError::InvalidTransition { from: RegistrationStatus::Cancelled, .. }
    ));

    let err = h.service.cancel_registration(Some(&p), r.id).await.unwrap_err();
    assert!(matches!(err, DomainError::InvalidTransition { .. }));

    // The (event, participant) pair stays taken.
    let err = h.register(&p, event.id).await.unwrap_err();
    assert!(matches!(err, DomainError::AlreadyRegistered { .. }));
}

#[tokio::test]
async fn only_owner_or_admin_may_cancel() {
    let h = harness().await;
    let event = h.event(Some(3)).await;
    let [owner, other]: [_; 2] = h.participants(2).try_into().unwrap();
    let r = h.register(&owner, event.id).await.unwrap().registration;

    let err = h.service.cancel_registration(Some(&other), r.id).await.unwrap_err();
    assert!(matches!(err, DomainError::Unauthorized { .. }));

    let change = h.service.cancel_registration(Some(&h.admin), r.id).await.unwrap();
    assert_eq!(change.registration.status, RegistrationStatus::Cancelled);
}

#[tokio::test]
async fn cancelling_a_waitlisted_entrant_closes_the_gap() {
    let h = harness().await;
    let event = h.event(Some(1)).await;
    let ps = h.participants(4);
    let mut ids = Vec::new();
    for p in &ps {
        ids.push(h.register(p, event.id).await.unwrap().registration.id);
    }

    let change = h.service.cancel_registration(Some(&ps[1]), ids[1]).await.unwrap();
    assert!(change.promoted.is_empty());
    assert_eq!(h.queue(event.id).await, vec![(ids[2], 1), (ids[3], 2)]);
    assert_eq!(h.admitted(event.id).await, 1);
}

#[tokio::test]
async fn bulk_update_is_all_or_nothing() {
    let h = harness().await;
    let event = h.event(Some(10)).await;
    let ps = h.participants(3);
    let mut ids = Vec::new();
    for p in &ps {
        ids.push(h.register(p, event.id).await.unwrap().registration.id);
    }

    let mut with_missing = ids.clone();
    with_missing.push(Uuid::new_v4());
    let err = h
        .service
        .bulk_update_registration_status(Some(&h.admin), &with_missing, Decision::Approve)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::RegistrationNotFound { .. }));
    assert_eq!(h.with_status(event.id, RegistrationStatus::Approved).await.len(), 0);

    // One illegal move (Cancelled) aborts the whole batch too.
    h.service.cancel_registration(Some(&ps[2]), ids[2]).await.unwrap();
    let err = h
        .service
        .bulk_update_registration_status(Some(&h.admin), &ids, Decision::Approve)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidTransition { .. }));
    assert_eq!(h.with_status(event.id, RegistrationStatus::Approved).await.len(), 0);

    let report = h
        .service
        .bulk_update_registration_status(Some(&h.admin), &ids[..2], Decision::Approve)
        .await
        .unwrap();
    assert_eq!(report.updated.len(), 2);
    assert!(report
        .updated
        .iter()
        .all(|r| r.status == RegistrationStatus::Approved));
    assert_eq!(h.with_status(event.id, RegistrationStatus::Approved).await.len(), 2);
}

#[tokio::test]
async fn bulk_approve_stops_at_capacity_with_nothing_written() {
    let h = harness().await;
    let event = h.event(Some(1)).await;
    let ps = h.participants(3);
    let mut ids = Vec::new();
    for p in &ps {
        ids.push(h.register(p, event.id).await.unwrap().registration.id);
    }
    // ids[0] holds the seat; approving both waitlisted entrants cannot fit.
    let err = h
        .service
        .bulk_update_registration_status(Some(&h.admin), &ids, Decision::Approve)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::EventFull { .. }));
    assert_eq!(h.registration(ids[0]).await.status, RegistrationStatus::Registered);
    assert_eq!(h.queue(event.id).await, vec![(ids[1], 1), (ids[2], 2)]);
}

#[tokio::test]
async fn bulk_reject_across_events_promotes_in_each() {
    let h = harness().await;
    let (e1, e2) = (h.event(Some(1)).await, h.event(Some(1)).await);
    let ps = h.participants(2);

    let mut holders = Vec::new();
    let mut waiting = Vec::new();
    for event in [&e1, &e2] {
        holders.push(h.register(&ps[0], event.id).await.unwrap().registration.id);
        waiting.push(h.register(&ps[1], event.id).await.unwrap().registration.id);
    }

    let report = h
        .service
        .bulk_update_registration_status(Some(&h.admin), &holders, Decision::Reject)
        .await
        .unwrap();
    assert_eq!(report.updated.len(), 2);
    let mut promoted: Vec<Uuid> = report.promoted.iter().map(|r| r.id).collect();
    promoted.sort();
    waiting.sort();
    assert_eq!(promoted, waiting);
    assert_eq!(h.admitted(e1.id).await, 1);
    assert_eq!(h.admitted(e2.id).await, 1);

    let events = h.events.all();
    let changed = events
        .iter()
        .filter(|e| matches!(e, RegistrationDomainEvent::StatusChanged { .. }))
        .count();
    let promotions = events
        .iter()
        .filter(|e| matches!(e, RegistrationDomainEvent::Promoted { .. }))
        .count();
    assert_eq!((changed, promotions), (2, 2));
}

#[tokio::test]
async fn bulk_rejects_empty_and_oversized_batches() {
    let mut config = common::test_config();
    config.max_bulk_size = 2;
    let h = common::harness_with(config).await;

    let err = h
        .service
        .bulk_update_registration_status(Some(&h.admin), &[], Decision::Reject)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation { .. }));

    let ids = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
    let err = h
        .service
        .bulk_update_registration_status(Some(&h.admin), &ids, Decision::Reject)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation { .. }));
}

#[tokio::test]
async fn duplicate_ids_in_a_batch_count_once() {
    let h = harness().await;
    let event = h.event(Some(5)).await;
    let p = h.participant("twice");
    let r = h.register(&p, event.id).await.unwrap().registration;

    let report = h
        .service
        .bulk_update_registration_status(Some(&h.admin), &[r.id, r.id], Decision::Approve)
        .await
        .unwrap();
    assert_eq!(report.updated.len(), 1);
}

#[tokio::test]
async fn promote_next_respects_capacity_and_is_idempotent() {
    let h = harness().await;
    let event = h.event(Some(1)).await;
    let ps = h.participants(2);
    let holder = h.register(&ps[0], event.id).await.unwrap().registration;
    let waiting = h.register(&ps[1], event.id).await.unwrap().registration;

    // Full: nothing moves.
    assert!(h.service.promote_next(event.id).await.unwrap().is_none());
    assert_eq!(h.queue(event.id).await, vec![(waiting.id, 1)]);

    // Growing the event fills the new seat straight away.
    h.service
        .update_event(
            Some(&h.admin),
            event.id,
            registrations::contract::model::EventPatch {
                capacity_limit: Some(Some(2)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(h.registration(waiting.id).await.status, RegistrationStatus::Registered);

    assert!(h.service.promote_next(event.id).await.unwrap().is_none());
    assert!(h.service.promote_next(event.id).await.unwrap().is_none());
    assert_eq!(h.admitted(event.id).await, 2);
    assert_eq!(h.registration(holder.id).await.status, RegistrationStatus::Registered);
}

#[tokio::test]
async fn promote_next_on_unknown_event_is_not_found() {
    let h = harness().await;
    let err = h.service.promote_next(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, DomainError::EventNotFound { .. }));
}
