//! Notification sends: recipient selection, flag bookkeeping, previews, ICS.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::harness;
use registrations::contract::model::{
    Decision, NotificationRequest, RegistrationStatus, SecurityContext,
};
use registrations::domain::error::DomainError;
use registrations::domain::events::RegistrationDomainEvent;
use registrations::domain::ports::{Notifier, OutboundMessage};
use registrations::domain::service::Service;
use registrations::infra::storage::SeaOrmStore;
use uuid::Uuid;

fn request(event_id: Uuid, statuses: &[RegistrationStatus]) -> NotificationRequest {
    NotificationRequest {
        event_id,
        subject: "Schedule update".into(),
        message: "We start at 18:00 sharp.".into(),
        recipient_statuses: statuses.to_vec(),
        include_calendar: false,
    }
}

#[tokio::test]
async fn send_flags_exactly_the_addressed_registrations() {
    let h = harness().await;
    let event = h.event(Some(2)).await;
    let ps = h.participants(3);
    let mut ids = Vec::new();
    for p in &ps {
        ids.push(h.register(p, event.id).await.unwrap().registration.id);
    }

    let report = h
        .service
        .send_notification(
            Some(&h.admin),
            request(event.id, &[RegistrationStatus::Registered]),
        )
        .await
        .unwrap();
    assert_eq!((report.addressed, report.marked, report.unresolved), (2, 2, 0));

    let sent = h.notifier.messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "admin@example.org");
    assert_eq!(sent[0].bcc, vec!["p1@example.org".to_string(), "p2@example.org".to_string()]);
    assert_eq!(sent[0].subject, "Schedule update");
    assert!(sent[0].attachment.is_none());

    assert!(h.registration(ids[0]).await.notification_sent);
    assert!(h.registration(ids[1]).await.notification_sent);
    assert!(!h.registration(ids[2]).await.notification_sent);

    assert!(h
        .events
        .all()
        .iter()
        .any(|e| matches!(e, RegistrationDomainEvent::Notified { count: 2, .. })));
}

/// Cancels one registration while the message is on the wire.
struct CancellingNotifier {
    service: Arc<Service>,
    actor: SecurityContext,
    cancel: Uuid,
}

#[async_trait]
impl Notifier for CancellingNotifier {
    async fn send(&self, _message: &OutboundMessage) -> anyhow::Result<()> {
        self.service
            .cancel_registration(Some(&self.actor), self.cancel)
            .await?;
        Ok(())
    }
}

#[tokio::test]
async fn queue_shift_during_send_keeps_the_moved_entry_pending() {
    let h = harness().await;
    let event = h.event(Some(1)).await;
    let ps = h.participants(3);
    let mut ids = Vec::new();
    for p in &ps {
        ids.push(h.register(p, event.id).await.unwrap().registration.id);
    }
    assert_eq!(h.queue(event.id).await, vec![(ids[1], 1), (ids[2], 2)]);

    let sender = Service::new(
        Arc::new(SeaOrmStore::new(h.db.sea())),
        h.events.clone(),
        Arc::new(CancellingNotifier {
            service: h.service.clone(),
            actor: ps[1].clone(),
            cancel: ids[1],
        }),
        h.directory.clone(),
        common::test_config(),
    );
    let report = sender
        .send_notification(Some(&h.admin), request(event.id, &[RegistrationStatus::Waitlisted]))
        .await
        .unwrap();
    assert_eq!((report.addressed, report.marked), (2, 0));

    // Moved up after it was addressed, so the next send must reach it.
    let moved = h.registration(ids[2]).await;
    assert_eq!(moved.status, RegistrationStatus::Waitlisted);
    assert_eq!(moved.waitlist_position, Some(1));
    assert!(!moved.notification_sent);

    let cancelled = h.registration(ids[1]).await;
    assert_eq!(cancelled.status, RegistrationStatus::Cancelled);
    assert!(!cancelled.notification_sent);
    assert!(!h.registration(ids[0]).await.notification_sent);
}

#[tokio::test]
async fn status_change_resets_the_flag() {
    let h = harness().await;
    let event = h.event(Some(1)).await;
    let ps = h.participants(3);
    let mut ids = Vec::new();
    for p in &ps {
        ids.push(h.register(p, event.id).await.unwrap().registration.id);
    }
    h.service
        .send_notification(
            Some(&h.admin),
            request(
                event.id,
                &[RegistrationStatus::Registered, RegistrationStatus::Waitlisted],
            ),
        )
        .await
        .unwrap();
    for id in &ids {
        assert!(h.registration(*id).await.notification_sent);
    }

    // Holder cancels: the head is promoted and the tail moves up. Both must
    // hear about it again.
    h.service.cancel_registration(Some(&ps[0]), ids[0]).await.unwrap();
    let promoted = h.registration(ids[1]).await;
    let moved = h.registration(ids[2]).await;
    assert_eq!(promoted.status, RegistrationStatus::Registered);
    assert!(!promoted.notification_sent);
    assert_eq!(moved.waitlist_position, Some(1));
    assert!(!moved.notification_sent);

    // A re-approval with no real change still resets.
    h.service
        .send_notification(Some(&h.admin), request(event.id, &[RegistrationStatus::Registered]))
        .await
        .unwrap();
    h.service
        .update_registration_status(Some(&h.admin), ids[1], Decision::Approve)
        .await
        .unwrap();
    h.service
        .send_notification(Some(&h.admin), request(event.id, &[RegistrationStatus::Approved]))
        .await
        .unwrap();
    assert!(h.registration(ids[1]).await.notification_sent);
    h.service
        .update_registration_status(Some(&h.admin), ids[1], Decision::Approve)
        .await
        .unwrap();
    assert!(!h.registration(ids[1]).await.notification_sent);
}

#[tokio::test]
async fn notifier_failure_leaves_flags_untouched() {
    let h = harness().await;
    let event = h.event(None).await;
    let p = h.participant("solo");
    let id = h.register(&p, event.id).await.unwrap().registration.id;

    h.notifier.fail_next(true);
    let err = h
        .service
        .send_notification(Some(&h.admin), request(event.id, &[RegistrationStatus::Registered]))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Delivery { .. }));
    assert!(!h.registration(id).await.notification_sent);
}

#[tokio::test]
async fn registrations_without_address_are_skipped() {
    let h = harness().await;
    let event = h.event(None).await;
    let known = h.participant("known");
    let unknown = registrations::contract::model::SecurityContext::participant(
        Uuid::new_v4(),
        "nobody@example.org",
    );
    let known_id = h.register(&known, event.id).await.unwrap().registration.id;
    let unknown_id = h.register(&unknown, event.id).await.unwrap().registration.id;

    let report = h
        .service
        .send_notification(Some(&h.admin), request(event.id, &[RegistrationStatus::Registered]))
        .await
        .unwrap();
    assert_eq!((report.addressed, report.marked, report.unresolved), (1, 1, 1));
    assert!(h.registration(known_id).await.notification_sent);
    assert!(!h.registration(unknown_id).await.notification_sent);
}

#[tokio::test]
async fn invalid_requests_are_rejected_before_sending() {
    let h = harness().await;
    let event = h.event(None).await;
    let p = h.participant("p");
    h.register(&p, event.id).await.unwrap();

    let mut blank = request(event.id, &[RegistrationStatus::Registered]);
    blank.subject = "  ".into();
    assert!(matches!(
        h.service.send_notification(Some(&h.admin), blank).await,
        Err(DomainError::Validation { .. })
    ));

    assert!(matches!(
        h.service.send_notification(Some(&h.admin), request(event.id, &[])).await,
        Err(DomainError::Validation { .. })
    ));

    // Nobody is Approved yet.
    assert!(matches!(
        h.service
            .send_notification(Some(&h.admin), request(event.id, &[RegistrationStatus::Approved]))
            .await,
        Err(DomainError::Validation { .. })
    ));

    assert!(matches!(
        h.service
            .send_notification(
                Some(&h.admin),
                request(Uuid::new_v4(), &[RegistrationStatus::Registered])
            )
            .await,
        Err(DomainError::EventNotFound { .. })
    ));

    assert!(matches!(
        h.service
            .send_notification(Some(&p), request(event.id, &[RegistrationStatus::Registered]))
            .await,
        Err(DomainError::Unauthorized { .. })
    ));
    assert!(h.notifier.messages().is_empty());
}

#[tokio::test]
async fn preview_goes_to_admin_and_keeps_flags() {
    let h = harness().await;
    let event = h.event(None).await;
    let p = h.participant("p");
    let id = h.register(&p, event.id).await.unwrap().registration.id;

    let mut req = request(event.id, &[RegistrationStatus::Registered]);
    req.include_calendar = true;
    h.service.send_preview(Some(&h.admin), req).await.unwrap();

    let sent = h.notifier.messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "admin@example.org");
    assert!(sent[0].bcc.is_empty());
    assert_eq!(sent[0].subject, "[PREVIEW] Schedule update");
    let ics = sent[0].attachment.as_ref().expect("calendar attached");
    assert_eq!(ics.filename, format!("{}.ics", event.slug));
    assert_eq!(ics.content_type, "text/calendar");
    assert!(ics.body.contains("SUMMARY:Hack Night"));

    assert!(!h.registration(id).await.notification_sent);
}

#[tokio::test]
async fn summary_counts_pending_per_status() {
    let h = harness().await;
    let event = h.event(Some(1)).await;
    let ps = h.participants(3);
    for p in &ps {
        h.register(p, event.id).await.unwrap();
    }
    h.service
        .send_notification(Some(&h.admin), request(event.id, &[RegistrationStatus::Waitlisted]))
        .await
        .unwrap();

    let summary = h.service.notification_summary(event.id).await.unwrap();
    let registered = summary.count(RegistrationStatus::Registered);
    let waitlisted = summary.count(RegistrationStatus::Waitlisted);
    assert_eq!((registered.total, registered.pending), (1, 1));
    assert_eq!((waitlisted.total, waitlisted.pending), (2, 0));
    assert_eq!(summary.count(RegistrationStatus::Approved).total, 0);
    assert_eq!(summary.by_status.len(), RegistrationStatus::ALL.len());
    assert_eq!(summary.pending, 1);
    assert_eq!(summary.free_seats, Some(0));
}

#[tokio::test]
async fn summary_reports_free_seats() {
    let h = harness().await;
    let limited = h.event(Some(3)).await;
    let open = h.event(None).await;
    let ps = h.participants(2);
    let first = h.register(&ps[0], limited.id).await.unwrap().registration.id;
    h.register(&ps[1], limited.id).await.unwrap();
    h.register(&ps[0], open.id).await.unwrap();

    h.service
        .update_registration_status(Some(&h.admin), first, Decision::Approve)
        .await
        .unwrap();
    let summary = h.service.notification_summary(limited.id).await.unwrap();
    assert_eq!(summary.free_seats, Some(1));

    h.service
        .update_registration_status(Some(&h.admin), first, Decision::Reject)
        .await
        .unwrap();
    let summary = h.service.notification_summary(limited.id).await.unwrap();
    assert_eq!(summary.free_seats, Some(2));

    let summary = h.service.notification_summary(open.id).await.unwrap();
    assert_eq!(summary.free_seats, None);
}
