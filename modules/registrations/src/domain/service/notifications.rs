use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{require_admin, Service};
use crate::contract::model::{
    NotificationReport, NotificationRequest, NotificationSummary, SecurityContext, StatusCount,
    RegistrationStatus,
};
use crate::domain::calendar;
use crate::domain::capacity;
use crate::domain::error::DomainError;
use crate::domain::events::RegistrationDomainEvent;
use crate::domain::notification;
use crate::domain::ports::Attachment;

impl Service {
    /// Mail every registration whose current status is selected, then flag
    /// those that were addressed and are unchanged since. A registration
    /// moved while the mail was in flight stays pending.
    #[instrument(
        name = "registrations.service.send_notification",
        skip(self, actor, req),
        fields(event_id = %req.event_id, statuses = ?req.recipient_statuses)
    )]
    pub async fn send_notification(
        &self,
        actor: Option<&SecurityContext>,
        req: NotificationRequest,
    ) -> Result<NotificationReport, DomainError> {
        let actor = require_admin(actor)?;
        notification::validate(&req)?;
        let attachment = self.attachment_for(&req).await?;

        let candidates = self
            .store
            .list_registrations(req.event_id, &req.recipient_statuses)
            .await
            .map_err(DomainError::storage)?;
        if candidates.is_empty() {
            return Err(DomainError::validation(
                "recipient_statuses",
                "no recipients",
            ));
        }

        let user_ids: Vec<Uuid> = candidates.iter().map(|r| r.user_id).collect();
        let emails = self
            .directory
            .emails_for(&user_ids)
            .await
            .map_err(|e| DomainError::Delivery {
                message: format!("recipient lookup failed: {e:#}"),
            })?;
        let addressing = notification::address(&candidates, &emails);
        if addressing.addressed.is_empty() {
            return Err(DomainError::validation(
                "recipient_statuses",
                "no recipient has a known address",
            ));
        }
        if addressing.unresolved > 0 {
            warn!(unresolved = addressing.unresolved, "skipping registrations without an address");
        }

        let message = notification::broadcast(
            &req,
            &actor.email,
            addressing.emails.clone(),
            attachment,
        );
        self.notifier
            .send(&message)
            .await
            .map_err(|e| DomainError::Delivery {
                message: format!("{e:#}"),
            })?;

        let (seen, statuses) = (&addressing.addressed, &req.recipient_statuses);
        let marked = self
            .transact(&req.event_id.to_string(), |_| async move {
                let tx = self.store.begin().await.map_err(DomainError::storage)?;
                let marked = tx
                    .mark_notified(seen, statuses)
                    .await
                    .map_err(DomainError::storage)?;
                tx.commit().await.map_err(DomainError::storage)?;
                Ok(marked)
            })
            .await?;

        let report = NotificationReport {
            addressed: addressing.addressed.len(),
            marked: marked as usize,
            unresolved: addressing.unresolved,
        };
        info!(
            recipients = addressing.emails.len(),
            addressed = report.addressed,
            marked = report.marked,
            "notification sent"
        );
        self.events.publish(&RegistrationDomainEvent::Notified {
            event_id: req.event_id,
            count: report.marked,
            at: Utc::now(),
        });
        Ok(report)
    }

    /// Same message to the admin only. Flags stay as they are.
    #[instrument(name = "registrations.service.send_preview", skip(self, actor, req), fields(event_id = %req.event_id))]
    pub async fn send_preview(
        &self,
        actor: Option<&SecurityContext>,
        req: NotificationRequest,
    ) -> Result<(), DomainError> {
        let actor = require_admin(actor)?;
        notification::validate(&req)?;
        let attachment = self.attachment_for(&req).await?;

        let message = notification::preview(&req, &actor.email, attachment);
        self.notifier
            .send(&message)
            .await
            .map_err(|e| DomainError::Delivery {
                message: format!("{e:#}"),
            })?;
        info!(to = %message.to, "preview sent");
        Ok(())
    }

    #[instrument(name = "registrations.service.notification_summary", skip(self), fields(event_id = %event_id))]
    pub async fn notification_summary(
        &self,
        event_id: Uuid,
    ) -> Result<NotificationSummary, DomainError> {
        let event = self.get_event(event_id).await?;
        let rows = self
            .store
            .status_counts(event_id)
            .await
            .map_err(DomainError::storage)?;

        let by_status: Vec<StatusCount> = RegistrationStatus::ALL
            .iter()
            .map(|&status| {
                rows.iter()
                    .find(|(s, _, _)| *s == status)
                    .map(|&(status, total, pending)| StatusCount {
                        status,
                        total,
                        pending,
                    })
                    .unwrap_or(StatusCount {
                        status,
                        total: 0,
                        pending: 0,
                    })
            })
            .collect();
        let pending = by_status.iter().map(|c| c.pending).sum();
        let admitted = by_status
            .iter()
            .filter(|c| c.status.holds_seat())
            .map(|c| c.total)
            .sum();
        Ok(NotificationSummary {
            event_id,
            by_status,
            pending,
            free_seats: capacity::free_seats(event.capacity_limit, admitted),
        })
    }

    /// Also confirms the event exists.
    async fn attachment_for(
        &self,
        req: &NotificationRequest,
    ) -> Result<Option<Attachment>, DomainError> {
        let event = self.get_event(req.event_id).await?;
        Ok(req
            .include_calendar
            .then(|| calendar::invite(&event, self.config.calendar_event_duration)))
    }
}
