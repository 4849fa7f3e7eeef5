use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::contract::{
    client::RegistrationsApi,
    error::RegistrationsError,
    model::{
        BulkStatusReport, Decision, Event, EventPatch, EventStatus, NewEvent, NewRegistration,
        NotificationReport, NotificationRequest, NotificationSummary, Registration,
        RegistrationOutcome, RegistrationStatus, SecurityContext, StatusChange, WaitlistEntry,
        WaitlistStanding,
    },
};
use crate::domain::service::Service;

/// Local implementation of `RegistrationsApi` that delegates to the domain service
pub struct RegistrationsLocalClient {
    service: Arc<Service>,
}

impl RegistrationsLocalClient {
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl RegistrationsApi for RegistrationsLocalClient {
    async fn create_event(
        &self,
        ctx: Option<&SecurityContext>,
        new_event: NewEvent,
    ) -> Result<Event, RegistrationsError> {
        self.service.create_event(ctx, new_event).await.map_err(Into::into)
    }

    async fn update_event(
        &self,
        ctx: Option<&SecurityContext>,
        id: Uuid,
        patch: EventPatch,
    ) -> Result<Event, RegistrationsError> {
        self.service
            .update_event(ctx, id, patch)
            .await
            .map_err(Into::into)
    }

    async fn set_event_status(
        &self,
        ctx: Option<&SecurityContext>,
        id: Uuid,
        status: EventStatus,
    ) -> Result<Event, RegistrationsError> {
        self.service
            .set_event_status(ctx, id, status)
            .await
            .map_err(Into::into)
    }

    async fn delete_event(
        &self,
        ctx: Option<&SecurityContext>,
        id: Uuid,
    ) -> Result<(), RegistrationsError> {
        self.service.delete_event(ctx, id).await.map_err(Into::into)
    }

    async fn get_event(&self, id: Uuid) -> Result<Event, RegistrationsError> {
        self.service.get_event(id).await.map_err(Into::into)
    }

    async fn list_upcoming_events(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>, RegistrationsError> {
        self.service.list_upcoming_events(now).await.map_err(Into::into)
    }

    async fn register(
        &self,
        ctx: Option<&SecurityContext>,
        req: NewRegistration,
    ) -> Result<RegistrationOutcome, RegistrationsError> {
        self.service.register(ctx, req).await.map_err(Into::into)
    }

    async fn cancel_registration(
        &self,
        ctx: Option<&SecurityContext>,
        id: Uuid,
    ) -> Result<StatusChange, RegistrationsError> {
        self.service
            .cancel_registration(ctx, id)
            .await
            .map_err(Into::into)
    }

    async fn update_registration_status(
        &self,
        ctx: Option<&SecurityContext>,
        id: Uuid,
        decision: Decision,
    ) -> Result<StatusChange, RegistrationsError> {
        self.service
            .update_registration_status(ctx, id, decision)
            .await
            .map_err(Into::into)
    }

    async fn bulk_update_registration_status(
        &self,
        ctx: Option<&SecurityContext>,
        ids: &[Uuid],
        decision: Decision,
    ) -> Result<BulkStatusReport, RegistrationsError> {
        self.service
            .bulk_update_registration_status(ctx, ids, decision)
            .await
            .map_err(Into::into)
    }

    async fn get_registration(
        &self,
        ctx: Option<&SecurityContext>,
        id: Uuid,
    ) -> Result<Registration, RegistrationsError> {
        self.service.get_registration(ctx, id).await.map_err(Into::into)
    }

    async fn list_event_registrations(
        &self,
        ctx: Option<&SecurityContext>,
        event_id: Uuid,
        statuses: &[RegistrationStatus],
    ) -> Result<Vec<Registration>, RegistrationsError> {
        self.service
            .list_event_registrations(ctx, event_id, statuses)
            .await
            .map_err(Into::into)
    }

    async fn waitlist(&self, event_id: Uuid) -> Result<Vec<WaitlistEntry>, RegistrationsError> {
        self.service.waitlist(event_id).await.map_err(Into::into)
    }

    async fn waitlist_standing(
        &self,
        ctx: Option<&SecurityContext>,
        event_id: Uuid,
    ) -> Result<Option<WaitlistStanding>, RegistrationsError> {
        self.service
            .waitlist_standing(ctx, event_id)
            .await
            .map_err(Into::into)
    }

    async fn promote_next(
        &self,
        event_id: Uuid,
    ) -> Result<Option<Registration>, RegistrationsError> {
        self.service.promote_next(event_id).await.map_err(Into::into)
    }

    async fn send_notification(
        &self,
        ctx: Option<&SecurityContext>,
        req: NotificationRequest,
    ) -> Result<NotificationReport, RegistrationsError> {
        self.service
            .send_notification(ctx, req)
            .await
            .map_err(Into::into)
    }

    async fn send_preview(
        &self,
        ctx: Option<&SecurityContext>,
        req: NotificationRequest,
    ) -> Result<(), RegistrationsError> {
        self.service.send_preview(ctx, req).await.map_err(Into::into)
    }

    async fn notification_summary(
        &self,
        event_id: Uuid,
    ) -> Result<NotificationSummary, RegistrationsError> {
        self.service
            .notification_summary(event_id)
            .await
            .map_err(Into::into)
    }
}
