use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::contract::{
    error::RegistrationsError,
    model::{
        BulkStatusReport, Decision, Event, EventPatch, EventStatus, NewEvent, NewRegistration,
        NotificationReport, NotificationRequest, NotificationSummary, Registration,
        RegistrationOutcome, RegistrationStatus, SecurityContext, StatusChange, WaitlistEntry,
        WaitlistStanding,
    },
};

/// Public API of the registrations module for in-process callers
/// (request handlers, other modules, operator tooling).
///
/// `ctx` is whatever the authenticator resolved for the current request;
/// `None` means anonymous.
#[async_trait]
pub trait RegistrationsApi: Send + Sync {
    // events
    async fn create_event(
        &self,
        ctx: Option<&SecurityContext>,
        new_event: NewEvent,
    ) -> Result<Event, RegistrationsError>;
    async fn update_event(
        &self,
        ctx: Option<&SecurityContext>,
        id: Uuid,
        patch: EventPatch,
    ) -> Result<Event, RegistrationsError>;
    async fn set_event_status(
        &self,
        ctx: Option<&SecurityContext>,
        id: Uuid,
        status: EventStatus,
    ) -> Result<Event, RegistrationsError>;
    async fn delete_event(
        &self,
        ctx: Option<&SecurityContext>,
        id: Uuid,
    ) -> Result<(), RegistrationsError>;
    async fn get_event(&self, id: Uuid) -> Result<Event, RegistrationsError>;
    async fn list_upcoming_events(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>, RegistrationsError>;

    // registrations
    async fn register(
        &self,
        ctx: Option<&SecurityContext>,
        req: NewRegistration,
    ) -> Result<RegistrationOutcome, RegistrationsError>;
    async fn cancel_registration(
        &self,
        ctx: Option<&SecurityContext>,
        id: Uuid,
    ) -> Result<StatusChange, RegistrationsError>;
    async fn update_registration_status(
        &self,
        ctx: Option<&SecurityContext>,
        id: Uuid,
        decision: Decision,
    ) -> Result<StatusChange, RegistrationsError>;
    async fn bulk_update_registration_status(
        &self,
        ctx: Option<&SecurityContext>,
        ids: &[Uuid],
        decision: Decision,
    ) -> Result<BulkStatusReport, RegistrationsError>;
    async fn get_registration(
        &self,
        ctx: Option<&SecurityContext>,
        id: Uuid,
    ) -> Result<Registration, RegistrationsError>;
    async fn list_event_registrations(
        &self,
        ctx: Option<&SecurityContext>,
        event_id: Uuid,
        statuses: &[RegistrationStatus],
    ) -> Result<Vec<Registration>, RegistrationsError>;

    // waitlist
    async fn waitlist(&self, event_id: Uuid) -> Result<Vec<WaitlistEntry>, RegistrationsError>;
    async fn waitlist_standing(
        &self,
        ctx: Option<&SecurityContext>,
        event_id: Uuid,
    ) -> Result<Option<WaitlistStanding>, RegistrationsError>;
    async fn promote_next(&self, event_id: Uuid)
        -> Result<Option<Registration>, RegistrationsError>;

    // notifications
    async fn send_notification(
        &self,
        ctx: Option<&SecurityContext>,
        req: NotificationRequest,
    ) -> Result<NotificationReport, RegistrationsError>;
    async fn send_preview(
        &self,
        ctx: Option<&SecurityContext>,
        req: NotificationRequest,
    ) -> Result<(), RegistrationsError>;
    async fn notification_summary(
        &self,
        event_id: Uuid,
    ) -> Result<NotificationSummary, RegistrationsError>;
}
