use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::contract::model::{Event, Registration, RegistrationStatus};

/// Persistence port. Plain reads go straight to the store; anything that
/// reads and then writes lifecycle state goes through a `RegistrationsTx`.
#[async_trait]
pub trait RegistrationsStore: Send + Sync {
    async fn begin(&self) -> anyhow::Result<Box<dyn RegistrationsTx>>;

    async fn find_event(&self, id: Uuid) -> anyhow::Result<Option<Event>>;
    /// Published events with `event_date > now`, soonest first.
    async fn list_upcoming_events(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Event>>;
    async fn find_registration(&self, id: Uuid) -> anyhow::Result<Option<Registration>>;
    async fn find_registration_for(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Option<Registration>>;
    /// Empty `statuses` means all. Ordered by status, waitlist position, creation.
    async fn list_registrations(
        &self,
        event_id: Uuid,
        statuses: &[RegistrationStatus],
    ) -> anyhow::Result<Vec<Registration>>;
    /// Waitlisted registrations by position.
    async fn list_waitlist(&self, event_id: Uuid) -> anyhow::Result<Vec<Registration>>;
    /// `(status, total, not yet notified)` for every status present.
    async fn status_counts(
        &self,
        event_id: Uuid,
    ) -> anyhow::Result<Vec<(RegistrationStatus, u64, u64)>>;
}

/// One transaction. Dropping it without `commit` rolls back.
#[async_trait]
pub trait RegistrationsTx: Send + Sync {
    /// Per-event serialization point: bumps the event's lock version, which
    /// holds the row (or database) write lock until commit, then loads it.
    async fn lock_event(&self, id: Uuid) -> anyhow::Result<Option<Event>>;

    async fn insert_event(&self, event: &Event) -> anyhow::Result<()>;
    async fn update_event(&self, event: &Event) -> anyhow::Result<()>;
    async fn delete_event(&self, id: Uuid) -> anyhow::Result<bool>;
    async fn slug_taken(&self, slug: &str, except: Option<Uuid>) -> anyhow::Result<bool>;

    async fn find_registration(&self, id: Uuid) -> anyhow::Result<Option<Registration>>;
    async fn find_registration_for(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Option<Registration>>;
    async fn count_registrations(&self, event_id: Uuid) -> anyhow::Result<u64>;
    /// Registrations holding a seat (Registered + Approved).
    async fn count_admitted(&self, event_id: Uuid) -> anyhow::Result<u64>;
    async fn max_waitlist_position(&self, event_id: Uuid) -> anyhow::Result<Option<u32>>;
    async fn first_waitlisted(&self, event_id: Uuid) -> anyhow::Result<Option<Registration>>;
    /// Decrement every waitlist position above `above` and clear those
    /// entrants' notification flags. Returns rows touched.
    async fn close_waitlist_gap(
        &self,
        event_id: Uuid,
        above: u32,
        now: DateTime<Utc>,
    ) -> anyhow::Result<u64>;

    async fn insert_registration(&self, reg: &Registration) -> anyhow::Result<()>;
    async fn save_registration(&self, reg: &Registration) -> anyhow::Result<()>;
    /// Flag as notified each `(id, updated_at)` that still matches the stored
    /// row and whose status is still in `statuses`. Leaves `updated_at` as is.
    async fn mark_notified(
        &self,
        seen: &[(Uuid, DateTime<Utc>)],
        statuses: &[RegistrationStatus],
    ) -> anyhow::Result<u64>;

    async fn commit(self: Box<Self>) -> anyhow::Result<()>;
}
