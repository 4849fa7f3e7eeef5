use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::{require_admin, Service};
use crate::contract::model::{Event, EventPatch, EventStatus, NewEvent, SecurityContext};
use crate::domain::error::DomainError;
use crate::domain::events::RegistrationDomainEvent;
use crate::domain::ledger;

impl Service {
    #[instrument(name = "registrations.service.create_event", skip(self, actor, new_event), fields(slug = %new_event.slug))]
    pub async fn create_event(
        &self,
        actor: Option<&SecurityContext>,
        new_event: NewEvent,
    ) -> Result<Event, DomainError> {
        require_admin(actor)?;
        let now = Utc::now();
        let event = Event {
            id: Uuid::new_v4(),
            slug: new_event.slug.trim().to_string(),
            title: new_event.title.trim().to_string(),
            description: new_event.description.trim().to_string(),
            location: non_blank(new_event.location),
            event_date: new_event.event_date,
            registration_deadline: new_event.registration_deadline,
            capacity_limit: new_event.capacity_limit,
            status: new_event.status,
            created_at: now,
            updated_at: now,
        };
        validate_event(&event)?;

        let event_ref = &event;
        self.transact(&event.slug, |_| async move {
            let tx = self.store.begin().await.map_err(DomainError::storage)?;
            if tx
                .slug_taken(&event_ref.slug, None)
                .await
                .map_err(DomainError::storage)?
            {
                return Err(slug_in_use(&event_ref.slug));
            }
            tx.insert_event(event_ref)
                .await
                .map_err(DomainError::storage)?;
            tx.commit().await.map_err(DomainError::storage)
        })
        .await?;

        info!(event_id = %event.id, "event created");
        Ok(event)
    }

    /// Partial update. A larger (or removed) capacity promotes waiting
    /// entrants in order; a smaller one never evicts anybody.
    #[instrument(name = "registrations.service.update_event", skip(self, actor, patch), fields(event_id = %id))]
    pub async fn update_event(
        &self,
        actor: Option<&SecurityContext>,
        id: Uuid,
        patch: EventPatch,
    ) -> Result<Event, DomainError> {
        require_admin(actor)?;
        let patch = &patch;

        let (event, promoted) = self
            .transact(&id.to_string(), |_| async move {
                let tx = self.store.begin().await.map_err(DomainError::storage)?;
                let mut event = tx
                    .lock_event(id)
                    .await
                    .map_err(DomainError::storage)?
                    .ok_or_else(|| DomainError::event_not_found(id))?;
                let previous_capacity = event.capacity_limit;

                apply_patch(&mut event, patch.clone());
                validate_event(&event)?;
                if patch.slug.is_some()
                    && tx
                        .slug_taken(&event.slug, Some(id))
                        .await
                        .map_err(DomainError::storage)?
                {
                    return Err(slug_in_use(&event.slug));
                }

                let now = Utc::now();
                event.updated_at = now;
                tx.update_event(&event)
                    .await
                    .map_err(DomainError::storage)?;

                let promoted = if event.capacity_limit != previous_capacity {
                    ledger::fill_vacancies(&*tx, &event, now).await?
                } else {
                    Vec::new()
                };

                tx.commit().await.map_err(DomainError::storage)?;
                Ok((event, promoted))
            })
            .await?;

        if !promoted.is_empty() {
            info!(count = promoted.len(), "capacity change promoted waitlisted entrants");
        }
        self.publish_all(
            promoted
                .iter()
                .map(|r| RegistrationDomainEvent::Promoted {
                    id: r.id,
                    event_id: r.event_id,
                    at: r.updated_at,
                })
                .collect(),
        );
        Ok(event)
    }

    #[instrument(name = "registrations.service.set_event_status", skip(self, actor), fields(event_id = %id))]
    pub async fn set_event_status(
        &self,
        actor: Option<&SecurityContext>,
        id: Uuid,
        status: EventStatus,
    ) -> Result<Event, DomainError> {
        require_admin(actor)?;
        self.transact(&id.to_string(), |_| async move {
            let tx = self.store.begin().await.map_err(DomainError::storage)?;
            let mut event = tx
                .lock_event(id)
                .await
                .map_err(DomainError::storage)?
                .ok_or_else(|| DomainError::event_not_found(id))?;
            event.status = status;
            event.updated_at = Utc::now();
            tx.update_event(&event)
                .await
                .map_err(DomainError::storage)?;
            tx.commit().await.map_err(DomainError::storage)?;
            Ok(event)
        })
        .await
    }

    /// Refused while any registration references the event.
    #[instrument(name = "registrations.service.delete_event", skip(self, actor), fields(event_id = %id))]
    pub async fn delete_event(
        &self,
        actor: Option<&SecurityContext>,
        id: Uuid,
    ) -> Result<(), DomainError> {
        require_admin(actor)?;
        self.transact(&id.to_string(), |_| async move {
            let tx = self.store.begin().await.map_err(DomainError::storage)?;
            tx.lock_event(id)
                .await
                .map_err(DomainError::storage)?
                .ok_or_else(|| DomainError::event_not_found(id))?;
            let referenced = tx
                .count_registrations(id)
                .await
                .map_err(DomainError::storage)?;
            if referenced > 0 {
                return Err(DomainError::validation("event", "event has registrations"));
            }
            tx.delete_event(id).await.map_err(DomainError::storage)?;
            tx.commit().await.map_err(DomainError::storage)
        })
        .await?;
        info!("event deleted");
        Ok(())
    }

    #[instrument(name = "registrations.service.get_event", skip(self), fields(event_id = %id))]
    pub async fn get_event(&self, id: Uuid) -> Result<Event, DomainError> {
        self.store
            .find_event(id)
            .await
            .map_err(DomainError::storage)?
            .ok_or_else(|| DomainError::event_not_found(id))
    }

    #[instrument(name = "registrations.service.list_upcoming_events", skip(self))]
    pub async fn list_upcoming_events(&self, now: DateTime<Utc>) -> Result<Vec<Event>, DomainError> {
        let events = self
            .store
            .list_upcoming_events(now)
            .await
            .map_err(DomainError::storage)?;
        debug!(count = events.len(), "listed upcoming events");
        Ok(events)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn slug_in_use(slug: &str) -> DomainError {
    DomainError::validation("slug", format!("'{slug}' is already in use"))
}

fn apply_patch(event: &mut Event, patch: EventPatch) {
    if let Some(slug) = patch.slug {
        event.slug = slug.trim().to_string();
    }
    if let Some(title) = patch.title {
        event.title = title.trim().to_string();
    }
    if let Some(description) = patch.description {
        event.description = description.trim().to_string();
    }
    if let Some(location) = patch.location {
        event.location = non_blank(location);
    }
    if let Some(date) = patch.event_date {
        event.event_date = date;
    }
    if let Some(deadline) = patch.registration_deadline {
        event.registration_deadline = deadline;
    }
    if let Some(capacity) = patch.capacity_limit {
        event.capacity_limit = capacity;
    }
}

fn validate_event(event: &Event) -> Result<(), DomainError> {
    if event.title.is_empty() {
        return Err(DomainError::validation("title", "must not be empty"));
    }
    if event.slug.is_empty() {
        return Err(DomainError::validation("slug", "must not be empty"));
    }
    if !event
        .slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(DomainError::validation(
            "slug",
            "only lowercase letters, digits and '-' are allowed",
        ));
    }
    if event.description.is_empty() {
        return Err(DomainError::validation("description", "must not be empty"));
    }
    if event.registration_deadline > event.event_date {
        return Err(DomainError::validation(
            "registration_deadline",
            "must not be after the event date",
        ));
    }
    // Stored as a signed 32-bit column.
    if event.capacity_limit.is_some_and(|c| i32::try_from(c).is_err()) {
        return Err(DomainError::validation(
            "capacity_limit",
            "must not exceed 2147483647",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn event() -> Event {
        let now = Utc::now();
        Event {
            id: Uuid::new_v4(),
            slug: "spring-jam".into(),
            title: "Spring Jam".into(),
            description: "Two days of building".into(),
            location: None,
            event_date: now + Duration::days(10),
            registration_deadline: now + Duration::days(9),
            capacity_limit: Some(10),
            status: EventStatus::Published,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn deadline_after_event_is_rejected() {
        let mut e = event();
        e.registration_deadline = e.event_date + Duration::minutes(1);
        assert!(matches!(
            validate_event(&e),
            Err(DomainError::Validation { field, .. }) if field == "registration_deadline"
        ));
    }

    #[test]
    fn slug_charset_is_enforced() {
        let mut e = event();
        e.slug = "Spring Jam".into();
        assert!(validate_event(&e).is_err());
        e.slug = "spring-jam-2026".into();
        assert!(validate_event(&e).is_ok());
    }

    #[test]
    fn capacity_must_fit_the_column() {
        let mut e = event();
        e.capacity_limit = Some(i32::MAX as u32);
        assert!(validate_event(&e).is_ok());
        e.capacity_limit = Some(i32::MAX as u32 + 1);
        assert!(matches!(
            validate_event(&e),
            Err(DomainError::Validation { field, .. }) if field == "capacity_limit"
        ));
    }

    #[test]
    fn patch_clears_optional_fields() {
        let mut e = event();
        e.location = Some("Lab".into());
        apply_patch(
            &mut e,
            EventPatch {
                location: Some(None),
                capacity_limit: Some(None),
                title: Some("  Renamed ".into()),
                ..EventPatch::default()
            },
        );
        assert_eq!(e.location, None);
        assert_eq!(e.capacity_limit, None);
        assert_eq!(e.title, "Renamed");
    }
}
