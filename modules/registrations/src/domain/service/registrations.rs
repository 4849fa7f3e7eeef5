use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{require_admin, require_identity, require_owner_or_admin, Service};
use crate::contract::model::{
    BulkStatusReport, Decision, Event, NewRegistration, Registration, RegistrationOutcome,
    RegistrationStatus, SecurityContext, StatusChange, WaitlistEntry, WaitlistStanding,
};
use crate::domain::capacity::{self, has_free_seat, Admission};
use crate::domain::error::DomainError;
use crate::domain::events::RegistrationDomainEvent;
use crate::domain::ledger;
use crate::domain::lifecycle::{transition, Trigger};
use crate::domain::repo::RegistrationsTx;

const MAX_IDEA_LENGTH: usize = 4000;

impl Service {
    /// Register the caller for an event: a seat if one is free, otherwise the
    /// tail of the waitlist.
    #[instrument(
        name = "registrations.service.register",
        skip(self, actor, req),
        fields(event_id = %req.event_id, user_id = tracing::field::Empty)
    )]
    pub async fn register(
        &self,
        actor: Option<&SecurityContext>,
        req: NewRegistration,
    ) -> Result<RegistrationOutcome, DomainError> {
        let actor = require_identity(actor)?;
        tracing::Span::current().record("user_id", tracing::field::display(actor.user_id));

        let idea = req
            .idea_description
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        if idea.as_ref().is_some_and(|s| s.chars().count() > MAX_IDEA_LENGTH) {
            return Err(DomainError::validation(
                "idea_description",
                format!("must be at most {MAX_IDEA_LENGTH} characters"),
            ));
        }

        let (req, idea) = (&req, &idea);
        let outcome = self
            .transact(&req.event_id.to_string(), |_| async move {
                let tx = self.store.begin().await.map_err(DomainError::storage)?;
                let event = lock(&*tx, req.event_id).await?;
                let now = Utc::now();

                capacity::check_open(&event, now).map_err(|reason| DomainError::EventNotOpen {
                    id: event.id,
                    reason,
                })?;

                if tx
                    .find_registration_for(event.id, actor.user_id)
                    .await
                    .map_err(DomainError::storage)?
                    .is_some()
                {
                    return Err(DomainError::AlreadyRegistered {
                        event_id: event.id,
                        user_id: actor.user_id,
                    });
                }

                let admitted = tx
                    .count_admitted(event.id)
                    .await
                    .map_err(DomainError::storage)?;
                let admission = capacity::evaluate_admission(&event, now, admitted).map_err(
                    |reason| DomainError::EventNotOpen {
                        id: event.id,
                        reason,
                    },
                )?;

                let mut registration = Registration {
                    id: Uuid::new_v4(),
                    event_id: event.id,
                    user_id: actor.user_id,
                    participation_type: req.participation_type,
                    idea_description: idea.clone(),
                    status: RegistrationStatus::Registered,
                    waitlist_position: None,
                    notification_sent: false,
                    created_at: now,
                    updated_at: now,
                };
                let position = match admission {
                    Admission::Immediate => None,
                    Admission::Waitlist => {
                        Some(ledger::enqueue(&*tx, &mut registration, now).await?)
                    }
                };

                tx.insert_registration(&registration)
                    .await
                    .map_err(DomainError::storage)?;
                tx.commit().await.map_err(DomainError::storage)?;

                Ok(RegistrationOutcome {
                    waitlisted: position.is_some(),
                    waitlist_position: position,
                    registration,
                })
            })
            .await?;

        let r = &outcome.registration;
        match outcome.waitlist_position {
            Some(position) => {
                info!(registration_id = %r.id, position, "registration waitlisted");
                self.events.publish(&RegistrationDomainEvent::Waitlisted {
                    id: r.id,
                    event_id: r.event_id,
                    user_id: r.user_id,
                    position,
                    at: r.created_at,
                });
            }
            None => {
                info!(registration_id = %r.id, "registration admitted");
                self.events.publish(&RegistrationDomainEvent::Registered {
                    id: r.id,
                    event_id: r.event_id,
                    user_id: r.user_id,
                    at: r.created_at,
                });
            }
        }
        Ok(outcome)
    }

    /// Owner or admin. Giving up a seat promotes the next entrant in the same
    /// transaction; leaving the waitlist closes the gap.
    #[instrument(name = "registrations.service.cancel_registration", skip(self, actor), fields(registration_id = %id))]
    pub async fn cancel_registration(
        &self,
        actor: Option<&SecurityContext>,
        id: Uuid,
    ) -> Result<StatusChange, DomainError> {
        let actor = require_identity(actor)?;
        let event_id = self.event_of(id).await?;

        let change = self
            .transact(&event_id.to_string(), |_| async move {
                let tx = self.store.begin().await.map_err(DomainError::storage)?;
                let event = lock(&*tx, event_id).await?;
                let mut reg = load(&*tx, id).await?;
                require_owner_or_admin(actor, reg.user_id)?;

                let now = Utc::now();
                let mv = transition(reg.status, Trigger::Cancel)?;
                let old_position = reg.waitlist_position;
                reg.apply(mv, now);
                tx.save_registration(&reg)
                    .await
                    .map_err(DomainError::storage)?;

                if let (true, Some(position)) = (mv.leaves_waitlist(), old_position) {
                    ledger::withdraw(&*tx, event.id, position, now).await?;
                }
                let promoted = if mv.frees_seat() {
                    ledger::fill_vacancies(&*tx, &event, now).await?
                } else {
                    Vec::new()
                };

                tx.commit().await.map_err(DomainError::storage)?;
                Ok(StatusChange {
                    registration: reg,
                    promoted,
                })
            })
            .await?;

        info!(promoted = change.promoted.len(), "registration cancelled");
        let mut events = vec![RegistrationDomainEvent::Cancelled {
            id: change.registration.id,
            event_id: change.registration.event_id,
            at: change.registration.updated_at,
        }];
        events.extend(promotion_events(&change.promoted));
        self.publish_all(events);
        Ok(change)
    }

    /// Approve or reject one registration (admin).
    #[instrument(name = "registrations.service.update_registration_status", skip(self, actor), fields(registration_id = %id, ?decision))]
    pub async fn update_registration_status(
        &self,
        actor: Option<&SecurityContext>,
        id: Uuid,
        decision: Decision,
    ) -> Result<StatusChange, DomainError> {
        require_admin(actor)?;
        let mut report = self.decide_all(&[id], decision).await?;
        let registration = report
            .updated
            .pop()
            .ok_or_else(|| DomainError::registration_not_found(id))?;
        Ok(StatusChange {
            registration,
            promoted: report.promoted,
        })
    }

    /// Same decision for a batch, all-or-nothing: any missing id, illegal
    /// move or full event aborts the batch with nothing written.
    #[instrument(name = "registrations.service.bulk_update_registration_status", skip(self, actor, ids), fields(count = ids.len(), ?decision))]
    pub async fn bulk_update_registration_status(
        &self,
        actor: Option<&SecurityContext>,
        ids: &[Uuid],
        decision: Decision,
    ) -> Result<BulkStatusReport, DomainError> {
        require_admin(actor)?;

        let mut seen = HashSet::new();
        let ids: Vec<Uuid> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        if ids.is_empty() {
            return Err(DomainError::validation("ids", "select at least one registration"));
        }
        if ids.len() > self.config.max_bulk_size {
            return Err(DomainError::validation(
                "ids",
                format!("at most {} registrations per batch", self.config.max_bulk_size),
            ));
        }

        let report = self.decide_all(&ids, decision).await?;
        info!(
            updated = report.updated.len(),
            promoted = report.promoted.len(),
            "bulk status update applied"
        );
        Ok(report)
    }

    async fn decide_all(
        &self,
        ids: &[Uuid],
        decision: Decision,
    ) -> Result<BulkStatusReport, DomainError> {
        // Registrations never move between events, so grouping can happen
        // before the locks are taken.
        let mut by_event: BTreeMap<Uuid, Vec<Uuid>> = BTreeMap::new();
        for &id in ids {
            by_event.entry(self.event_of(id).await?).or_default().push(id);
        }
        let by_event = &by_event;
        let key = by_event
            .keys()
            .next()
            .map(Uuid::to_string)
            .unwrap_or_default();

        let (report, events) = self
            .transact(&key, |_| async move {
                let tx = self.store.begin().await.map_err(DomainError::storage)?;
                // Ascending id order so concurrent batches cannot deadlock.
                let mut locked = Vec::with_capacity(by_event.len());
                for &event_id in by_event.keys() {
                    locked.push(lock(&*tx, event_id).await?);
                }

                let now = Utc::now();
                let mut report = BulkStatusReport::default();
                let mut events = Vec::new();
                for event in &locked {
                    for &id in by_event.get(&event.id).into_iter().flatten() {
                        let mut reg = load(&*tx, id).await?;
                        let promoted =
                            decide(&*tx, event, &mut reg, decision, now, &mut events).await?;
                        report.updated.push(reg);
                        report.promoted.extend(promoted);
                    }
                }

                tx.commit().await.map_err(DomainError::storage)?;
                Ok((report, events))
            })
            .await?;

        self.publish_all(events);
        Ok(report)
    }

    /// Operator trigger: promote the head of the waitlist if a seat is free.
    #[instrument(name = "registrations.service.promote_next", skip(self), fields(event_id = %event_id))]
    pub async fn promote_next(&self, event_id: Uuid) -> Result<Option<Registration>, DomainError> {
        let promoted = self
            .transact(&event_id.to_string(), |_| async move {
                let tx = self.store.begin().await.map_err(DomainError::storage)?;
                let event = lock(&*tx, event_id).await?;
                let admitted = tx
                    .count_admitted(event.id)
                    .await
                    .map_err(DomainError::storage)?;
                let promoted = if has_free_seat(event.capacity_limit, admitted) {
                    ledger::promote_next(&*tx, event.id, Utc::now()).await?
                } else {
                    debug!(admitted, "no free seat, nothing to promote");
                    None
                };
                tx.commit().await.map_err(DomainError::storage)?;
                Ok(promoted)
            })
            .await?;

        if let Some(reg) = &promoted {
            info!(registration_id = %reg.id, "promoted next waitlisted entrant");
            self.publish_all(promotion_events(std::slice::from_ref(reg)));
        }
        Ok(promoted)
    }

    #[instrument(name = "registrations.service.get_registration", skip(self, actor), fields(registration_id = %id))]
    pub async fn get_registration(
        &self,
        actor: Option<&SecurityContext>,
        id: Uuid,
    ) -> Result<Registration, DomainError> {
        let actor = require_identity(actor)?;
        let reg = self
            .store
            .find_registration(id)
            .await
            .map_err(DomainError::storage)?
            .ok_or_else(|| DomainError::registration_not_found(id))?;
        require_owner_or_admin(actor, reg.user_id)?;
        Ok(reg)
    }

    #[instrument(name = "registrations.service.list_event_registrations", skip(self, actor, statuses), fields(event_id = %event_id))]
    pub async fn list_event_registrations(
        &self,
        actor: Option<&SecurityContext>,
        event_id: Uuid,
        statuses: &[RegistrationStatus],
    ) -> Result<Vec<Registration>, DomainError> {
        require_admin(actor)?;
        self.get_event(event_id).await?;
        self.store
            .list_registrations(event_id, statuses)
            .await
            .map_err(DomainError::storage)
    }

    /// The ledger, head first.
    #[instrument(name = "registrations.service.waitlist", skip(self), fields(event_id = %event_id))]
    pub async fn waitlist(&self, event_id: Uuid) -> Result<Vec<WaitlistEntry>, DomainError> {
        self.get_event(event_id).await?;
        let rows = self
            .store
            .list_waitlist(event_id)
            .await
            .map_err(DomainError::storage)?;
        let entries: Vec<WaitlistEntry> = rows
            .into_iter()
            .filter_map(|r| {
                r.waitlist_position.map(|position| WaitlistEntry {
                    position,
                    registration_id: r.id,
                    user_id: r.user_id,
                    created_at: r.created_at,
                })
            })
            .collect();

        let positions: Vec<u32> = entries.iter().map(|e| e.position).collect();
        if !ledger::is_dense(&positions) {
            warn!(?positions, "waitlist positions are not dense");
        }
        Ok(entries)
    }

    /// The caller's place in line, `None` unless currently waitlisted.
    #[instrument(name = "registrations.service.waitlist_standing", skip(self, actor), fields(event_id = %event_id))]
    pub async fn waitlist_standing(
        &self,
        actor: Option<&SecurityContext>,
        event_id: Uuid,
    ) -> Result<Option<WaitlistStanding>, DomainError> {
        let actor = require_identity(actor)?;
        let entries = self.waitlist(event_id).await?;
        let total = entries.len() as u32;
        Ok(entries
            .iter()
            .find(|e| e.user_id == actor.user_id)
            .map(|e| WaitlistStanding {
                position: e.position,
                total,
            }))
    }

    async fn event_of(&self, registration_id: Uuid) -> Result<Uuid, DomainError> {
        self.store
            .find_registration(registration_id)
            .await
            .map_err(DomainError::storage)?
            .map(|r| r.event_id)
            .ok_or_else(|| DomainError::registration_not_found(registration_id))
    }
}

async fn lock(tx: &dyn RegistrationsTx, event_id: Uuid) -> Result<Event, DomainError> {
    tx.lock_event(event_id)
        .await
        .map_err(DomainError::storage)?
        .ok_or_else(|| DomainError::event_not_found(event_id))
}

async fn load(tx: &dyn RegistrationsTx, id: Uuid) -> Result<Registration, DomainError> {
    tx.find_registration(id)
        .await
        .map_err(DomainError::storage)?
        .ok_or_else(|| DomainError::registration_not_found(id))
}

/// One admin decision inside a locked transaction. Returns promotions.
async fn decide(
    tx: &dyn RegistrationsTx,
    event: &Event,
    reg: &mut Registration,
    decision: Decision,
    now: DateTime<Utc>,
    events: &mut Vec<RegistrationDomainEvent>,
) -> Result<Vec<Registration>, DomainError> {
    let mv = transition(reg.status, Trigger::Decide(decision))?;

    if mv.takes_seat() {
        let admitted = tx
            .count_admitted(event.id)
            .await
            .map_err(DomainError::storage)?;
        if !has_free_seat(event.capacity_limit, admitted) {
            return Err(DomainError::EventFull {
                event_id: event.id,
                capacity: event.capacity_limit.unwrap_or_default(),
            });
        }
    }

    let old_position = reg.waitlist_position;
    reg.apply(mv, now);
    tx.save_registration(reg)
        .await
        .map_err(DomainError::storage)?;
    if let (true, Some(position)) = (mv.leaves_waitlist(), old_position) {
        ledger::withdraw(tx, event.id, position, now).await?;
    }
    events.push(RegistrationDomainEvent::StatusChanged {
        id: reg.id,
        event_id: event.id,
        from: mv.from,
        to: mv.to,
        at: now,
    });

    if !mv.frees_seat() {
        return Ok(Vec::new());
    }
    let promoted = ledger::fill_vacancies(tx, event, now).await?;
    events.extend(promotion_events(&promoted));
    Ok(promoted)
}

fn promotion_events(promoted: &[Registration]) -> Vec<RegistrationDomainEvent> {
    promoted
        .iter()
        .map(|r| RegistrationDomainEvent::Promoted {
            id: r.id,
            event_id: r.event_id,
            at: r.updated_at,
        })
        .collect()
}
