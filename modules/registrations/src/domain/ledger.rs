//! Waitlist ledger.
//!
//! Positions are derived from stored rows inside the event's locked
//! transaction: enqueue takes `max + 1`, every removal closes its gap, so the
//! waitlisted set of an event is always exactly `1..=N`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::contract::model::{Event, Registration};
use crate::domain::capacity::has_free_seat;
use crate::domain::error::DomainError;
use crate::domain::lifecycle::{transition, Trigger};
use crate::domain::repo::RegistrationsTx;

pub fn next_position(current_max: Option<u32>) -> u32 {
    current_max.map_or(1, |max| max + 1)
}

/// Append `reg` at the tail of the event's waitlist.
pub async fn enqueue(
    tx: &dyn RegistrationsTx,
    reg: &mut Registration,
    now: DateTime<Utc>,
) -> Result<u32, DomainError> {
    let max = tx
        .max_waitlist_position(reg.event_id)
        .await
        .map_err(DomainError::storage)?;
    let position = next_position(max);
    reg.enqueue(position, now);
    Ok(position)
}

/// Close the hole left by an entrant that held `position`.
pub async fn withdraw(
    tx: &dyn RegistrationsTx,
    event_id: Uuid,
    position: u32,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    tx.close_waitlist_gap(event_id, position, now)
        .await
        .map_err(DomainError::storage)?;
    Ok(())
}

/// Move the entrant at position 1 to `Registered`. No-op on an empty waitlist.
pub async fn promote_next(
    tx: &dyn RegistrationsTx,
    event_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Option<Registration>, DomainError> {
    let Some(mut head) = tx
        .first_waitlisted(event_id)
        .await
        .map_err(DomainError::storage)?
    else {
        return Ok(None);
    };

    let position = head.waitlist_position.unwrap_or(1);
    let mv = transition(head.status, Trigger::Promote)?;
    head.apply(mv, now);
    tx.save_registration(&head)
        .await
        .map_err(DomainError::storage)?;
    withdraw(tx, event_id, position, now).await?;

    tracing::debug!(
        registration_id = %head.id,
        %event_id,
        from_position = position,
        "promoted from waitlist"
    );
    Ok(Some(head))
}

/// Promote in order while the event has a free seat and someone is waiting.
pub async fn fill_vacancies(
    tx: &dyn RegistrationsTx,
    event: &Event,
    now: DateTime<Utc>,
) -> Result<Vec<Registration>, DomainError> {
    let mut promoted = Vec::new();
    loop {
        let admitted = tx
            .count_admitted(event.id)
            .await
            .map_err(DomainError::storage)?;
        if !has_free_seat(event.capacity_limit, admitted) {
            break;
        }
        match promote_next(tx, event.id, now).await? {
            Some(reg) => promoted.push(reg),
            None => break,
        }
    }
    Ok(promoted)
}

/// True if `positions` is exactly `1..=positions.len()` in some order.
pub fn is_dense(positions: &[u32]) -> bool {
    let mut sorted = positions.to_vec();
    sorted.sort_unstable();
    sorted
        .iter()
        .enumerate()
        .all(|(i, &p)| p as usize == i + 1)
}
