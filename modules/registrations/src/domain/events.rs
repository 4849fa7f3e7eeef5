use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::contract::model::RegistrationStatus;

/// Transport-agnostic domain event, published after the transaction commits.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationDomainEvent {
    Registered {
        id: Uuid,
        event_id: Uuid,
        user_id: Uuid,
        at: DateTime<Utc>,
    },
    Waitlisted {
        id: Uuid,
        event_id: Uuid,
        user_id: Uuid,
        position: u32,
        at: DateTime<Utc>,
    },
    Promoted {
        id: Uuid,
        event_id: Uuid,
        at: DateTime<Utc>,
    },
    StatusChanged {
        id: Uuid,
        event_id: Uuid,
        from: RegistrationStatus,
        to: RegistrationStatus,
        at: DateTime<Utc>,
    },
    Cancelled {
        id: Uuid,
        event_id: Uuid,
        at: DateTime<Utc>,
    },
    Notified {
        event_id: Uuid,
        count: usize,
        at: DateTime<Utc>,
    },
}
