use thiserror::Error;
use uuid::Uuid;

use crate::contract::model::RegistrationStatus;
use crate::domain::capacity::Closed;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Event not found: {id}")]
    EventNotFound { id: Uuid },

    #[error("Event {id} is not open for registration: {reason}")]
    EventNotOpen { id: Uuid, reason: Closed },

    #[error("User {user_id} is already registered for event {event_id}")]
    AlreadyRegistered { event_id: Uuid, user_id: Uuid },

    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: &'static str },

    #[error("Registration not found: {id}")]
    RegistrationNotFound { id: Uuid },

    #[error("Event {event_id} is full ({capacity} seats taken)")]
    EventFull { event_id: Uuid, capacity: u32 },

    #[error("Cannot {action} a registration that is {from}")]
    InvalidTransition {
        from: RegistrationStatus,
        action: &'static str,
    },

    #[error("Validation failed: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Concurrent update conflict after {attempts} attempt(s)")]
    ConcurrencyConflict { attempts: u32 },

    #[error("Notification delivery failed: {message}")]
    Delivery { message: String },

    #[error("Database error: {message}")]
    Database { message: String },
}

impl DomainError {
    pub fn event_not_found(id: Uuid) -> Self {
        Self::EventNotFound { id }
    }

    pub fn registration_not_found(id: Uuid) -> Self {
        Self::RegistrationNotFound { id }
    }

    pub fn unauthorized(reason: &'static str) -> Self {
        Self::Unauthorized { reason }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// Storage failures: lock contention and serialization losses become
    /// `ConcurrencyConflict` so the unit of work is retried.
    pub fn storage(err: anyhow::Error) -> Self {
        if db::errors::is_retryable_anyhow(&err) {
            Self::ConcurrencyConflict { attempts: 1 }
        } else {
            Self::database(format!("{err:#}"))
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}
