use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Stable, machine-readable failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    EventNotFound,
    EventNotOpen,
    AlreadyRegistered,
    Unauthorized,
    NotFound,
    EventFull,
    InvalidTransition,
    Validation,
    ConcurrencyConflict,
    Internal,
}

/// Errors that are safe to expose to other modules
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationsError {
    #[error("Event not found: {id}")]
    EventNotFound { id: Uuid },

    #[error("Event is not open for registration: {reason}")]
    EventNotOpen { id: Uuid, reason: String },

    #[error("Already registered for this event")]
    AlreadyRegistered { event_id: Uuid },

    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("Registration not found: {id}")]
    NotFound { id: Uuid },

    #[error("Event is full")]
    EventFull { event_id: Uuid },

    #[error("Invalid transition: {message}")]
    InvalidTransition { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Please retry: the event is busy")]
    ConcurrencyConflict,

    #[error("Internal error")]
    Internal,
}

impl RegistrationsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EventNotFound { .. } => ErrorKind::EventNotFound,
            Self::EventNotOpen { .. } => ErrorKind::EventNotOpen,
            Self::AlreadyRegistered { .. } => ErrorKind::AlreadyRegistered,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::EventFull { .. } => ErrorKind::EventFull,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::ConcurrencyConflict => ErrorKind::ConcurrencyConflict,
            Self::Internal => ErrorKind::Internal,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn internal() -> Self {
        Self::Internal
    }
}

impl From<crate::domain::error::DomainError> for RegistrationsError {
    fn from(domain_error: crate::domain::error::DomainError) -> Self {
        use crate::domain::error::DomainError::*;
        match domain_error {
            EventNotFound { id } => Self::EventNotFound { id },
            EventNotOpen { id, reason } => Self::EventNotOpen {
                id,
                reason: reason.to_string(),
            },
            AlreadyRegistered { event_id, .. } => Self::AlreadyRegistered { event_id },
            Unauthorized { reason } => Self::Unauthorized {
                reason: reason.to_string(),
            },
            RegistrationNotFound { id } => Self::NotFound { id },
            EventFull { event_id, .. } => Self::EventFull { event_id },
            e @ InvalidTransition { .. } => Self::InvalidTransition {
                message: e.to_string(),
            },
            Validation { field, message } => Self::validation(format!("{field}: {message}")),
            ConcurrencyConflict { .. } => Self::ConcurrencyConflict,
            Delivery { .. } | Database { .. } => Self::internal(),
        }
    }
}
