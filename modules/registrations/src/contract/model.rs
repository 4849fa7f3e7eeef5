use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::contract::error::{ErrorKind, RegistrationsError};

// ---------- identity ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Participant,
}

/// Identity handed over by the authenticator for the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityContext {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl SecurityContext {
    pub fn admin(user_id: Uuid, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
            role: Role::Admin,
        }
    }

    pub fn participant(user_id: Uuid, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
            role: Role::Participant,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

// ---------- events ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventStatus {
    Draft,
    Published,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub event_date: DateTime<Utc>,
    pub registration_deadline: DateTime<Utc>,
    /// `None` means unlimited.
    pub capacity_limit: Option<u32>,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub event_date: DateTime<Utc>,
    pub registration_deadline: DateTime<Utc>,
    pub capacity_limit: Option<u32>,
    pub status: EventStatus,
}

/// Partial update; `Some(None)` clears an optional field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventPatch {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<Option<String>>,
    pub event_date: Option<DateTime<Utc>>,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub capacity_limit: Option<Option<u32>>,
}

// ---------- registrations ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParticipationType {
    HasIdea,
    NeedsHelp,
    WantsToHelp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RegistrationStatus {
    Registered,
    Waitlisted,
    Approved,
    Rejected,
    Cancelled,
}

impl RegistrationStatus {
    pub const ALL: [RegistrationStatus; 5] = [
        RegistrationStatus::Registered,
        RegistrationStatus::Waitlisted,
        RegistrationStatus::Approved,
        RegistrationStatus::Rejected,
        RegistrationStatus::Cancelled,
    ];

    /// Registered and Approved both occupy a seat.
    pub fn holds_seat(self) -> bool {
        matches!(self, Self::Registered | Self::Approved)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registered => "REGISTERED",
            Self::Waitlisted => "WAITLISTED",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub participation_type: ParticipationType,
    pub idea_description: Option<String>,
    pub status: RegistrationStatus,
    /// Present iff `status == Waitlisted`.
    pub waitlist_position: Option<u32>,
    pub notification_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registration request; the participant is the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRegistration {
    pub event_id: Uuid,
    pub participation_type: ParticipationType,
    pub idea_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationOutcome {
    pub registration: Registration,
    pub waitlisted: bool,
    pub waitlist_position: Option<u32>,
}

/// Administrative verdict on a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn target(self) -> RegistrationStatus {
        match self {
            Decision::Approve => RegistrationStatus::Approved,
            Decision::Reject => RegistrationStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub registration: Registration,
    /// Registrations moved off the waitlist as a consequence.
    pub promoted: Vec<Registration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BulkStatusReport {
    pub updated: Vec<Registration>,
    pub promoted: Vec<Registration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitlistEntry {
    pub position: u32,
    pub registration_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitlistStanding {
    pub position: u32,
    pub total: u32,
}

// ---------- notifications ----------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub event_id: Uuid,
    pub subject: String,
    pub message: String,
    pub recipient_statuses: Vec<RegistrationStatus>,
    pub include_calendar: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NotificationReport {
    /// Registrations whose participant was on the message.
    pub addressed: usize,
    /// Registrations whose flag was flipped to sent.
    pub marked: usize,
    /// Registrations skipped for lack of an address.
    pub unresolved: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCount {
    pub status: RegistrationStatus,
    pub total: u64,
    pub pending: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationSummary {
    pub event_id: Uuid,
    /// One entry per status, in `RegistrationStatus::ALL` order.
    pub by_status: Vec<StatusCount>,
    pub pending: u64,
    /// `None` for unlimited events.
    pub free_seats: Option<u64>,
}

impl NotificationSummary {
    pub fn count(&self, status: RegistrationStatus) -> StatusCount {
        self.by_status
            .iter()
            .copied()
            .find(|c| c.status == status)
            .unwrap_or(StatusCount {
                status,
                total: 0,
                pending: 0,
            })
    }
}

// ---------- structured result ----------

/// Outcome envelope for the calling layer: business failures become data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl<T> ActionResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            detail: None,
        }
    }

    pub fn failed(err: &RegistrationsError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.kind()),
            detail: Some(err.to_string()),
        }
    }
}

impl<T> From<Result<T, RegistrationsError>> for ActionResult<T> {
    fn from(res: Result<T, RegistrationsError>) -> Self {
        match res {
            Ok(v) => Self::ok(v),
            Err(e) => Self::failed(&e),
        }
    }
}
