use sea_orm::ActiveValue::{NotSet, Set};

use crate::contract::model::{
    Event, EventStatus, ParticipationType, Registration, RegistrationStatus,
};
use crate::infra::storage::entity::{event, registration};

impl From<event::Status> for EventStatus {
    fn from(s: event::Status) -> Self {
        match s {
            event::Status::Draft => EventStatus::Draft,
            event::Status::Published => EventStatus::Published,
        }
    }
}

impl From<EventStatus> for event::Status {
    fn from(s: EventStatus) -> Self {
        match s {
            EventStatus::Draft => event::Status::Draft,
            EventStatus::Published => event::Status::Published,
        }
    }
}

impl From<registration::Status> for RegistrationStatus {
    fn from(s: registration::Status) -> Self {
        match s {
            registration::Status::Registered => RegistrationStatus::Registered,
            registration::Status::Waitlisted => RegistrationStatus::Waitlisted,
            registration::Status::Approved => RegistrationStatus::Approved,
            registration::Status::Rejected => RegistrationStatus::Rejected,
            registration::Status::Cancelled => RegistrationStatus::Cancelled,
        }
    }
}

impl From<RegistrationStatus> for registration::Status {
    fn from(s: RegistrationStatus) -> Self {
        match s {
            RegistrationStatus::Registered => registration::Status::Registered,
            RegistrationStatus::Waitlisted => registration::Status::Waitlisted,
            RegistrationStatus::Approved => registration::Status::Approved,
            RegistrationStatus::Rejected => registration::Status::Rejected,
            RegistrationStatus::Cancelled => registration::Status::Cancelled,
        }
    }
}

impl From<registration::ParticipationType> for ParticipationType {
    fn from(p: registration::ParticipationType) -> Self {
        match p {
            registration::ParticipationType::HasIdea => ParticipationType::HasIdea,
            registration::ParticipationType::NeedsHelp => ParticipationType::NeedsHelp,
            registration::ParticipationType::WantsToHelp => ParticipationType::WantsToHelp,
        }
    }
}

impl From<ParticipationType> for registration::ParticipationType {
    fn from(p: ParticipationType) -> Self {
        match p {
            ParticipationType::HasIdea => registration::ParticipationType::HasIdea,
            ParticipationType::NeedsHelp => registration::ParticipationType::NeedsHelp,
            ParticipationType::WantsToHelp => registration::ParticipationType::WantsToHelp,
        }
    }
}

impl From<event::Model> for Event {
    fn from(m: event::Model) -> Self {
        Event {
            id: m.id,
            slug: m.slug,
            title: m.title,
            description: m.description,
            location: m.location,
            event_date: m.event_date,
            registration_deadline: m.registration_deadline,
            capacity_limit: m.capacity_limit.and_then(|c| u32::try_from(c).ok()),
            status: m.status.into(),
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

impl From<registration::Model> for Registration {
    fn from(m: registration::Model) -> Self {
        Registration {
            id: m.id,
            event_id: m.event_id,
            user_id: m.user_id,
            participation_type: m.participation_type.into(),
            idea_description: m.idea_description,
            status: m.status.into(),
            waitlist_position: m.waitlist_position.and_then(|p| u32::try_from(p).ok()),
            notification_sent: m.notification_sent,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Every column but `lock_version`, which only the lock statement writes.
pub fn event_active_model(e: &Event) -> event::ActiveModel {
    event::ActiveModel {
        id: Set(e.id),
        slug: Set(e.slug.clone()),
        title: Set(e.title.clone()),
        description: Set(e.description.clone()),
        location: Set(e.location.clone()),
        event_date: Set(e.event_date),
        registration_deadline: Set(e.registration_deadline),
        capacity_limit: Set(e.capacity_limit.map(to_db_int)),
        status: Set(e.status.into()),
        lock_version: NotSet,
        created_at: Set(e.created_at),
        updated_at: Set(e.updated_at),
    }
}

pub fn registration_active_model(r: &Registration) -> registration::ActiveModel {
    registration::ActiveModel {
        id: Set(r.id),
        event_id: Set(r.event_id),
        user_id: Set(r.user_id),
        participation_type: Set(r.participation_type.into()),
        idea_description: Set(r.idea_description.clone()),
        status: Set(r.status.into()),
        waitlist_position: Set(r.waitlist_position.map(to_db_int)),
        notification_sent: Set(r.notification_sent),
        created_at: Set(r.created_at),
        updated_at: Set(r.updated_at),
    }
}

pub fn to_db_int(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}
