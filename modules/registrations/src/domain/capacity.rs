//! Event capacity model: is the event open, and is there a seat left.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::contract::model::{Event, EventStatus};

/// Why an event refuses registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closed {
    NotPublished,
    RegistrationClosed,
}

impl fmt::Display for Closed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Closed::NotPublished => f.write_str("event is not published"),
            Closed::RegistrationClosed => f.write_str("registration deadline passed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Seat granted: the registration is born `Registered`.
    Immediate,
    /// No seat: the registration joins the waitlist.
    Waitlist,
}

/// Open while published and `now <= registration_deadline`.
pub fn check_open(event: &Event, now: DateTime<Utc>) -> Result<(), Closed> {
    if event.status != EventStatus::Published {
        return Err(Closed::NotPublished);
    }
    if now > event.registration_deadline {
        return Err(Closed::RegistrationClosed);
    }
    Ok(())
}

/// `admitted` counts registrations holding a seat (Registered + Approved).
pub fn evaluate_admission(
    event: &Event,
    now: DateTime<Utc>,
    admitted: u64,
) -> Result<Admission, Closed> {
    check_open(event, now)?;
    Ok(if has_free_seat(event.capacity_limit, admitted) {
        Admission::Immediate
    } else {
        Admission::Waitlist
    })
}

pub fn has_free_seat(capacity: Option<u32>, admitted: u64) -> bool {
    match capacity {
        None => true,
        Some(limit) => admitted < u64::from(limit),
    }
}

/// Seats left; `None` when unlimited. Over-full events report zero.
pub fn free_seats(capacity: Option<u32>, admitted: u64) -> Option<u64> {
    capacity.map(|limit| u64::from(limit).saturating_sub(admitted))
}
