//! Registration state machine.
//!
//! `transition` is the only place that decides whether a move is legal, and
//! `Registration::apply` / `Registration::enqueue` are the only places that
//! write status, position and the notification flag. Every write clears the
//! flag, including a re-decision that lands on the same status.

use chrono::{DateTime, Utc};

use crate::contract::model::{Decision, Registration, RegistrationStatus};
use crate::domain::error::DomainError;

/// What is happening to an existing registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A seat freed up and this entrant is first in line.
    Promote,
    Decide(Decision),
    Cancel,
}

impl Trigger {
    fn action(self) -> &'static str {
        match self {
            Trigger::Promote => "promote",
            Trigger::Decide(Decision::Approve) => "approve",
            Trigger::Decide(Decision::Reject) => "reject",
            Trigger::Cancel => "cancel",
        }
    }
}

/// Side effects the caller owes the ledger after a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub from: RegistrationStatus,
    pub to: RegistrationStatus,
}

impl Move {
    /// A seat was given up; the ledger should try to fill it.
    pub fn frees_seat(&self) -> bool {
        self.from.holds_seat() && !self.to.holds_seat()
    }

    /// A seat is claimed from outside the admitted pool; needs a free one.
    pub fn takes_seat(&self) -> bool {
        !self.from.holds_seat() && self.to.holds_seat()
    }

    /// The entrant left the queue; positions above it close the gap.
    pub fn leaves_waitlist(&self) -> bool {
        self.from == RegistrationStatus::Waitlisted && self.to != RegistrationStatus::Waitlisted
    }
}

/// The transition table.
pub fn transition(from: RegistrationStatus, trigger: Trigger) -> Result<Move, DomainError> {
    use RegistrationStatus::*;

    let to = match (from, trigger) {
        (Waitlisted, Trigger::Promote) => Some(Registered),
        (Registered | Waitlisted | Approved | Rejected, Trigger::Decide(d)) => Some(d.target()),
        (Registered | Waitlisted | Approved, Trigger::Cancel) => Some(Cancelled),
        _ => None,
    };

    to.map(|to| Move { from, to })
        .ok_or(DomainError::InvalidTransition {
            from,
            action: trigger.action(),
        })
}

impl Registration {
    /// Apply a legal move. Positions are cleared; the ledger renumbers the rest.
    pub fn apply(&mut self, mv: Move, now: DateTime<Utc>) {
        debug_assert_eq!(self.status, mv.from);
        debug_assert_ne!(mv.to, RegistrationStatus::Waitlisted);
        self.status = mv.to;
        self.waitlist_position = None;
        self.touch(now);
    }

    /// Place on the waitlist at `position`.
    pub fn enqueue(&mut self, position: u32, now: DateTime<Utc>) {
        self.status = RegistrationStatus::Waitlisted;
        self.waitlist_position = Some(position);
        self.touch(now);
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.notification_sent = false;
        self.updated_at = now;
    }
}
