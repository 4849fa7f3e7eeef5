//! Notification flag tracker: who gets addressed, and which flags may flip.
//!
//! Flags are only ever set here, by a successful send, and only for the
//! registrations that were actually on the message and have not been written
//! since they were addressed. Clearing is structural (see `lifecycle`).

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::contract::model::{NotificationRequest, Registration};
use crate::domain::error::DomainError;
use crate::domain::ports::{Attachment, OutboundMessage};

pub const PREVIEW_PREFIX: &str = "[PREVIEW] ";

pub fn validate(req: &NotificationRequest) -> Result<(), DomainError> {
    if req.subject.trim().is_empty() {
        return Err(DomainError::validation("subject", "must not be empty"));
    }
    if req.message.trim().is_empty() {
        return Err(DomainError::validation("message", "must not be empty"));
    }
    if req.recipient_statuses.is_empty() {
        return Err(DomainError::validation(
            "recipient_statuses",
            "select at least one status",
        ));
    }
    Ok(())
}

/// Split `candidates` into those with a known address and those without.
#[derive(Debug, Default)]
pub struct Addressing {
    /// `(id, updated_at)` as read when the message was addressed.
    pub addressed: Vec<(Uuid, DateTime<Utc>)>,
    /// Deduplicated, sorted.
    pub emails: Vec<String>,
    pub unresolved: usize,
}

pub fn address(candidates: &[Registration], directory: &HashMap<Uuid, String>) -> Addressing {
    let mut out = Addressing::default();
    let mut emails = BTreeSet::new();
    for reg in candidates {
        match directory.get(&reg.user_id) {
            Some(email) if !email.trim().is_empty() => {
                out.addressed.push((reg.id, reg.updated_at));
                emails.insert(email.trim().to_string());
            }
            _ => out.unresolved += 1,
        }
    }
    out.emails = emails.into_iter().collect();
    out
}

pub fn broadcast(
    req: &NotificationRequest,
    sender: &str,
    recipients: Vec<String>,
    attachment: Option<Attachment>,
) -> OutboundMessage {
    OutboundMessage {
        to: sender.to_string(),
        bcc: recipients,
        subject: req.subject.trim().to_string(),
        body: req.message.clone(),
        attachment,
    }
}

/// Same content, addressed to the sender only.
pub fn preview(
    req: &NotificationRequest,
    sender: &str,
    attachment: Option<Attachment>,
) -> OutboundMessage {
    OutboundMessage {
        to: sender.to_string(),
        bcc: Vec::new(),
        subject: format!("{PREVIEW_PREFIX}{}", req.subject.trim()),
        body: req.message.clone(),
        attachment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::model::{ParticipationType, RegistrationStatus};
    use chrono::Utc;

    fn request() -> NotificationRequest {
        NotificationRequest {
            event_id: Uuid::new_v4(),
            subject: "  Doors open at 6  ".into(),
            message: "See you there".into(),
            recipient_statuses: vec![RegistrationStatus::Approved],
            include_calendar: false,
        }
    }

    fn reg(user_id: Uuid) -> Registration {
        let now = Utc::now();
        Registration {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            user_id,
            participation_type: ParticipationType::HasIdea,
            idea_description: None,
            status: RegistrationStatus::Approved,
            waitlist_position: None,
            notification_sent: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn validation_rejects_blank_fields() {
        let mut r = request();
        r.subject = "   ".into();
        assert!(matches!(validate(&r), Err(DomainError::Validation { field, .. }) if field == "subject"));

        let mut r = request();
        r.message = "".into();
        assert!(matches!(validate(&r), Err(DomainError::Validation { field, .. }) if field == "message"));

        let mut r = request();
        r.recipient_statuses.clear();
        assert!(validate(&r).is_err());

        assert!(validate(&request()).is_ok());
    }

    #[test]
    fn addressing_skips_unknown_users_and_dedups() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let regs = vec![reg(a), reg(b), reg(c)];
        let dir = HashMap::from([
            (a, "same@example.org".to_string()),
            (b, " same@example.org ".to_string()),
        ]);
        let out = address(&regs, &dir);
        assert_eq!(
            out.addressed,
            vec![(regs[0].id, regs[0].updated_at), (regs[1].id, regs[1].updated_at)]
        );
        assert_eq!(out.emails, vec!["same@example.org".to_string()]);
        assert_eq!(out.unresolved, 1);
    }

    #[test]
    fn preview_goes_to_sender_only() {
        let msg = preview(&request(), "admin@example.org", None);
        assert_eq!(msg.to, "admin@example.org");
        assert!(msg.bcc.is_empty());
        assert_eq!(msg.subject, "[PREVIEW] Doors open at 6");
    }

    #[test]
    fn broadcast_uses_bcc() {
        let msg = broadcast(
            &request(),
            "admin@example.org",
            vec!["p@example.org".into()],
            None,
        );
        assert_eq!(msg.to, "admin@example.org");
        assert_eq!(msg.bcc, vec!["p@example.org".to_string()]);
        assert_eq!(msg.subject, "Doors open at 6");
    }
}
