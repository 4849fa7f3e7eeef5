use tracing::info;

use crate::domain::events::RegistrationDomainEvent;
use crate::domain::ports::EventPublisher;

/// Emits every domain event as a structured log line.
#[derive(Debug, Clone, Default)]
pub struct TracingEventPublisher;

impl EventPublisher<RegistrationDomainEvent> for TracingEventPublisher {
    fn publish(&self, event: &RegistrationDomainEvent) {
        match event {
            RegistrationDomainEvent::Registered { id, event_id, user_id, .. } => {
                info!(target: "registrations.events", %id, %event_id, %user_id, "registered");
            }
            RegistrationDomainEvent::Waitlisted { id, event_id, user_id, position, .. } => {
                info!(target: "registrations.events", %id, %event_id, %user_id, position, "waitlisted");
            }
            RegistrationDomainEvent::Promoted { id, event_id, .. } => {
                info!(target: "registrations.events", %id, %event_id, "promoted");
            }
            RegistrationDomainEvent::StatusChanged { id, event_id, from, to, .. } => {
                info!(target: "registrations.events", %id, %event_id, %from, %to, "status changed");
            }
            RegistrationDomainEvent::Cancelled { id, event_id, .. } => {
                info!(target: "registrations.events", %id, %event_id, "cancelled");
            }
            RegistrationDomainEvent::Notified { event_id, count, .. } => {
                info!(target: "registrations.events", %event_id, count, "notified");
            }
        }
    }
}
