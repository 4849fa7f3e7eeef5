pub mod directory;
pub mod notifier;

pub use directory::RecipientDirectory;
pub use notifier::{Attachment, Notifier, OutboundMessage};

/// Output port: publish domain events (no knowledge of transport).
pub trait EventPublisher<E>: Send + Sync + 'static {
    fn publish(&self, event: &E);
}
