use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use db::retry::{with_retry, RetryConfig, RetryError};

use crate::contract::model::SecurityContext;
use crate::domain::error::DomainError;
use crate::domain::events::RegistrationDomainEvent;
use crate::domain::ports::{EventPublisher, Notifier, RecipientDirectory};
use crate::domain::repo::RegistrationsStore;

mod events;
mod notifications;
mod registrations;

/// Domain service for events, registrations, the waitlist and notifications.
/// Depends only on ports, not on infra types.
#[derive(Clone)]
pub struct Service {
    store: Arc<dyn RegistrationsStore>,
    events: Arc<dyn EventPublisher<RegistrationDomainEvent>>,
    notifier: Arc<dyn Notifier>,
    directory: Arc<dyn RecipientDirectory>,
    config: ServiceConfig,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub retry: RetryConfig,
    pub max_bulk_size: usize,
    pub calendar_event_duration: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            max_bulk_size: 500,
            calendar_event_duration: Duration::from_secs(2 * 60 * 60),
        }
    }
}

impl Service {
    pub fn new(
        store: Arc<dyn RegistrationsStore>,
        events: Arc<dyn EventPublisher<RegistrationDomainEvent>>,
        notifier: Arc<dyn Notifier>,
        directory: Arc<dyn RecipientDirectory>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            store,
            events,
            notifier,
            directory,
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Run a whole unit of work (begin..commit) with bounded retry on
    /// concurrency conflicts.
    async fn transact<T, F, Fut>(&self, key: &str, op: F) -> Result<T, DomainError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        with_retry(&self.config.retry, key, DomainError::is_retryable, op)
            .await
            .map_err(|e| match e {
                RetryError::Exhausted { attempts, .. } => {
                    DomainError::ConcurrencyConflict { attempts }
                }
                RetryError::Fatal(e) => e,
            })
    }

    fn publish_all(&self, events: Vec<RegistrationDomainEvent>) {
        for event in &events {
            self.events.publish(event);
        }
    }
}

fn require_identity(actor: Option<&SecurityContext>) -> Result<&SecurityContext, DomainError> {
    actor.ok_or_else(|| DomainError::unauthorized("sign in required"))
}

fn require_admin(actor: Option<&SecurityContext>) -> Result<&SecurityContext, DomainError> {
    let actor = require_identity(actor)?;
    if !actor.is_admin() {
        return Err(DomainError::unauthorized("administrator role required"));
    }
    Ok(actor)
}

/// Owner of the resource or an admin.
fn require_owner_or_admin(actor: &SecurityContext, owner: uuid::Uuid) -> Result<(), DomainError> {
    if actor.is_admin() || actor.user_id == owner {
        Ok(())
    } else {
        Err(DomainError::unauthorized("not your registration"))
    }
}
