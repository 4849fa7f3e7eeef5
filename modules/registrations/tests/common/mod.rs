//! Shared harness: the real SeaORM store on a temp-file SQLite database,
//! with recording doubles for mail, the directory and domain events.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use db::{ConnectOpts, DbHandle, RetryConfig};
use tempfile::TempDir;
use uuid::Uuid;

use registrations::contract::model::{
    Event, EventStatus, NewEvent, NewRegistration, ParticipationType, Registration,
    RegistrationOutcome, RegistrationStatus, SecurityContext,
};
use registrations::domain::error::DomainError;
use registrations::domain::events::RegistrationDomainEvent;
use registrations::domain::ports::{EventPublisher, Notifier, OutboundMessage, RecipientDirectory};
use registrations::domain::service::{Service, ServiceConfig};
use registrations::Registrations;

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<OutboundMessage>>,
    pub fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_next(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &OutboundMessage) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("relay refused the message");
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryDirectory {
    emails: Mutex<HashMap<Uuid, String>>,
}

impl MemoryDirectory {
    pub fn add(&self, user_id: Uuid, email: &str) {
        self.emails.lock().unwrap().insert(user_id, email.to_string());
    }
}

#[async_trait]
impl RecipientDirectory for MemoryDirectory {
    async fn emails_for(&self, user_ids: &[Uuid]) -> anyhow::Result<HashMap<Uuid, String>> {
        let emails = self.emails.lock().unwrap();
        Ok(user_ids
            .iter()
            .filter_map(|id| emails.get(id).map(|e| (*id, e.clone())))
            .collect())
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    pub events: Mutex<Vec<RegistrationDomainEvent>>,
}

impl RecordingPublisher {
    pub fn all(&self) -> Vec<RegistrationDomainEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventPublisher<RegistrationDomainEvent> for RecordingPublisher {
    fn publish(&self, event: &RegistrationDomainEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

pub struct Harness {
    pub service: Arc<Service>,
    pub module: Registrations,
    pub notifier: Arc<RecordingNotifier>,
    pub directory: Arc<MemoryDirectory>,
    pub events: Arc<RecordingPublisher>,
    pub db: DbHandle,
    pub admin: SecurityContext,
    _dir: TempDir,
}

/// Generous retry budget: tests hammer a single SQLite file.
pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        retry: RetryConfig {
            max_attempts: 20,
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(100),
            ..RetryConfig::default()
        },
        ..ServiceConfig::default()
    }
}

pub async fn harness() -> Harness {
    harness_with(test_config()).await
}

pub async fn harness_with(config: ServiceConfig) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let dsn = format!(
        "sqlite://{}?busy_timeout=10000",
        dir.path().join("registrations.db").display()
    );
    let db = DbHandle::connect(
        &dsn,
        ConnectOpts {
            max_conns: Some(8),
            ..ConnectOpts::default()
        },
    )
    .await
    .expect("connect sqlite");

    let module = Registrations::new();
    module.migrate(&db).await.expect("migrate");

    let notifier = Arc::new(RecordingNotifier::default());
    let directory = Arc::new(MemoryDirectory::default());
    let events = Arc::new(RecordingPublisher::default());
    let service = Arc::new(Service::new(
        Arc::new(registrations::infra::storage::SeaOrmStore::new(db.sea())),
        events.clone(),
        notifier.clone(),
        directory.clone(),
        config,
    ));

    let admin = SecurityContext::admin(Uuid::new_v4(), "admin@example.org");
    directory.add(admin.user_id, &admin.email);

    Harness {
        service,
        module,
        notifier,
        directory,
        events,
        db,
        admin,
        _dir: dir,
    }
}

impl Harness {
    pub fn participant(&self, name: &str) -> SecurityContext {
        let ctx = SecurityContext::participant(Uuid::new_v4(), format!("{name}@example.org"));
        self.directory.add(ctx.user_id, &ctx.email);
        ctx
    }

    pub fn participants(&self, n: usize) -> Vec<SecurityContext> {
        (1..=n).map(|i| self.participant(&format!("p{i}"))).collect()
    }

    pub async fn event(&self, capacity: Option<u32>) -> Event {
        let now = Utc::now();
        self.event_with(capacity, now + chrono::Duration::days(1), EventStatus::Published)
            .await
    }

    pub async fn event_with(
        &self,
        capacity: Option<u32>,
        deadline: DateTime<Utc>,
        status: EventStatus,
    ) -> Event {
        let slug = format!("event-{}", &Uuid::new_v4().simple().to_string()[..8]);
        let event_date = std::cmp::max(deadline, Utc::now()) + chrono::Duration::days(1);
        self.service
            .create_event(
                Some(&self.admin),
                NewEvent {
                    slug,
                    title: "Hack Night".into(),
                    description: "Build something".into(),
                    location: Some("Lab 1".into()),
                    event_date,
                    registration_deadline: deadline,
                    capacity_limit: capacity,
                    status,
                },
            )
            .await
            .expect("create event")
    }

    pub async fn register(
        &self,
        ctx: &SecurityContext,
        event_id: Uuid,
    ) -> Result<RegistrationOutcome, DomainError> {
        self.service
            .register(
                Some(ctx),
                NewRegistration {
                    event_id,
                    participation_type: ParticipationType::WantsToHelp,
                    idea_description: None,
                },
            )
            .await
    }

    pub async fn registration(&self, id: Uuid) -> Registration {
        self.service
            .get_registration(Some(&self.admin), id)
            .await
            .expect("registration exists")
    }

    pub async fn all(&self, event_id: Uuid) -> Vec<Registration> {
        self.service
            .list_event_registrations(Some(&self.admin), event_id, &[])
            .await
            .expect("list registrations")
    }

    pub async fn admitted(&self, event_id: Uuid) -> usize {
        self.all(event_id)
            .await
            .iter()
            .filter(|r| r.status.holds_seat())
            .count()
    }

    /// `(registration id, position)` head first.
    pub async fn queue(&self, event_id: Uuid) -> Vec<(Uuid, u32)> {
        self.service
            .waitlist(event_id)
            .await
            .expect("waitlist")
            .into_iter()
            .map(|e| (e.registration_id, e.position))
            .collect()
    }

    pub async fn with_status(&self, event_id: Uuid, status: RegistrationStatus) -> Vec<Registration> {
        self.service
            .list_event_registrations(Some(&self.admin), event_id, &[status])
            .await
            .expect("list registrations")
    }
}

/// Positions among waitlisted rows are exactly 1..=n.
pub fn assert_dense(regs: &[Registration]) {
    let mut positions: Vec<u32> = regs
        .iter()
        .filter(|r| r.status == RegistrationStatus::Waitlisted)
        .map(|r| r.waitlist_position.expect("waitlisted row has a position"))
        .collect();
    positions.sort_unstable();
    let expected: Vec<u32> = (1..=positions.len() as u32).collect();
    assert_eq!(positions, expected, "waitlist positions are not dense");
    for r in regs.iter().filter(|r| r.status != RegistrationStatus::Waitlisted) {
        assert_eq!(r.waitlist_position, None, "{} row keeps a position", r.status);
    }
}
