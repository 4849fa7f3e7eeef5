use std::sync::Arc;

use anyhow::anyhow;
use arc_swap::ArcSwapOption;
use db::DbHandle;
use sea_orm_migration::MigratorTrait;
use tracing::{debug, info};

use crate::config::RegistrationsConfig;
use crate::contract::client::RegistrationsApi;
use crate::domain::ports::{Notifier, RecipientDirectory};
use crate::domain::service::Service;
use crate::gateways::local::RegistrationsLocalClient;
use crate::infra::mail::notifier_from_config;
use crate::infra::publisher::TracingEventPublisher;
use crate::infra::storage::migrations::Migrator;
use crate::infra::storage::SeaOrmStore;

/// Module entry point: owns the wired service once `init` has run.
#[derive(Default)]
pub struct Registrations {
    service: ArcSwapOption<Service>,
}

impl Clone for Registrations {
    fn clone(&self) -> Self {
        Self {
            service: ArcSwapOption::new(self.service.load_full()),
        }
    }
}

impl Registrations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wire storage, mail and the recipient directory into the service.
    pub async fn init(
        &self,
        db: &DbHandle,
        cfg: &RegistrationsConfig,
        directory: Arc<dyn RecipientDirectory>,
    ) -> anyhow::Result<()> {
        let notifier = notifier_from_config(&cfg.mail)?;
        self.init_with_notifier(db, cfg, directory, notifier).await
    }

    pub async fn init_with_notifier(
        &self,
        db: &DbHandle,
        cfg: &RegistrationsConfig,
        directory: Arc<dyn RecipientDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> anyhow::Result<()> {
        info!("Initializing registrations module");
        debug!(
            max_attempts = cfg.retry.max_attempts,
            max_bulk_size = cfg.max_bulk_size,
            "loaded registrations config"
        );

        let store = SeaOrmStore::new(db.sea());
        let service = Service::new(
            Arc::new(store),
            Arc::new(TracingEventPublisher),
            notifier,
            directory,
            cfg.service_config(),
        );
        self.service.store(Some(Arc::new(service)));
        Ok(())
    }

    pub async fn migrate(&self, db: &DbHandle) -> anyhow::Result<()> {
        info!("Running registrations database migrations");
        let conn = db.sea();
        Migrator::up(&conn, None).await?;
        info!("Registrations database migrations completed");
        Ok(())
    }

    pub fn service(&self) -> anyhow::Result<Arc<Service>> {
        self.service
            .load_full()
            .ok_or_else(|| anyhow!("registrations service not initialized"))
    }

    pub fn client(&self) -> anyhow::Result<Arc<dyn RegistrationsApi>> {
        Ok(Arc::new(RegistrationsLocalClient::new(self.service()?)))
    }
}
