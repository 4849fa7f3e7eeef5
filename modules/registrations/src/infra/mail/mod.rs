//! Notifier adapters: an SMTP relay, or the log when no relay is configured.

use std::sync::Arc;

use tracing::info;

use crate::config::MailConfig;
use crate::domain::ports::Notifier;

pub mod log;
pub mod smtp;

pub use log::LogNotifier;
pub use smtp::SmtpNotifier;

pub fn notifier_from_config(cfg: &MailConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    match &cfg.smtp {
        Some(smtp) => {
            info!(host = %smtp.host, port = smtp.port, "mail goes through SMTP relay");
            Ok(Arc::new(SmtpNotifier::new(&cfg.from, smtp)?))
        }
        None => {
            info!("no SMTP relay configured, mail is logged only");
            Ok(Arc::new(LogNotifier::new(&cfg.from)))
        }
    }
}
