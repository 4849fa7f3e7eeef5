use async_trait::async_trait;
use tracing::{debug, info};

use crate::domain::ports::{Notifier, OutboundMessage};

/// Writes the envelope through `tracing` instead of delivering it.
#[derive(Clone, Debug)]
pub struct LogNotifier {
    from: String,
}

impl LogNotifier {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &OutboundMessage) -> anyhow::Result<()> {
        info!(
            from = %self.from,
            to = %message.to,
            bcc = message.bcc.len(),
            subject = %message.subject,
            attachment = message.attachment.as_ref().map(|a| a.filename.as_str()),
            "mail (log only)"
        );
        debug!(body = %message.body, "mail body");
        Ok(())
    }
}
