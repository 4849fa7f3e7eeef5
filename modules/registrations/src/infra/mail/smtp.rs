use anyhow::{anyhow, Context};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment as MailAttachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use crate::config::SmtpConfig;
use crate::domain::ports::{Notifier, OutboundMessage};

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(from: &str, cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let from: Mailbox = from
            .parse()
            .map_err(|e| anyhow!("invalid sender address '{from}': {e}"))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)
            .with_context(|| format!("failed to create SMTP transport for {}", cfg.host))?
            .port(cfg.port);
        if let (Some(user), Some(pass)) = (&cfg.username, &cfg.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, message: &OutboundMessage) -> anyhow::Result<()> {
        let email = build_message(&self.from, message)?;
        self.transport
            .send(email)
            .await
            .map_err(|e| anyhow!("failed to send mail via SMTP: {e}"))?;
        debug!(recipients = message.bcc.len(), "mail handed to relay");
        Ok(())
    }
}

/// Participants only ever appear in Bcc.
pub fn build_message(from: &Mailbox, message: &OutboundMessage) -> anyhow::Result<Message> {
    let mut builder = Message::builder()
        .from(from.clone())
        .to(parse_mailbox(&message.to)?)
        .subject(&message.subject);
    for addr in &message.bcc {
        builder = builder.bcc(parse_mailbox(addr)?);
    }

    let text = SinglePart::builder()
        .header(ContentType::TEXT_PLAIN)
        .body(message.body.clone());

    let email = match &message.attachment {
        Some(att) => {
            let content_type = ContentType::parse(&att.content_type)
                .map_err(|e| anyhow!("invalid attachment content type: {e}"))?;
            let part = MailAttachment::new(att.filename.clone()).body(att.body.clone(), content_type);
            builder.multipart(MultiPart::mixed().singlepart(text).singlepart(part))
        }
        None => builder.singlepart(text),
    };
    email.map_err(|e| anyhow!("failed to build mail: {e}"))
}

fn parse_mailbox(addr: &str) -> anyhow::Result<Mailbox> {
    addr.parse()
        .map_err(|e| anyhow!("invalid address '{addr}': {e}"))
}
