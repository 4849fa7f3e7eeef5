use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub body: String,
}

/// One outbound mail. Participants go in `bcc`; `to` is the sender's own copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub to: String,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
    pub attachment: Option<Attachment>,
}

/// Best-effort delivery. `Ok` means the relay accepted the message.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> anyhow::Result<()>;
}
