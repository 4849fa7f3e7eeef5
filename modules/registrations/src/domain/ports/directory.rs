use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

/// Resolves participant ids to mail addresses (owned by the identity side).
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    /// Ids without a known address are simply absent from the result.
    async fn emails_for(&self, user_ids: &[Uuid]) -> anyhow::Result<HashMap<Uuid, String>>;
}
