use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::ports::RecipientDirectory;

/// Fixed id → address table, for operator tooling and local runs where the
/// identity service is not wired in.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    emails: HashMap<Uuid, String>,
}

impl StaticDirectory {
    pub fn new(entries: impl IntoIterator<Item = (Uuid, String)>) -> Self {
        Self {
            emails: entries.into_iter().collect(),
        }
    }

    pub fn insert(&mut self, user_id: Uuid, email: impl Into<String>) {
        self.emails.insert(user_id, email.into());
    }
}

#[async_trait]
impl RecipientDirectory for StaticDirectory {
    async fn emails_for(&self, user_ids: &[Uuid]) -> anyhow::Result<HashMap<Uuid, String>> {
        Ok(user_ids
            .iter()
            .filter_map(|id| self.emails.get(id).map(|e| (*id, e.clone())))
            .collect())
    }
}
