use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{StoreError, TokenStore};
use crate::auth::AuthToken;

/// Process-local token store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<HashMap<String, AuthToken>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.tokens.read().map(|tokens| tokens.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("in-memory token store lock poisoned".to_string())
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn upsert(&self, record: &AuthToken) -> Result<(), StoreError> {
        let mut tokens = self.tokens.write().map_err(|_| Self::poisoned())?;
        tokens.insert(record.subscription_id.clone(), record.clone());
        Ok(())
    }

    async fn fetch(&self, subscription_id: &str) -> Result<Option<AuthToken>, StoreError> {
        let tokens = self.tokens.read().map_err(|_| Self::poisoned())?;
        Ok(tokens.get(subscription_id).cloned())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
