use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{StoreError, TokenStore};
use crate::auth::AuthToken;

/// Token records keyed by subscription id
type TokenMap = BTreeMap<String, AuthToken>;

/// Token store backed by a single JSON document.
///
/// Writes go to a sibling temp file which is then renamed over the document,
/// so a failed write leaves the previous contents intact. The mutex only
/// serializes writers inside this process.
pub struct FileTokenStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<TokenMap, StoreError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(TokenMap::new()),
            Err(e) => return Err(e.into()),
        };

        if contents.trim().is_empty() {
            return Ok(TokenMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    async fn save(&self, tokens: &TokenMap) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let contents = serde_json::to_string_pretty(tokens)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn upsert(&self, record: &AuthToken) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;

        let mut tokens = self.load().await?;
        tokens.insert(record.subscription_id.clone(), record.clone());
        self.save(&tokens).await?;

        debug!(path = ?self.path, subscription_id = %record.subscription_id, "Token record written");
        Ok(())
    }

    async fn fetch(&self, subscription_id: &str) -> Result<Option<AuthToken>, StoreError> {
        let _guard = self.lock.lock().await;
        let mut tokens = self.load().await?;
        Ok(tokens.remove(subscription_id))
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
