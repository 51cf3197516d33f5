//! Token persistence.
//!
//! One `AuthToken` record per subscription identifier, with upsert semantics:
//! writing a record for an existing subscription replaces it. Backends:
//!
//! - `FileTokenStore`: JSON document on local disk
//! - `SupabaseTokenStore`: managed Postgres table through its PostgREST API
//! - `MemoryTokenStore`: process-local map

pub mod file;
pub mod memory;
pub mod supabase;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::AuthToken;
use crate::config::StoreConfig;

pub use file::FileTokenStore;
pub use memory::MemoryTokenStore;
pub use supabase::SupabaseTokenStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Token store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Token store data error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Token store request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Token store rejected request (status {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Expected one token record for subscription {subscription_id}, found {count}")]
    Ambiguous { subscription_id: String, count: usize },

    #[error("Token store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Insert or replace the record for `record.subscription_id`
    async fn upsert(&self, record: &AuthToken) -> Result<(), StoreError>;

    /// The record for a subscription, if one has been written
    async fn fetch(&self, subscription_id: &str) -> Result<Option<AuthToken>, StoreError>;

    /// Backend name for log output
    fn name(&self) -> &'static str;
}

/// Build the backend selected by configuration. The HTTP client is shared
/// with the platform client so both use one connection pool.
pub fn from_config(config: &StoreConfig, http: reqwest::Client) -> Arc<dyn TokenStore> {
    match config {
        StoreConfig::File { path } => Arc::new(FileTokenStore::new(path.clone())),
        StoreConfig::Supabase { url, api_key, table } => Arc::new(SupabaseTokenStore::new(
            http,
            url.clone(),
            api_key.clone(),
            table.clone(),
        )),
        StoreConfig::Memory => Arc::new(MemoryTokenStore::new()),
    }
}
