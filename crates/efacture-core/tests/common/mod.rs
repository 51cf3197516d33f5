#![allow(dead_code)]

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, TimeZone, Utc};
use efacture_core::auth::AuthToken;
use efacture_core::store::{MemoryTokenStore, TokenStore};
use efacture_core::{PlatformClient, PlatformConfig};

pub const SUBSCRIPTION: &str = "sub-1";
pub const API_KEY: &str = "live-key";

/// Unsigned three-segment token carrying the given `exp` claim
pub fn jwt(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"alice","exp":{}}}"#, exp));
    format!("{}.{}.c2lnbmF0dXJl", header, payload)
}

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub fn stored_token(token: &str, expires_at: DateTime<Utc>) -> AuthToken {
    AuthToken {
        subscription_id: SUBSCRIPTION.to_string(),
        login: "alice".to_string(),
        token: token.to_string(),
        expires_at,
    }
}

pub fn client_with(config: PlatformConfig, store: Arc<MemoryTokenStore>) -> PlatformClient {
    PlatformClient::with_http(reqwest::Client::new(), config, store)
}

pub fn client(base_url: &str, store: Arc<MemoryTokenStore>) -> PlatformClient {
    client_with(PlatformConfig::new(base_url, API_KEY, SUBSCRIPTION), store)
}

/// Store already holding a token that is valid for a long time
pub async fn authenticated_store(token: &str) -> Arc<MemoryTokenStore> {
    let store = Arc::new(MemoryTokenStore::new());
    store
        .upsert(&stored_token(token, Utc::now() + chrono::Duration::hours(1)))
        .await
        .unwrap();
    store
}
