use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use tracing::{debug, error};

use super::{StoreError, TokenStore};
use crate::auth::AuthToken;
use crate::utils::truncate_string;

/// PostgREST path prefix on a Supabase project
const REST_PREFIX: &str = "rest/v1";

/// Upsert on the primary key instead of failing on conflict
const UPSERT_PREFERENCE: &str = "resolution=merge-duplicates,return=minimal";

/// Maximum length of a rejected response body kept in logs
const MAX_LOGGED_BODY_CHARS: usize = 500;

/// Token store backed by a Supabase (Postgres) table with columns
/// `subscription_id` (primary key), `login`, `token`, `expires_at`.
pub struct SupabaseTokenStore {
    http: Client,
    url: String,
    api_key: String,
    table: String,
}

impl SupabaseTokenStore {
    pub fn new(http: Client, url: String, api_key: String, table: String) -> Self {
        Self {
            http,
            url: url.trim_end_matches('/').to_string(),
            api_key,
            table,
        }
    }

    fn table_url(&self) -> String {
        format!("{}/{}/{}", self.url, REST_PREFIX, self.table)
    }

    fn request(&self, method: reqwest::Method) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.table_url())
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header(header::ACCEPT, "application/json")
    }

    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        error!(
            status = status.as_u16(),
            body = %truncate_string(&body, MAX_LOGGED_BODY_CHARS),
            "Token store request rejected"
        );
        Err(StoreError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl TokenStore for SupabaseTokenStore {
    async fn upsert(&self, record: &AuthToken) -> Result<(), StoreError> {
        let response = self
            .request(reqwest::Method::POST)
            .query(&[("on_conflict", "subscription_id")])
            .header("Prefer", UPSERT_PREFERENCE)
            .json(&[record])
            .send()
            .await?;

        Self::check_response(response).await?;
        debug!(table = %self.table, subscription_id = %record.subscription_id, "Token record upserted");
        Ok(())
    }

    async fn fetch(&self, subscription_id: &str) -> Result<Option<AuthToken>, StoreError> {
        let filter = format!("eq.{}", subscription_id);
        let response = self
            .request(reqwest::Method::GET)
            .query(&[("select", "*"), ("subscription_id", filter.as_str())])
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let text = response.text().await?;
        let mut records: Vec<AuthToken> = serde_json::from_str(&text)?;
        match records.len() {
            0 => Ok(None),
            1 => Ok(records.pop()),
            count => Err(StoreError::Ambiguous {
                subscription_id: subscription_id.to_string(),
                count,
            }),
        }
    }

    fn name(&self) -> &'static str {
        "supabase"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use mockito::Matcher;
    use serde_json::json;

    fn store(url: &str) -> SupabaseTokenStore {
        SupabaseTokenStore::new(
            Client::new(),
            format!("{}/", url),
            "service-key".to_string(),
            "tokens".to_string(),
        )
    }

    fn record() -> AuthToken {
        AuthToken {
            subscription_id: "sub-1".to_string(),
            login: "alice".to_string(),
            token: "a.b.c".to_string(),
            expires_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_upsert_posts_merge_duplicates() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/tokens")
            .match_query(Matcher::UrlEncoded("on_conflict".into(), "subscription_id".into()))
            .match_header("apikey", "service-key")
            .match_header("authorization", "Bearer service-key")
            .match_header("prefer", UPSERT_PREFERENCE)
            .match_body(Matcher::Json(json!([{
                "subscription_id": "sub-1",
                "login": "alice",
                "token": "a.b.c",
                "expires_at": "2023-11-14T22:13:20.000Z"
            }])))
            .with_status(201)
            .create_async()
            .await;

        store(&server.url()).upsert(&record()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_filters_by_subscription() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/v1/tokens")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("select".into(), "*".into()),
                Matcher::UrlEncoded("subscription_id".into(), "eq.sub-1".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"subscription_id":"sub-1","login":"alice","token":"a.b.c","expires_at":"2023-11-14T22:13:20+00:00"}]"#,
            )
            .create_async()
            .await;

        let fetched = store(&server.url()).fetch("sub-1").await.unwrap();
        assert_eq!(fetched, Some(record()));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_empty_and_ambiguous() {
        let mut server = mockito::Server::new_async().await;
        let _empty = server
            .mock("GET", "/rest/v1/tokens")
            .match_query(Matcher::UrlEncoded("subscription_id".into(), "eq.none".into()))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        let row = r#"{"subscription_id":"dup","login":"a","token":"t","expires_at":"2023-11-14T22:13:20Z"}"#;
        let _dup = server
            .mock("GET", "/rest/v1/tokens")
            .match_query(Matcher::UrlEncoded("subscription_id".into(), "eq.dup".into()))
            .with_status(200)
            .with_body(format!("[{},{}]", row, row))
            .create_async()
            .await;

        let store = store(&server.url());
        assert!(store.fetch("none").await.unwrap().is_none());
        assert!(matches!(
            store.fetch("dup").await,
            Err(StoreError::Ambiguous { count: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_rejected_request_keeps_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/rest/v1/tokens")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"message":"Invalid API key"}"#)
            .create_async()
            .await;

        match store(&server.url()).upsert(&record()).await {
            Err(StoreError::Rejected { status, body }) => {
                assert_eq!(status, 401);
                assert!(body.contains("Invalid API key"));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }
}
