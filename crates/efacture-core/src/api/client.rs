//! API client for the e-invoicing platform.
//!
//! `PlatformClient` wraps the four remote calls of an upload. It holds no
//! per-workflow state: the bearer token is read from the token store on every
//! call and the upload id is passed in by the caller.

use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{header, Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::error::{PlatformError, Result};
use crate::auth::{AuthToken, Credential};
use crate::config::PlatformConfig;
use crate::models::{
    validate_files, AuthenticationResponse, CompletionJob, FileDescriptor, FilePayload, FileType,
    UploadSession,
};
use crate::store::TokenStore;
use crate::utils::{format_timestamp, preview_secret};

// ============================================================================
// Constants
// ============================================================================

/// Path prefix of the public API, relative to the configured base URL
const API_PREFIX: [&str; 2] = ["public", "v3"];

/// Header carrying the platform API key
const API_KEY_HEADER: &str = "X-ApiKey";

/// Multipart field name, repeated once per uploaded file
const UPLOAD_FIELD: &str = "formFiles";

/// One file entry of a session-creation request. Only the fields the
/// platform accepts; fingerprints are not part of the request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionFileEntry<'a> {
    file_name: &'a str,
    file_size: u64,
    file_type: FileType,
    source: &'a str,
    source_id: Option<&'a str>,
}

impl<'a> From<&'a FileDescriptor> for SessionFileEntry<'a> {
    fn from(file: &'a FileDescriptor) -> Self {
        Self {
            file_name: &file.file_name,
            file_size: file.file_size,
            file_type: file.file_type,
            source: &file.source,
            source_id: file.source_id.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionRequest<'a> {
    files: Vec<SessionFileEntry<'a>>,
    channel: &'a str,
    mail_address: Option<&'a str>,
}

/// API client for the e-invoicing platform.
/// Clone is cheap - reqwest::Client and the token store are reference counted.
#[derive(Clone)]
pub struct PlatformClient {
    http: Client,
    config: PlatformConfig,
    store: Arc<dyn TokenStore>,
}

impl PlatformClient {
    /// Create a client with its own connection pool
    pub fn new(config: PlatformConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
        let http = Self::build_http_client(config.request_timeout)?;
        Ok(Self::with_http(http, config, store))
    }

    /// Create a client on an existing connection pool
    pub fn with_http(http: Client, config: PlatformConfig, store: Arc<dyn TokenStore>) -> Self {
        Self { http, config, store }
    }

    /// HTTP client shared by the platform client and HTTP-backed token stores
    pub fn build_http_client(timeout: Duration) -> Result<Client> {
        Ok(Client::builder().timeout(timeout).build()?)
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    // ===== Remote Calls =====

    /// Authenticate against the platform and store the issued token for the
    /// configured subscription.
    pub async fn authenticate(&self, login: &str, password: &str) -> Result<AuthenticationResponse> {
        let api_key = self.config.api_key()?;
        let url = self.endpoint(&["accounts", "authenticate"])?;
        let subscription_id = self.config.subscription_id()?;

        debug!(%url, login, "Sending authentication request");

        let response = self
            .http
            .post(url)
            .header(header::ACCEPT, "application/json")
            .header(API_KEY_HEADER, api_key)
            .json(&Credential::new(login, password))
            .send()
            .await?;

        let response = Self::check_response(response, "authenticate", |status, _| {
            PlatformError::Authentication(Self::status_text(status))
        })
        .await?;

        let auth: AuthenticationResponse = Self::parse_json(response, "authenticate").await?;

        let record = AuthToken::from_token(subscription_id, login, auth.token.as_str())?;
        self.store.upsert(&record).await?;

        info!(
            login,
            subscription_id,
            store = self.store.name(),
            token = %preview_secret(&record.token),
            expires_at = %format_timestamp(&record.expires_at),
            "Authenticated and stored token"
        );

        Ok(auth)
    }

    /// Open an upload session for a batch of files. The whole batch is
    /// validated first; one bad descriptor rejects it without any request.
    pub async fn create_upload_session(
        &self,
        subscription_id: &str,
        files: &[FileDescriptor],
    ) -> Result<UploadSession> {
        let api_key = self.config.api_key()?;
        validate_files(files)?;
        let url = self.endpoint(&["uploads", "new"])?;
        let token = self.bearer_token(subscription_id).await?;

        let body = CreateSessionRequest {
            files: files.iter().map(SessionFileEntry::from).collect(),
            channel: &self.config.channel,
            mail_address: self.config.mail_address.as_deref(),
        };

        debug!(%url, subscription_id, files = files.len(), "Creating upload session");

        let response = self
            .http
            .post(url)
            .query(&[("subscriptionId", subscription_id)])
            .header(header::ACCEPT, "application/json")
            .bearer_auth(&token.token)
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await?;

        let response = Self::check_response(response, "create upload session", |status, body| {
            PlatformError::UploadSession(Self::failure_text(status, body))
        })
        .await?;

        let session: UploadSession = Self::parse_json(response, "create upload session").await?;
        info!(upload_id = %session.upload_id, files = files.len(), "Upload session created");
        Ok(session)
    }

    /// Send the file bytes of an open session as one multipart request.
    ///
    /// This call carries the bearer token only; the platform does not take
    /// the API key header here.
    pub async fn upload_file_content(&self, upload_id: &str, files: &[FilePayload]) -> Result<()> {
        self.config.api_key()?;
        let url = self.endpoint(&["uploads", upload_id, "upload"])?;
        let token = self.bearer_token(self.config.subscription_id()?).await?;

        let form = files.iter().fold(Form::new(), |form, file| {
            form.part(
                UPLOAD_FIELD,
                Part::bytes(file.bytes.clone()).file_name(file.file_name.clone()),
            )
        });

        let total_bytes: u64 = files.iter().map(FilePayload::size).sum();
        debug!(%url, upload_id, files = files.len(), total_bytes, "Uploading file content");

        let response = self
            .http
            .post(url)
            .bearer_auth(&token.token)
            .multipart(form)
            .send()
            .await?;

        // Success bodies may be empty or not JSON; nothing to parse.
        Self::check_response(response, "upload file content", |status, body| {
            PlatformError::ContentUpload(Self::failure_text(status, body))
        })
        .await?;

        info!(upload_id, files = files.len(), total_bytes, "File content uploaded");
        Ok(())
    }

    /// Finalize an upload session into a processing job
    pub async fn complete_upload(&self, upload_id: &str) -> Result<CompletionJob> {
        self.config.api_key()?;
        let url = self.endpoint(&["uploads", upload_id, "complete"])?;
        let token = self.bearer_token(self.config.subscription_id()?).await?;

        debug!(%url, upload_id, "Completing upload");

        let response = self
            .http
            .get(url)
            .header(header::ACCEPT, "application/json")
            .bearer_auth(&token.token)
            .send()
            .await?;

        let response = Self::check_response(response, "complete upload", |status, body| {
            PlatformError::Completion(Self::failure_text(status, body))
        })
        .await?;

        let job: CompletionJob = Self::parse_json(response, "complete upload").await?;
        info!(upload_id, job_id = %job.job_id, "Upload completed");
        Ok(job)
    }

    // ===== Token Lookup =====

    /// The stored token for a subscription.
    ///
    /// Expiry is not enforced: an expired token is still sent and the
    /// platform's rejection surfaces as the calling operation's error.
    pub async fn bearer_token(&self, subscription_id: &str) -> Result<AuthToken> {
        let token = self
            .store
            .fetch(subscription_id)
            .await?
            .ok_or_else(|| PlatformError::TokenNotFound(subscription_id.to_string()))?;

        if token.is_expired() {
            warn!(
                subscription_id,
                expires_at = %format_timestamp(&token.expires_at),
                "Stored token has expired; the platform will likely reject it"
            );
        }
        Ok(token)
    }

    // ===== Helpers =====

    /// `<base_url>/public/v3/<segments...>`, each segment percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.config.base_url()?;
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                PlatformError::Configuration("Platform API URL cannot carry a path".to_string())
            })?;
            path.pop_if_empty().extend(API_PREFIX).extend(segments);
        }
        Ok(url)
    }

    /// Check if response is successful, returning the call's error if not.
    async fn check_response<F>(
        response: reqwest::Response,
        call: &'static str,
        to_error: F,
    ) -> Result<reqwest::Response>
    where
        F: FnOnce(StatusCode, String) -> PlatformError,
    {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(
            call,
            status = status.as_u16(),
            body = %PlatformError::truncate_body(&body),
            "Platform call failed"
        );
        Err(to_error(status, body))
    }

    async fn parse_json<T: DeserializeOwned>(response: reqwest::Response, call: &'static str) -> Result<T> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| PlatformError::InvalidResponse(format!("{}: {}", call, e)))
    }

    /// Reason phrase of a status, e.g. "Unauthorized"
    fn status_text(status: StatusCode) -> String {
        status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| status.as_u16().to_string())
    }

    /// The platform's error body verbatim, or the status when the body is empty
    fn failure_text(status: StatusCode, body: String) -> String {
        if body.trim().is_empty() {
            status.to_string()
        } else {
            body
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
