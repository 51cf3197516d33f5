use thiserror::Error;

use crate::auth::TokenError;
use crate::models::ValidationError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("No token stored for subscription {0} - authenticate first")]
    TokenNotFound(String),

    #[error("Token store error: {0}")]
    TokenStore(#[from] StoreError),

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] TokenError),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Failed to create upload session: {0}")]
    UploadSession(String),

    #[error("Failed to upload file content: {0}")]
    ContentUpload(String),

    #[error("Failed to complete upload: {0}")]
    Completion(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, PlatformError>;

/// Maximum length for error response bodies in log lines
const MAX_LOGGED_BODY_LENGTH: usize = 500;

impl PlatformError {
    /// Truncate a response body to avoid logging excessive data.
    /// Error values keep the full body; only log output is shortened.
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_LOGGED_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_LOGGED_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// True for failures caused by the local setup rather than the platform
    pub fn is_configuration(&self) -> bool {
        matches!(self, PlatformError::Configuration(_))
    }

    /// True when the caller must authenticate before retrying the action
    pub fn requires_authentication(&self) -> bool {
        matches!(
            self,
            PlatformError::TokenNotFound(_) | PlatformError::Authentication(_)
        )
    }
}
