//! Authentication module for platform credentials and bearer tokens.
//!
//! This module provides:
//! - `Credential`: login/password pair supplied by the user, never persisted
//! - `AuthToken`: the bearer token record stored per subscription, with its
//!   expiry decoded from the token's `exp` claim

pub mod credentials;
pub mod token;

pub use credentials::Credential;
pub use token::{decode_expiration, AuthToken, TokenError};
