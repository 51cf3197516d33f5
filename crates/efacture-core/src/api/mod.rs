//! REST client module for the e-invoicing platform.
//!
//! This module provides the `PlatformClient` for the four remote calls of an
//! upload: authenticate, create an upload session, upload file content and
//! complete the upload.
//!
//! The platform uses JWT bearer tokens obtained from its authenticate
//! endpoint plus an `X-ApiKey` header on every call except content upload.

pub mod client;
pub mod error;

pub use client::PlatformClient;
pub use error::{PlatformError, Result};
