//! Core library for efacture.
//!
//! Submits electronic invoice files to the e-invoicing platform:
//!
//! - `api`: `PlatformClient`, the four remote calls (authenticate, create
//!   upload session, upload content, complete) and the `PlatformError` taxonomy
//! - `auth`: credentials and bearer token decoding
//! - `store`: token persistence, one record per subscription
//! - `models`: file descriptors, payloads and upload artifacts
//! - `upload`: `UploadWorkflow`, the multi-step upload state machine
//! - `config`: environment configuration and user preferences

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod store;
pub mod upload;
pub mod utils;

pub use api::{PlatformClient, PlatformError};
pub use config::{Config, PlatformConfig, Preferences, StoreConfig};
pub use upload::{UploadPhase, UploadWorkflow, WorkflowError};
