//! Upload orchestration.
//!
//! `UploadWorkflow` sequences session creation, content transfer and optional
//! completion, holding the upload id between steps. Every phase change is
//! published on a watch channel for the presentation layer.

pub mod workflow;

pub use workflow::{UploadPhase, UploadWorkflow, WorkflowError};
