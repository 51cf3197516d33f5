//! Data models for the upload workflow.
//!
//! - `FileDescriptor`, `FileType`, `FingerprintAlgorithm`: metadata the
//!   platform needs to open an upload session, plus its validation rules
//! - `FilePayload`: raw bytes of one selected file
//! - `UploadSession`, `CompletionJob`, `AuthenticationResponse`: platform
//!   response bodies

pub mod file;
pub mod upload;

pub use file::{
    validate_file, validate_files, FileDescriptor, FilePayload, FileType, FingerprintAlgorithm,
    ValidationError, DEFAULT_SOURCE,
};
pub use upload::{AuthenticationResponse, CompletionJob, UploadSession};
