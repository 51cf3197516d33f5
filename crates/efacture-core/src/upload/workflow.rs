use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{PlatformClient, PlatformError};
use crate::models::{CompletionJob, FileDescriptor, FilePayload, UploadSession};

// ============================================================================
// Phases
// ============================================================================

/// Where a workflow stands. Only explicit caller actions move it forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadPhase {
    /// Nothing selected yet
    Idle,
    FilesSelected { files: usize, total_bytes: u64 },
    SessionPending,
    /// Session open, content not sent yet
    SessionActive { upload_id: String },
    ContentPending { upload_id: String },
    CompletionPending { upload_id: String },
    /// Content accepted; `job_id` is set once the upload has been completed
    Completed { upload_id: String, job_id: Option<String> },
    /// A call failed; the session (if any) is abandoned
    Failed { message: String },
}

impl UploadPhase {
    pub fn name(&self) -> &'static str {
        match self {
            UploadPhase::Idle => "idle",
            UploadPhase::FilesSelected { .. } => "files selected",
            UploadPhase::SessionPending => "creating session",
            UploadPhase::SessionActive { .. } => "session active",
            UploadPhase::ContentPending { .. } => "uploading content",
            UploadPhase::CompletionPending { .. } => "completing upload",
            UploadPhase::Completed { .. } => "completed",
            UploadPhase::Failed { .. } => "failed",
        }
    }

    /// True while a remote call is outstanding
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            UploadPhase::SessionPending
                | UploadPhase::ContentPending { .. }
                | UploadPhase::CompletionPending { .. }
        )
    }

    pub fn upload_id(&self) -> Option<&str> {
        match self {
            UploadPhase::SessionActive { upload_id }
            | UploadPhase::ContentPending { upload_id }
            | UploadPhase::CompletionPending { upload_id }
            | UploadPhase::Completed { upload_id, .. } => Some(upload_id),
            _ => None,
        }
    }
}

impl fmt::Display for UploadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadPhase::FilesSelected { files, total_bytes } => {
                write!(f, "{} file(s) selected, {} bytes", files, total_bytes)
            }
            UploadPhase::SessionActive { upload_id } => write!(f, "session {} open", upload_id),
            UploadPhase::ContentPending { upload_id } => write!(f, "uploading content to {}", upload_id),
            UploadPhase::CompletionPending { upload_id } => write!(f, "completing {}", upload_id),
            UploadPhase::Completed { upload_id, job_id: None } => {
                write!(f, "files uploaded successfully, upload id {}", upload_id)
            }
            UploadPhase::Completed { upload_id, job_id: Some(job_id) } => {
                write!(f, "upload {} completed, job id {}", upload_id, job_id)
            }
            UploadPhase::Failed { message } => write!(f, "failed: {}", message),
            other => f.write_str(other.name()),
        }
    }
}

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Cannot {action} while {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: &'static str,
    },

    #[error("Please select at least one file")]
    NoFilesSelected,

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

// ============================================================================
// Workflow
// ============================================================================

/// One upload from file selection to completion.
///
/// Actions take `&mut self`, so a second action cannot start while a call
/// is in flight. The session id lives only here; dropping the workflow
/// abandons the session.
pub struct UploadWorkflow {
    client: Arc<PlatformClient>,
    files: Vec<FilePayload>,
    phase: watch::Sender<UploadPhase>,
}

impl UploadWorkflow {
    /// Uploads run for the subscription configured on `client`, the same one
    /// its content and completion calls authenticate with.
    pub fn new(client: Arc<PlatformClient>) -> Self {
        let (phase, _) = watch::channel(UploadPhase::Idle);
        Self {
            client,
            files: Vec::new(),
            phase,
        }
    }

    pub fn phase(&self) -> UploadPhase {
        self.phase.borrow().clone()
    }

    /// Receiver that sees every subsequent phase change
    pub fn subscribe(&self) -> watch::Receiver<UploadPhase> {
        self.phase.subscribe()
    }

    pub fn selected_files(&self) -> &[FilePayload] {
        &self.files
    }

    /// Descriptors for the current selection, with default type and source
    pub fn descriptors(&self) -> Vec<FileDescriptor> {
        self.files.iter().map(FilePayload::descriptor).collect()
    }

    /// Choose the files to upload. Allowed before a session exists or after
    /// a failure; an open session is never replaced.
    pub fn select_files(&mut self, files: Vec<FilePayload>) -> Result<(), WorkflowError> {
        let current = self.phase();
        if !matches!(
            current,
            UploadPhase::Idle | UploadPhase::FilesSelected { .. } | UploadPhase::Failed { .. }
        ) {
            return Err(Self::invalid("select files", &current));
        }
        if files.is_empty() {
            return Err(WorkflowError::NoFilesSelected);
        }

        let total_bytes = files.iter().map(FilePayload::size).sum();
        let count = files.len();
        self.files = files;
        self.set_phase(UploadPhase::FilesSelected {
            files: count,
            total_bytes,
        });
        Ok(())
    }

    /// Open an upload session for the selected files.
    ///
    /// Dropping the returned future before it resolves puts the workflow back
    /// in the phase it started from; this holds for every action.
    pub async fn create_session(&mut self) -> Result<UploadSession, WorkflowError> {
        let current = self.phase();
        if !matches!(current, UploadPhase::FilesSelected { .. }) {
            return Err(Self::invalid("create an upload session", &current));
        }

        let client = Arc::clone(&self.client);
        let subscription_id = match client.config().subscription_id() {
            Ok(id) => id,
            Err(e) => return Err(self.fail(e)),
        };
        let descriptors = self.descriptors();
        self.set_phase(UploadPhase::SessionPending);

        let restore = PhaseRestore::new(&self.phase, current);
        let result = client.create_upload_session(subscription_id, &descriptors).await;
        restore.disarm();
        match result {
            Ok(session) => {
                self.set_phase(UploadPhase::SessionActive {
                    upload_id: session.upload_id.clone(),
                });
                Ok(session)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Send the selected files' bytes to the open session
    pub async fn upload_content(&mut self) -> Result<(), WorkflowError> {
        let upload_id = match self.phase() {
            UploadPhase::SessionActive { upload_id } => upload_id,
            other => return Err(Self::invalid("upload file content", &other)),
        };

        self.set_phase(UploadPhase::ContentPending {
            upload_id: upload_id.clone(),
        });

        let restore = PhaseRestore::new(
            &self.phase,
            UploadPhase::SessionActive {
                upload_id: upload_id.clone(),
            },
        );
        let result = self.client.upload_file_content(&upload_id, &self.files).await;
        restore.disarm();
        match result {
            Ok(()) => {
                self.files.clear();
                self.set_phase(UploadPhase::Completed {
                    upload_id,
                    job_id: None,
                });
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Finalize an uploaded session into a processing job
    pub async fn complete(&mut self) -> Result<CompletionJob, WorkflowError> {
        let upload_id = match self.phase() {
            UploadPhase::Completed {
                upload_id,
                job_id: None,
            } => upload_id,
            other => return Err(Self::invalid("complete the upload", &other)),
        };

        self.set_phase(UploadPhase::CompletionPending {
            upload_id: upload_id.clone(),
        });

        let restore = PhaseRestore::new(
            &self.phase,
            UploadPhase::Completed {
                upload_id: upload_id.clone(),
                job_id: None,
            },
        );
        let result = self.client.complete_upload(&upload_id).await;
        restore.disarm();
        match result {
            Ok(job) => {
                self.set_phase(UploadPhase::Completed {
                    upload_id,
                    job_id: Some(job.job_id.clone()),
                });
                Ok(job)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Drop the selection and any session id and start over
    pub fn reset(&mut self) {
        self.files.clear();
        self.set_phase(UploadPhase::Idle);
    }

    fn set_phase(&self, next: UploadPhase) {
        let previous = self.phase.send_replace(next);
        debug!(from = previous.name(), to = self.phase.borrow().name(), "Upload phase changed");
    }

    fn fail(&mut self, err: PlatformError) -> WorkflowError {
        let message = err.to_string();
        warn!(error = %message, phase = self.phase().name(), "Upload step failed");
        self.files.clear();
        self.set_phase(UploadPhase::Failed { message });
        WorkflowError::Platform(err)
    }

    fn invalid(action: &'static str, phase: &UploadPhase) -> WorkflowError {
        info!(action, phase = phase.name(), "Rejected workflow action");
        WorkflowError::InvalidTransition {
            action,
            phase: phase.name(),
        }
    }
}

/// Puts the phase back if an in-flight action is cancelled
struct PhaseRestore<'a> {
    phase: &'a watch::Sender<UploadPhase>,
    previous: Option<UploadPhase>,
}

impl<'a> PhaseRestore<'a> {
    fn new(phase: &'a watch::Sender<UploadPhase>, previous: UploadPhase) -> Self {
        Self {
            phase,
            previous: Some(previous),
        }
    }

    fn disarm(mut self) {
        self.previous = None;
    }
}

impl Drop for PhaseRestore<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            warn!(to = previous.name(), "Upload action cancelled; restoring phase");
            self.phase.send_replace(previous);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
