//! File descriptors and payloads.
//!
//! Descriptors are what the platform sees when a session is opened; payloads
//! are what gets transferred afterwards.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Source tag used when the caller does not know where a file came from.
pub const DEFAULT_SOURCE: &str = "not-specified";

/// Minimum accepted length of a file name, in characters.
const MIN_FILE_NAME_CHARS: usize = 5;

/// Exact length of a source identifier (a hyphenated UUID).
const SOURCE_ID_CHARS: usize = 36;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "kebab-case")]
pub enum FileType {
    #[default]
    Invoice,
    CreditNote,
    DebitNote,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum FingerprintAlgorithm {
    #[default]
    #[serde(rename = "NONE")]
    None,
    #[serde(rename = "MD5")]
    Md5,
    #[serde(rename = "SHA-1")]
    Sha1,
    #[serde(rename = "SHA-256")]
    Sha256,
    #[serde(rename = "SHA-512")]
    Sha512,
}

/// Metadata for one file of an upload batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub file_name: String,
    #[cfg_attr(feature = "ts", ts(type = "number"))]
    pub file_size: u64,
    #[serde(default)]
    pub file_type: FileType,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint_algorithm: Option<FingerprintAlgorithm>,
}

fn default_source() -> String {
    DEFAULT_SOURCE.to_string()
}

impl FileDescriptor {
    /// Descriptor with the defaults used for user-selected files:
    /// an invoice from an unspecified source.
    pub fn new(file_name: impl Into<String>, file_size: u64) -> Self {
        Self {
            file_name: file_name.into(),
            file_size,
            file_type: FileType::Invoice,
            source: default_source(),
            source_id: None,
            fingerprint: None,
            fingerprint_algorithm: None,
        }
    }

    pub fn with_file_type(mut self, file_type: FileType) -> Self {
        self.file_type = file_type;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>, source_id: Option<String>) -> Self {
        self.source = source.into();
        self.source_id = source_id;
        self
    }

    pub fn with_fingerprint(mut self, algorithm: FingerprintAlgorithm, fingerprint: impl Into<String>) -> Self {
        self.fingerprint_algorithm = Some(algorithm);
        self.fingerprint = Some(fingerprint.into());
        self
    }
}

/// A descriptor field that failed validation. `index` is the position of the
/// file in its batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("file #{index}: {field} {reason}")]
pub struct ValidationError {
    pub index: usize,
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn new(index: usize, field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            index,
            field,
            reason: reason.into(),
        }
    }
}

/// Check a single descriptor against the platform's acceptance rules.
///
/// `file_size` is unsigned, so the non-negative rule holds by construction.
pub fn validate_file(index: usize, file: &FileDescriptor) -> Result<(), ValidationError> {
    if file.file_name.is_empty() {
        return Err(ValidationError::new(index, "fileName", "must not be empty"));
    }

    let name_chars = file.file_name.chars().count();
    if name_chars < MIN_FILE_NAME_CHARS {
        return Err(ValidationError::new(
            index,
            "fileName",
            format!(
                "must be at least {} characters (got {:?}, {} characters)",
                MIN_FILE_NAME_CHARS, file.file_name, name_chars
            ),
        ));
    }

    if let Some(ref source_id) = file.source_id {
        let id_chars = source_id.chars().count();
        if id_chars != SOURCE_ID_CHARS {
            return Err(ValidationError::new(
                index,
                "sourceId",
                format!("must be exactly {} characters (got {})", SOURCE_ID_CHARS, id_chars),
            ));
        }
    }

    Ok(())
}

/// Validate a whole batch; the first offending file rejects all of it.
pub fn validate_files(files: &[FileDescriptor]) -> Result<(), ValidationError> {
    files
        .iter()
        .enumerate()
        .try_for_each(|(index, file)| validate_file(index, file))
}

/// Raw content of one selected file.
#[derive(Clone, PartialEq, Eq)]
pub struct FilePayload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl FilePayload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Read a local file; the payload is named after the path's final component.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("Not a file path: {}", path.display()),
                )
            })?;
        let bytes = tokio::fs::read(path).await?;
        Ok(Self { file_name, bytes })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Descriptor built from the payload's name and size with the default
    /// file type and source.
    pub fn descriptor(&self) -> FileDescriptor {
        FileDescriptor::new(self.file_name.clone(), self.size())
    }
}

impl std::fmt::Debug for FilePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilePayload")
            .field("file_name", &self.file_name)
            .field("size", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UUID: &str = "0e65066c-ab20-4da0-b3bf-79dfd0668049";

    #[test]
    fn test_new_descriptor_defaults() {
        let file = FileDescriptor::new("inv1.pdf", 1024);
        assert_eq!(file.file_type, FileType::Invoice);
        assert_eq!(file.source, "not-specified");
        assert!(file.source_id.is_none());
        assert!(validate_file(0, &file).is_ok());
    }

    #[test]
    fn test_file_name_rules() {
        let empty = validate_file(0, &FileDescriptor::new("", 1)).unwrap_err();
        assert_eq!(empty.field, "fileName");
        assert_eq!(empty.reason, "must not be empty");

        let short = validate_file(3, &FileDescriptor::new("a.pd", 1)).unwrap_err();
        assert_eq!(short.field, "fileName");
        assert_eq!(short.index, 3);

        assert!(validate_file(0, &FileDescriptor::new("a.pdf", 1)).is_ok());
        // Counted in characters, not bytes
        assert!(validate_file(0, &FileDescriptor::new("éééé", 1)).is_err());
        assert!(validate_file(0, &FileDescriptor::new("ééééé", 1)).is_ok());
    }

    #[test]
    fn test_source_id_must_be_36_characters() {
        for len in [0usize, 1, 35, 37, 72] {
            let file = FileDescriptor::new("inv1.pdf", 10).with_source("erp", Some("x".repeat(len)));
            let err = validate_file(0, &file).unwrap_err();
            assert_eq!(err.field, "sourceId", "length {}", len);
        }

        let ok = FileDescriptor::new("inv1.pdf", 10).with_source("erp", Some(UUID.to_string()));
        assert!(validate_file(0, &ok).is_ok());
    }

    #[test]
    fn test_source_id_rule_ignores_other_fields() {
        let file = FileDescriptor::new("a-perfectly-fine-name.pdf", 0)
            .with_file_type(FileType::CreditNote)
            .with_fingerprint(FingerprintAlgorithm::Sha256, "abc")
            .with_source("erp", Some("too-short".to_string()));
        assert_eq!(validate_file(0, &file).unwrap_err().field, "sourceId");
    }

    #[test]
    fn test_validate_files_rejects_whole_batch() {
        let batch = vec![
            FileDescriptor::new("inv1.pdf", 1),
            FileDescriptor::new("x", 1),
            FileDescriptor::new("inv3.pdf", 1),
        ];
        let err = validate_files(&batch).unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.to_string(), "file #1: fileName must be at least 5 characters (got \"x\", 1 characters)");
    }

    #[test]
    fn test_descriptor_wire_names() {
        let file = FileDescriptor::new("inv1.pdf", 1024)
            .with_file_type(FileType::DebitNote)
            .with_fingerprint(FingerprintAlgorithm::Sha1, "deadbeef");
        let value = serde_json::to_value(&file).unwrap();
        assert_eq!(value["fileName"], "inv1.pdf");
        assert_eq!(value["fileSize"], 1024);
        assert_eq!(value["fileType"], "debit-note");
        assert_eq!(value["fingerprintAlgorithm"], "SHA-1");
    }

    #[test]
    fn test_descriptor_rejects_negative_size() {
        let json = r#"{"fileName":"inv1.pdf","fileSize":-1}"#;
        assert!(serde_json::from_str::<FileDescriptor>(json).is_err());

        let json = r#"{"fileName":"inv1.pdf","fileSize":5}"#;
        let file: FileDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(file, FileDescriptor::new("inv1.pdf", 5));
    }

    #[test]
    fn test_payload_descriptor() {
        let payload = FilePayload::new("facture.xml", vec![0u8; 42]);
        let descriptor = payload.descriptor();
        assert_eq!(descriptor.file_name, "facture.xml");
        assert_eq!(descriptor.file_size, 42);
        assert!(!format!("{:?}", payload).contains("[0"));
    }

    #[tokio::test]
    async fn test_payload_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoice-2024.pdf");
        std::fs::write(&path, b"%PDF-1.7").unwrap();

        let payload = FilePayload::from_path(&path).await.unwrap();
        assert_eq!(payload.file_name, "invoice-2024.pdf");
        assert_eq!(payload.bytes, b"%PDF-1.7");

        assert!(FilePayload::from_path(dir.path().join("missing.pdf")).await.is_err());
    }
}
