use std::fmt;

use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::Event;
use crate::{MAX_FILE_SIZE_BYTES, SUPPORTED_IMAGE_FORMATS};

/// Shell-side image selection (native picker or `<input type="file">`).
/// The shell returns the file bytes; all validation happens in the core.
#[derive(Clone)]
pub struct FilePicker<E> {
    context: CapabilityContext<FilePickerOperation, E>,
}

impl<Ev> Capability<Ev> for FilePicker<Ev> {
    type Operation = FilePickerOperation;
    type MappedSelf<MappedEv> = FilePicker<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        FilePicker::new(self.context.map_event(f))
    }
}

impl<E> FilePicker<E>
where
    E: Send + 'static,
{
    pub fn new(context: CapabilityContext<FilePickerOperation, E>) -> Self {
        Self { context }
    }

    pub fn pick<F>(&self, make_event: F)
    where
        F: FnOnce(FilePickerResult) -> E + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let response = context.request_from_shell(FilePickerOperation::Pick).await;
            context.update_app(make_event(response));
        });
    }
}

pub type FilePickerCapability = FilePicker<Event>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum FilePickerOperation {
    Pick,
}

impl Operation for FilePickerOperation {
    type Output = FilePickerResult;
}

pub type FilePickerResult = Result<FilePickerOutput, FilePickerError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum FilePickerOutput {
    Selected(SelectedFile),
    /// The user dismissed the picker. Not an error.
    Cancelled,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectedFile {
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
    pub mime_type: String,
    pub file_name: Option<String>,
}

impl SelectedFile {
    /// Size, mime allowlist, and a magic-byte cross-check where the format
    /// is sniffable. Shell-reported mime types are advisory only.
    pub fn validate(&self) -> Result<(), FilePickerError> {
        if self.data.is_empty() {
            return Err(FilePickerError::EmptyFile);
        }
        if self.data.len() > MAX_FILE_SIZE_BYTES {
            return Err(FilePickerError::TooLarge {
                size: self.data.len(),
                max: MAX_FILE_SIZE_BYTES,
            });
        }
        if !SUPPORTED_IMAGE_FORMATS.contains(&self.mime_type.as_str()) {
            return Err(FilePickerError::UnsupportedType {
                mime_type: self.mime_type.clone(),
            });
        }
        if let Some(detected) = sniff_mime(&self.data) {
            if detected != self.mime_type {
                return Err(FilePickerError::TypeMismatch {
                    declared: self.mime_type.clone(),
                    detected: detected.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedFile")
            .field("mime_type", &self.mime_type)
            .field("file_name", &self.file_name)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Detect the real format from leading bytes. Returns `None` for data we
/// cannot sniff, in which case the declared mime type stands.
#[must_use]
pub fn sniff_mime(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }
    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    if data.starts_with(b"GIF8") {
        return Some("image/gif");
    }
    if let Ok(text) = std::str::from_utf8(&data[..data.len().min(256)]) {
        let trimmed = text.trim_start();
        if trimmed.starts_with("<svg") || trimmed.starts_with("<?xml") {
            return Some("image/svg+xml");
        }
    }
    None
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
pub enum FilePickerError {
    #[error("selected file is empty")]
    EmptyFile,
    #[error("file is {size} bytes, larger than the {max} byte limit")]
    TooLarge { size: usize, max: usize },
    #[error("unsupported file type: {mime_type}")]
    UnsupportedType { mime_type: String },
    #[error("file content is {detected}, not the declared {declared}")]
    TypeMismatch { declared: String, detected: String },
    #[error("failed to read the selected file: {reason}")]
    ReadFailed { reason: String },
}
