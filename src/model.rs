use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persistence::SessionRecord;
use crate::ToastMessage;

/// Lifecycle of the one venting session.
///
/// `Idle` is the only editable phase; `Confirming` freezes the entry for
/// review; `Flushing` is the irreversible animation window; `Flushed` is
/// terminal until the user starts over.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Confirming,
    Flushing,
    Flushed,
}

impl Phase {
    /// The full transition table. Anything not listed here is rejected,
    /// never silently ignored.
    #[must_use]
    pub fn can_transition(self, to: Phase) -> bool {
        matches!(
            (self, to),
            (Phase::Idle, Phase::Confirming)
                | (Phase::Confirming, Phase::Idle)
                | (Phase::Confirming, Phase::Flushing)
                | (Phase::Flushing, Phase::Flushed)
                | (Phase::Flushed, Phase::Idle)
        )
    }

    #[must_use]
    pub fn is_editable(self) -> bool {
        self == Phase::Idle
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Confirming => "confirming",
            Phase::Flushing => "flushing",
            Phase::Flushed => "flushed",
        }
    }
}

/// Microphone recording status, driven by Recorder capability responses.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingStatus {
    #[default]
    Idle,
    Requesting,
    Recording,
    Recorded,
    Denied,
}

#[derive(Debug, Error)]
pub enum MediaPayloadError {
    #[error("not a data URI")]
    MissingPrefix,
    #[error("data URI is not base64-encoded")]
    MissingEncoding,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Self-describing media bytes: mime type plus the encoded payload.
///
/// Persisted form is a `data:<mime>;base64,<payload>` URI.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaPayload {
    pub mime_type: String,
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
}

impl MediaPayload {
    #[must_use]
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    #[must_use]
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, BASE64.encode(&self.data))
    }

    pub fn from_data_uri(uri: &str) -> Result<Self, MediaPayloadError> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or(MediaPayloadError::MissingPrefix)?;
        let (mime_type, payload) = rest
            .split_once(";base64,")
            .ok_or(MediaPayloadError::MissingEncoding)?;
        let data = BASE64.decode(payload)?;
        Ok(Self::new(mime_type, data))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// Redact debug output because this can contain sensitive user-provided data.
impl fmt::Debug for MediaPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaPayload")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// A raw image awaiting crop confirmation. Transient: never persisted,
/// discarded when the crop dialog is cancelled.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingCrop {
    pub raw: MediaPayload,
}

/// The sole working entity: one ephemeral anger entry.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AngerEntry {
    pub text: String,
    pub image: Option<MediaPayload>,
    pub audio: Option<MediaPayload>,
    pub last_modified_ms: u64,
}

impl AngerEntry {
    /// An entry has content iff at least one of text (after trimming),
    /// image, audio is non-empty.
    #[must_use]
    pub fn is_content_present(&self) -> bool {
        !self.text.trim().is_empty() || self.image.is_some() || self.audio.is_some()
    }

    pub fn touch(&mut self, now_ms: u64) {
        self.last_modified_ms = now_ms;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Model {
    pub phase: Phase,
    pub entry: AngerEntry,
    pub pending_crop: Option<PendingCrop>,
    pub recording: RecordingStatus,

    /// In-memory mirror of the persisted record; source of the partial-update
    /// merge on every save.
    pub stored: Option<SessionRecord>,
    /// True once the initial storage read has come back.
    pub hydrated: bool,

    pub active_toast: Option<ToastMessage>,
}
