//! Shared core of the Anger Away venting app.
//!
//! The core owns the single ephemeral anger entry, its lifecycle
//! (idle, confirming, flushing, flushed), local persistence with a 30-minute
//! expiry, and the image crop pipeline. Platform shells render the view model
//! and resolve capability operations (file picker, microphone, storage,
//! sound, timer).

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod capabilities;
pub mod content;
pub mod event;
pub mod image_transform;
pub mod model;
pub mod persistence;

use serde::{Deserialize, Serialize};

pub use crate::app::App;
pub use crate::capabilities::{Capabilities, Effect};
pub use crate::event::Event;
pub use crate::model::{
    AngerEntry, MediaPayload, Model, PendingCrop, Phase, RecordingStatus,
};

pub const MAX_FILE_SIZE_BYTES: usize = 10 * 1024 * 1024;
pub const SUPPORTED_IMAGE_FORMATS: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
    "image/svg+xml",
];
pub const EXPIRATION_MINUTES: u64 = 30;
pub const FLUSH_ANIMATION_DURATION_MS: u64 = 5_000;
pub const SESSION_STORAGE_KEY: &str = "anger-away:session:v1";
pub const MAX_PERSISTED_MEDIA_BYTES: usize = 5 * 1024 * 1024;
pub const TOAST_DURATION_MS: u64 = 4_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    MicPermissionDenied,
    MicCapture,
    ImageDecode,
    ImageTooLarge,
    ImageFormatUnsupported,
    ImageProcessing,
    Storage,
    Serialization,
    InvalidState,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::MicPermissionDenied => "mic_permission_denied",
            ErrorKind::MicCapture => "mic_capture",
            ErrorKind::ImageDecode => "image_decode",
            ErrorKind::ImageTooLarge => "image_too_large",
            ErrorKind::ImageFormatUnsupported => "image_format_unsupported",
            ErrorKind::ImageProcessing => "image_processing",
            ErrorKind::Storage => "storage",
            ErrorKind::Serialization => "serialization",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::Internal => "internal",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            ErrorKind::MicCapture | ErrorKind::Storage | ErrorKind::Internal => {
                ErrorSeverity::Transient
            }
            ErrorKind::Validation
            | ErrorKind::MicPermissionDenied
            | ErrorKind::ImageDecode
            | ErrorKind::ImageTooLarge
            | ErrorKind::ImageFormatUnsupported
            | ErrorKind::ImageProcessing
            | ErrorKind::Serialization
            | ErrorKind::InvalidState => ErrorSeverity::Permanent,
        }
    }

    /// Whether retrying the same action can succeed. Permission denials are
    /// retryable: the user may grant access on the next attempt.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::MicPermissionDenied
                | ErrorKind::MicCapture
                | ErrorKind::Storage
                | ErrorKind::Internal
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Validation => {
                "That doesn't look right. Please check your input and try again.".into()
            }
            ErrorKind::MicPermissionDenied => {
                "Microphone access was denied. You can enable it in your browser or system settings."
                    .into()
            }
            ErrorKind::MicCapture => "Recording failed. Please try again.".into(),
            ErrorKind::ImageDecode => "We couldn't read that image. Try a different file.".into(),
            ErrorKind::ImageTooLarge => {
                "That image is too large. Please choose a file under 10 MB.".into()
            }
            ErrorKind::ImageFormatUnsupported => {
                "That file type isn't supported. Use a JPEG, PNG, WebP, GIF, or SVG.".into()
            }
            ErrorKind::ImageProcessing => {
                "Something went wrong while preparing your image.".into()
            }
            ErrorKind::Storage => "We couldn't save your session on this device.".into(),
            ErrorKind::Serialization => "Something went wrong while saving.".into(),
            ErrorKind::InvalidState => "That action isn't available right now.".into(),
            ErrorKind::Internal => "Something went wrong. Please try again.".into(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)
    }
}

impl std::error::Error for AppError {}

impl From<&capabilities::FilePickerError> for AppError {
    fn from(e: &capabilities::FilePickerError) -> Self {
        use capabilities::FilePickerError;
        let kind = match e {
            FilePickerError::TooLarge { .. } => ErrorKind::ImageTooLarge,
            FilePickerError::UnsupportedType { .. } | FilePickerError::TypeMismatch { .. } => {
                ErrorKind::ImageFormatUnsupported
            }
            FilePickerError::EmptyFile => ErrorKind::Validation,
            FilePickerError::ReadFailed { .. } => ErrorKind::Internal,
        };
        AppError::new(kind, e.to_string())
    }
}

impl From<&capabilities::RecorderError> for AppError {
    fn from(e: &capabilities::RecorderError) -> Self {
        use capabilities::RecorderError;
        let kind = match e {
            RecorderError::PermissionDenied => ErrorKind::MicPermissionDenied,
            RecorderError::TooLarge { .. } | RecorderError::Empty => ErrorKind::Validation,
            RecorderError::Unavailable { .. }
            | RecorderError::CaptureFailed { .. }
            | RecorderError::NotRecording => ErrorKind::MicCapture,
        };
        AppError::new(kind, e.to_string())
    }
}

impl From<&capabilities::StorageError> for AppError {
    fn from(e: &capabilities::StorageError) -> Self {
        AppError::new(ErrorKind::Storage, e.to_string())
    }
}

impl From<&image_transform::TransformError> for AppError {
    fn from(e: &image_transform::TransformError) -> Self {
        use image_transform::TransformError;
        let kind = match e {
            TransformError::Decode(_) => ErrorKind::ImageDecode,
            TransformError::UnsupportedFormat => ErrorKind::ImageFormatUnsupported,
            TransformError::InputTooLarge { .. } => ErrorKind::ImageTooLarge,
            TransformError::EmptyInput
            | TransformError::InvalidRegion
            | TransformError::ZeroCrop => ErrorKind::Validation,
            TransformError::Encode { .. } => ErrorKind::ImageProcessing,
        };
        AppError::new(kind, e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToastMessage {
    pub message: String,
    pub kind: ToastKind,
    pub duration_ms: u64,
}

impl From<&AppError> for ToastMessage {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            kind: ToastKind::Error,
            duration_ms: TOAST_DURATION_MS,
        }
    }
}

/// Serializable projection of the model for the shell. Media previews are
/// data URIs the shell can hand straight to an `<img>`/player element.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewState {
    Editing {
        text: String,
        image_preview: Option<String>,
        recording: RecordingStatus,
        can_flush: bool,
        /// Raw image awaiting crop confirmation, when the dialog is open.
        cropping: Option<String>,
    },
    Confirming {
        text: String,
        image_preview: Option<String>,
        has_audio: bool,
    },
    /// The entry stays visible, frozen, for the duration of the animation.
    Flushing {
        text: String,
        image_preview: Option<String>,
        has_audio: bool,
        duration_ms: u64,
    },
    Flushed,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ViewModel {
    pub state: ViewState,
    pub toast: Option<ToastMessage>,
}

/// Wall-clock milliseconds. Only used to stamp mutations; everything that
/// compares times takes `now_ms` as a parameter.
pub(crate) fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

pub mod app {
    use tracing::{debug, warn};

    use super::{
        now_ms, AppError, ErrorKind, ToastMessage, ViewModel, ViewState,
        FLUSH_ANIMATION_DURATION_MS, SESSION_STORAGE_KEY,
    };
    use crate::capabilities::{
        Capabilities, FilePickerOutput, RecorderOutput, SoundCue, StorageOutput,
    };
    use crate::event::Event;
    use crate::image_transform;
    use crate::model::{MediaPayload, Model, PendingCrop, Phase, RecordingStatus};
    use crate::persistence::{SessionPatch, SessionRecord};

    #[derive(Default)]
    pub struct App;

    impl App {
        fn toast_error(model: &mut Model, error: &AppError) {
            warn!(code = error.code(), message = %error.message, "surfacing error");
            model.active_toast = Some(ToastMessage::from(error));
        }

        /// Reject a user action that is not legal in the current phase.
        /// The model is left untouched apart from the toast.
        fn reject_invalid(model: &mut Model, caps: &Capabilities, action: &str) {
            let error = AppError::new(
                ErrorKind::InvalidState,
                format!("{action} is not allowed while {}", model.phase.name()),
            );
            Self::toast_error(model, &error);
            caps.render.render();
        }

        /// Merge a patch into the stored record and write it out. Failures
        /// degrade to the in-memory session; they never block the user.
        fn persist(model: &mut Model, caps: &Capabilities, patch: SessionPatch) {
            let record = SessionRecord::merge(model.stored.clone(), patch, now_ms());
            match record.to_bytes() {
                Ok(bytes) => {
                    model.stored = Some(record);
                    caps.storage.write(SESSION_STORAGE_KEY, bytes, |result| {
                        Event::SessionWritten(Box::new(result))
                    });
                }
                Err(e) => {
                    warn!(error = %e, "session record serialization failed; skipping write");
                }
            }
        }

        /// Rebuild the in-memory entry from a stored record. Malformed media
        /// URIs are dropped with a log line; the text always survives.
        fn hydrate_entry(model: &mut Model, record: &SessionRecord) {
            model.entry.text = record.text.clone();
            model.entry.image = record.image.as_deref().and_then(|uri| {
                MediaPayload::from_data_uri(uri)
                    .map_err(|e| warn!(error = %e, "stored image is unreadable; dropping"))
                    .ok()
            });
            model.entry.audio = record.audio.as_deref().and_then(|uri| {
                MediaPayload::from_data_uri(uri)
                    .map_err(|e| warn!(error = %e, "stored audio is unreadable; dropping"))
                    .ok()
            });
            if model.entry.audio.is_some() {
                model.recording = RecordingStatus::Recorded;
            }
            model.entry.last_modified_ms = record.timestamp;
        }

        fn handle_session_loaded(
            model: &mut Model,
            caps: &Capabilities,
            result: crate::capabilities::StorageResult,
        ) {
            model.hydrated = true;
            match result {
                Ok(StorageOutput::Value(Some(bytes))) => match SessionRecord::from_bytes(&bytes) {
                    Ok(record) => {
                        if record.is_expired(now_ms()) {
                            debug!("stored session expired; deleting");
                            caps.storage.delete(SESSION_STORAGE_KEY, |result| {
                                Event::SessionWritten(Box::new(result))
                            });
                        } else {
                            Self::hydrate_entry(model, &record);
                            model.stored = Some(record);
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "stored session is corrupt; deleting");
                        caps.storage.delete(SESSION_STORAGE_KEY, |result| {
                            Event::SessionWritten(Box::new(result))
                        });
                    }
                },
                Ok(StorageOutput::Value(None)) => debug!("no stored session"),
                Ok(other) => warn!(?other, "unexpected storage output for read"),
                Err(e) => {
                    // Start with a blank session rather than failing the app.
                    warn!(error = %e, "session read failed");
                }
            }
        }

        fn commit_image(
            model: &mut Model,
            caps: &Capabilities,
            pending: PendingCrop,
            region: Option<image_transform::CropRegion>,
            rotation: image_transform::Rotation,
        ) {
            // "Use full image" commits the original bytes untouched, which
            // also keeps formats we cannot re-encode (SVG) working.
            let transformed = if region.is_none() && rotation.is_identity() {
                Ok(pending.raw)
            } else {
                image_transform::crop(&pending.raw.data, region, rotation)
            };

            match transformed {
                Ok(payload) => {
                    model.entry.image = Some(payload);
                    model.entry.touch(now_ms());
                    let patch = SessionPatch::image(model.entry.image.as_ref());
                    Self::persist(model, caps, patch);
                }
                Err(e) => {
                    // The previously committed image, if any, is retained.
                    Self::toast_error(model, &AppError::from(&e));
                }
            }
        }
    }

    impl crux_core::App for App {
        type Event = Event;
        type Model = Model;
        type ViewModel = ViewModel;
        type Capabilities = Capabilities;

        fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
            debug!(event = event.name(), phase = model.phase.name(), "update");

            match event {
                Event::AppStarted => {
                    caps.storage.read(SESSION_STORAGE_KEY, |result| {
                        Event::SessionLoaded(Box::new(result))
                    });
                    caps.render.render();
                }

                Event::SessionLoaded(result) => {
                    Self::handle_session_loaded(model, caps, *result);
                    caps.render.render();
                }

                Event::SessionWritten(result) => {
                    match *result {
                        Ok(_) => debug!("session write settled"),
                        // Degrade to the in-memory session.
                        Err(e) => warn!(error = %e, "session write failed"),
                    }
                }

                Event::TextChanged { text } => {
                    if !model.phase.is_editable() {
                        Self::reject_invalid(model, caps, "editing text");
                        return;
                    }
                    model.entry.text = text;
                    model.entry.touch(now_ms());
                    let patch = SessionPatch::text(model.entry.text.clone());
                    Self::persist(model, caps, patch);
                    caps.render.render();
                }

                Event::ImagePickRequested => {
                    if !model.phase.is_editable() {
                        Self::reject_invalid(model, caps, "picking an image");
                        return;
                    }
                    caps.file_picker
                        .pick(|result| Event::ImagePicked(Box::new(result)));
                }

                Event::ImagePicked(result) => {
                    if !model.phase.is_editable() {
                        warn!("file pick resolved outside idle; discarding");
                        return;
                    }
                    match *result {
                        Ok(FilePickerOutput::Selected(file)) => match file.validate() {
                            Ok(()) => {
                                model.pending_crop = Some(PendingCrop {
                                    raw: MediaPayload::new(file.mime_type, file.data),
                                });
                            }
                            Err(e) => Self::toast_error(model, &AppError::from(&e)),
                        },
                        Ok(FilePickerOutput::Cancelled) => debug!("file pick cancelled"),
                        Err(e) => Self::toast_error(model, &AppError::from(&e)),
                    }
                    caps.render.render();
                }

                Event::CropConfirmed { region, rotation } => {
                    if !model.phase.is_editable() {
                        Self::reject_invalid(model, caps, "confirming a crop");
                        return;
                    }
                    let Some(pending) = model.pending_crop.take() else {
                        Self::reject_invalid(model, caps, "confirming a crop without an image");
                        return;
                    };
                    Self::commit_image(model, caps, pending, region, rotation);
                    caps.render.render();
                }

                Event::CropCancelled => {
                    if !model.phase.is_editable() {
                        Self::reject_invalid(model, caps, "cancelling a crop");
                        return;
                    }
                    // Raw bytes are dropped here; nothing was persisted.
                    model.pending_crop = None;
                    caps.render.render();
                }

                Event::ImageRemoved => {
                    if !model.phase.is_editable() {
                        Self::reject_invalid(model, caps, "removing the image");
                        return;
                    }
                    if model.entry.image.take().is_some() {
                        model.entry.touch(now_ms());
                        Self::persist(model, caps, SessionPatch::image(None));
                    }
                    caps.render.render();
                }

                Event::RecordStartRequested => {
                    if !model.phase.is_editable() {
                        Self::reject_invalid(model, caps, "recording audio");
                        return;
                    }
                    // At most one recording: starting again discards the old one.
                    if model.entry.audio.take().is_some() {
                        Self::persist(model, caps, SessionPatch::audio(None));
                    }
                    model.recording = RecordingStatus::Requesting;
                    caps.recorder
                        .start(|result| Event::RecorderStarted(Box::new(result)));
                    caps.render.render();
                }

                Event::RecorderStarted(result) => {
                    match *result {
                        Ok(RecorderOutput::Started) => {
                            model.recording = RecordingStatus::Recording;
                        }
                        Ok(other) => {
                            warn!(?other, "unexpected recorder output for start");
                            model.recording = RecordingStatus::Idle;
                        }
                        Err(e) => {
                            model.recording = if e.is_permission_error() {
                                RecordingStatus::Denied
                            } else {
                                RecordingStatus::Idle
                            };
                            Self::toast_error(model, &AppError::from(&e));
                        }
                    }
                    caps.render.render();
                }

                Event::RecordStopRequested => {
                    if model.recording != RecordingStatus::Recording {
                        Self::reject_invalid(model, caps, "stopping a recording");
                        return;
                    }
                    caps.recorder
                        .stop(|result| Event::RecorderStopped(Box::new(result)));
                }

                Event::RecorderStopped(result) => {
                    match *result {
                        Ok(RecorderOutput::Recorded(audio)) => match audio.validate() {
                            Ok(()) => {
                                model.entry.audio =
                                    Some(MediaPayload::new(audio.mime_type, audio.data));
                                model.recording = RecordingStatus::Recorded;
                                model.entry.touch(now_ms());
                                let patch = SessionPatch::audio(model.entry.audio.as_ref());
                                Self::persist(model, caps, patch);
                            }
                            Err(e) => {
                                model.recording = RecordingStatus::Idle;
                                Self::toast_error(model, &AppError::from(&e));
                            }
                        },
                        Ok(other) => {
                            warn!(?other, "unexpected recorder output for stop");
                            model.recording = RecordingStatus::Idle;
                        }
                        Err(e) => {
                            model.recording = RecordingStatus::Idle;
                            Self::toast_error(model, &AppError::from(&e));
                        }
                    }
                    caps.render.render();
                }

                Event::AudioRemoved => {
                    if !model.phase.is_editable() {
                        Self::reject_invalid(model, caps, "removing the recording");
                        return;
                    }
                    if model.entry.audio.take().is_some() {
                        model.recording = RecordingStatus::Idle;
                        model.entry.touch(now_ms());
                        Self::persist(model, caps, SessionPatch::audio(None));
                    }
                    caps.render.render();
                }

                Event::ConfirmRequested => {
                    if !model.phase.can_transition(Phase::Confirming) {
                        Self::reject_invalid(model, caps, "confirming the flush");
                        return;
                    }
                    if !model.entry.is_content_present() {
                        Self::toast_error(
                            model,
                            &AppError::new(
                                ErrorKind::Validation,
                                "cannot confirm an empty entry",
                            ),
                        );
                        caps.render.render();
                        return;
                    }
                    // An open crop dialog is abandoned by moving on.
                    model.pending_crop = None;
                    model.phase = Phase::Confirming;
                    caps.render.render();
                }

                Event::EditResumed => {
                    if !model.phase.can_transition(Phase::Idle)
                        || model.phase != Phase::Confirming
                    {
                        Self::reject_invalid(model, caps, "resuming editing");
                        return;
                    }
                    model.phase = Phase::Idle;
                    caps.render.render();
                }

                Event::FlushConfirmed => {
                    if !model.phase.can_transition(Phase::Flushing) {
                        Self::reject_invalid(model, caps, "flushing");
                        return;
                    }
                    model.phase = Phase::Flushing;
                    caps.sound.play(SoundCue::Flush);
                    caps.timer
                        .start(FLUSH_ANIMATION_DURATION_MS, |_| Event::FlushFinished);
                    caps.render.render();
                }

                Event::FlushFinished => {
                    if model.phase != Phase::Flushing {
                        // A stale timer from an earlier flush; not user error.
                        warn!(phase = model.phase.name(), "ignoring stale flush timer");
                        return;
                    }
                    model.phase = Phase::Flushed;
                    model.entry.clear();
                    model.pending_crop = None;
                    model.recording = RecordingStatus::Idle;
                    model.stored = None;
                    caps.storage.delete(SESSION_STORAGE_KEY, |result| {
                        Event::SessionWritten(Box::new(result))
                    });
                    caps.render.render();
                }

                Event::StartOverRequested => {
                    if !model.phase.can_transition(Phase::Idle) || model.phase != Phase::Flushed {
                        Self::reject_invalid(model, caps, "starting over");
                        return;
                    }
                    model.phase = Phase::Idle;
                    caps.render.render();
                }

                Event::ToastDismissed => {
                    model.active_toast = None;
                    caps.render.render();
                }
            }
        }

        fn view(&self, model: &Model) -> ViewModel {
            let state = match model.phase {
                Phase::Idle => ViewState::Editing {
                    text: model.entry.text.clone(),
                    image_preview: model.entry.image.as_ref().map(MediaPayload::to_data_uri),
                    recording: model.recording,
                    can_flush: model.entry.is_content_present(),
                    cropping: model
                        .pending_crop
                        .as_ref()
                        .map(|p| p.raw.to_data_uri()),
                },
                Phase::Confirming => ViewState::Confirming {
                    text: model.entry.text.clone(),
                    image_preview: model.entry.image.as_ref().map(MediaPayload::to_data_uri),
                    has_audio: model.entry.audio.is_some(),
                },
                Phase::Flushing => ViewState::Flushing {
                    text: model.entry.text.clone(),
                    image_preview: model.entry.image.as_ref().map(MediaPayload::to_data_uri),
                    has_audio: model.entry.audio.is_some(),
                    duration_ms: FLUSH_ANIMATION_DURATION_MS,
                },
                Phase::Flushed => ViewState::Flushed,
            };

            ViewModel {
                state,
                toast: model.active_toast.clone(),
            }
        }
    }

}
