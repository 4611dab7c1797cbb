use serde::{Deserialize, Serialize};

use crate::capabilities::{FilePickerResult, RecorderResult, StorageResult};
use crate::image_transform::{CropRegion, Rotation};

/// Everything that can happen to the app, user gesture or shell response.
/// Capability results are boxed to keep the enum itself small.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Event {
    // lifecycle
    AppStarted,
    SessionLoaded(Box<StorageResult>),
    SessionWritten(Box<StorageResult>),

    // text
    TextChanged { text: String },

    // image
    ImagePickRequested,
    ImagePicked(Box<FilePickerResult>),
    CropConfirmed {
        region: Option<CropRegion>,
        rotation: Rotation,
    },
    CropCancelled,
    ImageRemoved,

    // audio
    RecordStartRequested,
    RecorderStarted(Box<RecorderResult>),
    RecordStopRequested,
    RecorderStopped(Box<RecorderResult>),
    AudioRemoved,

    // flush lifecycle
    ConfirmRequested,
    EditResumed,
    FlushConfirmed,
    FlushFinished,
    StartOverRequested,

    // ui
    ToastDismissed,
}

impl Event {
    /// Stable name for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Event::AppStarted => "app_started",
            Event::SessionLoaded(_) => "session_loaded",
            Event::SessionWritten(_) => "session_written",
            Event::TextChanged { .. } => "text_changed",
            Event::ImagePickRequested => "image_pick_requested",
            Event::ImagePicked(_) => "image_picked",
            Event::CropConfirmed { .. } => "crop_confirmed",
            Event::CropCancelled => "crop_cancelled",
            Event::ImageRemoved => "image_removed",
            Event::RecordStartRequested => "record_start_requested",
            Event::RecorderStarted(_) => "recorder_started",
            Event::RecordStopRequested => "record_stop_requested",
            Event::RecorderStopped(_) => "recorder_stopped",
            Event::AudioRemoved => "audio_removed",
            Event::ConfirmRequested => "confirm_requested",
            Event::EditResumed => "edit_resumed",
            Event::FlushConfirmed => "flush_confirmed",
            Event::FlushFinished => "flush_finished",
            Event::StartOverRequested => "start_over_requested",
            Event::ToastDismissed => "toast_dismissed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_size_is_reasonable() {
        // Capability payloads are boxed, so the enum stays cheap to clone.
        assert!(
            std::mem::size_of::<Event>() <= 128,
            "Event grew to {} bytes",
            std::mem::size_of::<Event>()
        );
    }

    #[test]
    fn event_names_are_stable() {
        let denied: RecorderResult = Err(crate::capabilities::RecorderError::PermissionDenied);
        assert_eq!(Event::RecorderStarted(Box::new(denied)).name(), "recorder_started");
        assert_eq!(Event::FlushConfirmed.name(), "flush_confirmed");
        assert_eq!(Event::TextChanged { text: "x".into() }.name(), "text_changed");
    }
}
