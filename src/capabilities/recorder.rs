use std::fmt;

use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::Event;

pub const MAX_AUDIO_SIZE_BYTES: usize = 10 * 1024 * 1024;

/// Two-phase microphone recording. `Start` acquires the stream (surfacing a
/// permission prompt where the platform requires one) and resolves once
/// recording is live; `Stop` resolves with the captured audio. The shell is
/// responsible for releasing the stream on stop and on every error path.
#[derive(Clone)]
pub struct Recorder<E> {
    context: CapabilityContext<RecorderOperation, E>,
}

impl<Ev> Capability<Ev> for Recorder<Ev> {
    type Operation = RecorderOperation;
    type MappedSelf<MappedEv> = Recorder<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Recorder::new(self.context.map_event(f))
    }
}

impl<E> Recorder<E>
where
    E: Send + 'static,
{
    pub fn new(context: CapabilityContext<RecorderOperation, E>) -> Self {
        Self { context }
    }

    pub fn start<F>(&self, make_event: F)
    where
        F: FnOnce(RecorderResult) -> E + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let response = context.request_from_shell(RecorderOperation::Start).await;
            context.update_app(make_event(response));
        });
    }

    pub fn stop<F>(&self, make_event: F)
    where
        F: FnOnce(RecorderResult) -> E + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let response = context.request_from_shell(RecorderOperation::Stop).await;
            context.update_app(make_event(response));
        });
    }
}

pub type RecorderCapability = Recorder<Event>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum RecorderOperation {
    Start,
    Stop,
}

impl Operation for RecorderOperation {
    type Output = RecorderResult;
}

pub type RecorderResult = Result<RecorderOutput, RecorderError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum RecorderOutput {
    /// The stream is live and capturing.
    Started,
    Recorded(RecordedAudio),
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordedAudio {
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
    pub mime_type: String,
    pub duration_ms: u64,
}

impl RecordedAudio {
    pub fn validate(&self) -> Result<(), RecorderError> {
        if self.data.is_empty() {
            return Err(RecorderError::Empty);
        }
        if self.data.len() > MAX_AUDIO_SIZE_BYTES {
            return Err(RecorderError::TooLarge {
                size: self.data.len(),
                max: MAX_AUDIO_SIZE_BYTES,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for RecordedAudio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordedAudio")
            .field("mime_type", &self.mime_type)
            .field("duration_ms", &self.duration_ms)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
pub enum RecorderError {
    #[error("microphone permission denied")]
    PermissionDenied,
    #[error("no microphone available: {reason}")]
    Unavailable { reason: String },
    #[error("audio capture failed: {reason}")]
    CaptureFailed { reason: String },
    #[error("no recording is in progress")]
    NotRecording,
    #[error("recording is {size} bytes, larger than the {max} byte limit")]
    TooLarge { size: usize, max: usize },
    #[error("recording contains no audio")]
    Empty,
}

impl RecorderError {
    /// Permission denials keep the record button usable; the user may grant
    /// access on a later attempt.
    #[must_use]
    pub fn is_permission_error(&self) -> bool {
        matches!(self, RecorderError::PermissionDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_audio_validates_size_bounds() {
        let audio = RecordedAudio {
            data: vec![1; 128],
            mime_type: "audio/webm".into(),
            duration_ms: 1_500,
        };
        assert!(audio.validate().is_ok());

        let empty = RecordedAudio {
            data: vec![],
            mime_type: "audio/webm".into(),
            duration_ms: 0,
        };
        assert!(matches!(empty.validate(), Err(RecorderError::Empty)));

        let huge = RecordedAudio {
            data: vec![0; MAX_AUDIO_SIZE_BYTES + 1],
            mime_type: "audio/webm".into(),
            duration_ms: 60_000,
        };
        assert!(matches!(huge.validate(), Err(RecorderError::TooLarge { .. })));
    }

    #[test]
    fn only_permission_denial_is_a_permission_error() {
        assert!(RecorderError::PermissionDenied.is_permission_error());
        assert!(!RecorderError::NotRecording.is_permission_error());
        assert!(!RecorderError::Unavailable {
            reason: "no device".into()
        }
        .is_permission_error());
    }

    #[test]
    fn debug_output_hides_audio_bytes() {
        let audio = RecordedAudio {
            data: vec![42; 64],
            mime_type: "audio/webm".into(),
            duration_ms: 2_000,
        };
        let debug = format!("{audio:?}");
        assert!(debug.contains("audio/webm"));
        assert!(!debug.contains("[42"), "raw bytes leaked: {debug}");
    }
}
