mod file_picker;
mod recorder;
mod sound;
mod storage;
mod timer;

pub use self::file_picker::{
    sniff_mime, FilePicker, FilePickerCapability, FilePickerError, FilePickerOperation,
    FilePickerOutput, FilePickerResult, SelectedFile,
};
pub use self::recorder::{
    RecordedAudio, Recorder, RecorderCapability, RecorderError, RecorderOperation, RecorderOutput,
    RecorderResult, MAX_AUDIO_SIZE_BYTES,
};
pub use self::sound::{Sound, SoundCapability, SoundCue, SoundOperation};
pub use self::storage::{
    Storage, StorageCapability, StorageError, StorageErrorCode, StorageOperation, StorageOutput,
    StorageResult, MAX_RECORD_BYTES,
};
pub use self::timer::{Timer, TimerCapability, TimerOperation, TimerOutput};

// Crux's built-in Render capability covers view refresh as-is.
pub use crux_core::render::Render;

use crate::app::App;
use crate::event::Event;

pub type AppRender = Render<Event>;
pub type AppStorage = Storage<Event>;
pub type AppFilePicker = FilePicker<Event>;
pub type AppRecorder = Recorder<Event>;
pub type AppSound = Sound<Event>;
pub type AppTimer = Timer<Event>;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub render: Render<Event>,
    pub storage: Storage<Event>,
    pub file_picker: FilePicker<Event>,
    pub recorder: Recorder<Event>,
    pub sound: Sound<Event>,
    pub timer: Timer<Event>,
}
