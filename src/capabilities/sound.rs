use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

use crate::event::Event;

/// Fire-and-forget sound cues. Playback failure is invisible to the core;
/// the flush must not depend on the speaker working.
#[derive(Clone)]
pub struct Sound<E> {
    context: CapabilityContext<SoundOperation, E>,
}

impl<Ev> Capability<Ev> for Sound<Ev> {
    type Operation = SoundOperation;
    type MappedSelf<MappedEv> = Sound<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Sound::new(self.context.map_event(f))
    }
}

impl<E> Sound<E>
where
    E: Send + 'static,
{
    pub fn new(context: CapabilityContext<SoundOperation, E>) -> Self {
        Self { context }
    }

    pub fn play(&self, cue: SoundCue) {
        let context = self.context.clone();
        self.context.spawn(async move {
            context.notify_shell(SoundOperation::Play { cue }).await;
        });
    }
}

pub type SoundCapability = Sound<Event>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SoundCue {
    Flush,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum SoundOperation {
    Play { cue: SoundCue },
}

impl Operation for SoundOperation {
    type Output = ();
}
