use std::sync::Mutex;

use crate::playback::PlaybackHandle;

struct VoiceInner {
    handle: Option<Box<dyn PlaybackHandle>>,
    level: f32,
    generation: u64,
}

/// An active track's playback handle and the bookkeeping fades rely on.
///
/// Every writer owns a generation. Starting a new fade, or setting the level
/// directly, bumps the generation under the same lock that guards volume
/// writes, so a superseded fade can never write again.
pub(crate) struct Voice {
    inner: Mutex<VoiceInner>,
}

impl Voice {
    pub(crate) fn new(handle: Box<dyn PlaybackHandle>) -> Self {
        Self {
            inner: Mutex::new(VoiceInner {
                handle: Some(handle),
                level: 0.0,
                generation: 0,
            }),
        }
    }

    /// Silence the handle, apply the loop mode and begin playback.
    pub(crate) fn prepare(&self, looping: bool) -> u64 {
        let mut inner = self.inner.lock().unwrap();
        inner.generation += 1;
        inner.level = 0.0;
        if let Some(handle) = inner.handle.as_mut() {
            handle.set_volume(0.0);
            handle.set_loop(looping);
            handle.play();
        }
        inner.generation
    }

    pub(crate) fn level(&self) -> f32 {
        self.inner.lock().unwrap().level
    }

    pub(crate) fn generation(&self) -> u64 {
        self.inner.lock().unwrap().generation
    }

    /// Invalidate any running fade, returning the new generation and the
    /// level the handle is currently at.
    pub(crate) fn supersede(&self) -> (u64, f32) {
        let mut inner = self.inner.lock().unwrap();
        inner.generation += 1;
        (inner.generation, inner.level)
    }

    /// Write `volume` only if `generation` still owns the voice.
    pub(crate) fn write_if_current(&self, generation: u64, volume: f32) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.generation != generation {
            return false;
        }
        inner.level = volume;
        if let Some(handle) = inner.handle.as_mut() {
            handle.set_volume(volume);
        }
        true
    }

    /// Cancel any fade and jump straight to `volume`.
    pub(crate) fn set_level_now(&self, volume: f32) {
        let mut inner = self.inner.lock().unwrap();
        inner.generation += 1;
        inner.level = volume;
        if let Some(handle) = inner.handle.as_mut() {
            handle.set_volume(volume);
        }
    }

    pub(crate) fn set_loop(&self, looping: bool) {
        if let Some(handle) = self.inner.lock().unwrap().handle.as_mut() {
            handle.set_loop(looping);
        }
    }

    /// Stop playback and release the handle. Later calls are no-ops.
    pub(crate) fn finish(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.generation += 1;
        if let Some(mut handle) = inner.handle.take() {
            handle.stop();
            handle.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::{PlaybackBackend, SilentOutput};

    fn voice() -> (Voice, crate::playback::HandleProbe) {
        let output = SilentOutput::new();
        let handle = output.acquire("rain.mp3").unwrap();
        let probe = output.latest("rain.mp3").unwrap();
        (Voice::new(handle), probe)
    }

    #[test]
    fn prepare_starts_silent_and_playing() {
        let (voice, probe) = voice();
        voice.prepare(true);
        assert!(probe.is_playing());
        assert!(probe.is_looping());
        assert_eq!(probe.volume_history(), vec![0.0]);
        assert_eq!(voice.level(), 0.0);
    }

    #[test]
    fn superseded_generations_cannot_write() {
        let (voice, probe) = voice();
        let first = voice.prepare(false);
        assert!(voice.write_if_current(first, 0.3));

        let (second, level) = voice.supersede();
        assert_eq!(level, 0.3);
        assert!(!voice.write_if_current(first, 0.9));
        assert!(voice.write_if_current(second, 0.1));
        assert_eq!(probe.volume(), 0.1);
    }

    #[test]
    fn finish_releases_once() {
        let (voice, probe) = voice();
        let generation = voice.prepare(true);
        voice.finish();
        voice.finish();
        assert!(probe.is_stopped());
        assert!(probe.is_released());
        assert!(!voice.write_if_current(generation, 0.5));
        assert_ne!(voice.generation(), generation);
    }
}
