//! Time-driven linear volume ramps.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, warn};

use super::voice::Voice;

/// Interval between volume updates while a fade runs (40 updates/second).
pub const FADE_TICK_MS: u64 = 25;

/// Linear interpolation from `from` to `to` at `progress` in `[0, 1]`.
pub fn interpolate(from: f32, to: f32, progress: f32) -> f32 {
    from + (to - from) * progress.clamp(0.0, 1.0)
}

/// Completion ticket for one or more background transitions.
///
/// Dropping the ticket does not cancel anything; it only gives up the
/// ability to wait.
#[derive(Debug, Default)]
pub struct Transition {
    handles: Vec<JoinHandle<()>>,
}

impl Transition {
    /// A transition that has already completed.
    pub fn done() -> Self {
        Self::default()
    }

    fn spawned(handle: JoinHandle<()>) -> Self {
        Self {
            handles: vec![handle],
        }
    }

    pub fn merge(transitions: impl IntoIterator<Item = Transition>) -> Self {
        Self {
            handles: transitions
                .into_iter()
                .flat_map(|transition| transition.handles)
                .collect(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handles.iter().all(|handle| handle.is_finished())
    }

    /// Block until every underlying fade has finished or been superseded.
    pub fn wait(self) {
        for handle in self.handles {
            if handle.join().is_err() {
                warn!("fade thread panicked during join");
            }
        }
    }
}

/// Drives volume ramps on voices, one background thread per fade.
#[derive(Debug, Clone, Copy)]
pub struct FadeController {
    tick: Duration,
}

impl Default for FadeController {
    fn default() -> Self {
        Self::new(Duration::from_millis(FADE_TICK_MS))
    }
}

impl FadeController {
    pub fn new(tick: Duration) -> Self {
        Self {
            tick: tick.max(Duration::from_millis(1)),
        }
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Ramp `voice` from `from` to `to` over `seconds`.
    ///
    /// A zero or negative duration writes `to` on the calling thread and
    /// returns a finished transition.
    pub(crate) fn fade(
        &self,
        voice: Arc<Voice>,
        generation: u64,
        from: f32,
        to: f32,
        seconds: f32,
    ) -> Transition {
        if seconds <= 0.0 {
            voice.write_if_current(generation, to);
            return Transition::done();
        }
        self.fade_then(voice, generation, from, to, seconds, || {})
    }

    /// Like [`fade`](Self::fade), always on a background thread, running
    /// `on_complete` there once the ramp reaches `to` without having been
    /// superseded.
    pub(crate) fn fade_then<F>(
        &self,
        voice: Arc<Voice>,
        generation: u64,
        from: f32,
        to: f32,
        seconds: f32,
        on_complete: F,
    ) -> Transition
    where
        F: FnOnce() + Send + 'static,
    {
        let tick = self.tick;
        let duration = Duration::try_from_secs_f32(seconds.max(0.0)).unwrap_or(Duration::MAX);
        debug!(
            "fade {:.2} -> {:.2} over {:.2}s (generation {})",
            from, to, seconds, generation
        );
        let handle = thread::spawn(move || {
            if run_ramp(&voice, generation, from, to, duration, tick) {
                on_complete();
            } else {
                debug!("fade generation {} superseded", generation);
            }
        });
        Transition::spawned(handle)
    }
}

/// Returns `false` as soon as the voice is taken over by a newer writer.
fn run_ramp(
    voice: &Voice,
    generation: u64,
    from: f32,
    to: f32,
    duration: Duration,
    tick: Duration,
) -> bool {
    let started = Instant::now();
    loop {
        let elapsed = started.elapsed();
        if elapsed >= duration {
            return voice.write_if_current(generation, to);
        }
        let progress = elapsed.as_secs_f32() / duration.as_secs_f32();
        if !voice.write_if_current(generation, interpolate(from, to, progress)) {
            return false;
        }
        thread::sleep(tick.min(duration - elapsed));
    }
}
