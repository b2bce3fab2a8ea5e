//! Observable controller consumed by the presentation layer.
//!
//! Every intent takes the same lock, so intents apply one at a time in
//! arrival order and a reader never sees one half applied. Fades and the
//! sleep-timer countdown run in the background; no intent blocks on them.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use log::{debug, info, warn};

use crate::catalog::Catalog;
use crate::config::MixerSettings;
use crate::error::{MixerError, Result};
use crate::mixer::{TrackMixer, Transition};
use crate::playback::{OutputSession, PlaybackBackend, RodioOutput, SessionProvider};
use crate::sleep_timer::{SleepTimer, SleepTimerState, MAX_DELAY};

/// Snapshot of everything the presentation layer displays.
#[derive(Debug, Clone, PartialEq)]
pub struct MixerState {
    pub shared_volume: f32,
    pub loop_enabled: bool,
    pub fade_in_seconds: f32,
    pub fade_out_seconds: f32,
    /// Minutes the sleep timer was last armed with; `0` when off.
    pub sleep_timer_minutes: u32,
    /// Every active track, including those still fading out.
    pub active_track_ids: BTreeSet<String>,
}

impl MixerState {
    pub fn is_any_playing(&self) -> bool {
        !self.active_track_ids.is_empty()
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active_track_ids.contains(id)
    }
}

struct FacadeCore {
    mixer: TrackMixer,
    timer: SleepTimer,
    sleep_timer_minutes: u32,
    mixable: bool,
    sessions: Arc<dyn SessionProvider>,
    session: Option<Box<dyn OutputSession>>,
    shut_down: bool,
}

impl FacadeCore {
    fn snapshot(&self) -> MixerState {
        MixerState {
            shared_volume: self.mixer.shared_volume(),
            loop_enabled: self.mixer.loop_enabled(),
            fade_in_seconds: self.mixer.fade_in_seconds(),
            fade_out_seconds: self.mixer.fade_out_seconds(),
            sleep_timer_minutes: self.sleep_timer_minutes,
            active_track_ids: self.mixer.active_ids().into_iter().collect(),
        }
    }

    fn ensure_output(&self) -> Result<()> {
        if self.shut_down {
            return Err(MixerError::OutputAcquisitionFailed(
                "mixer has been shut down".to_string(),
            ));
        }
        if self.session.is_none() {
            return Err(MixerError::OutputAcquisitionFailed(
                "audio output session not acquired".to_string(),
            ));
        }
        Ok(())
    }
}

/// The mixer as seen by a UI shell.
///
/// Construction claims the audio output once. If that fails the facade is
/// still usable, but every start fails until [`retry_output`] succeeds.
/// Dropping the facade shuts it down.
///
/// [`retry_output`]: MixerFacade::retry_output
pub struct MixerFacade {
    core: Arc<Mutex<FacadeCore>>,
    catalog: Arc<Catalog>,
}

impl MixerFacade {
    pub fn new(
        catalog: Catalog,
        settings: MixerSettings,
        backend: Arc<dyn PlaybackBackend>,
        sessions: Arc<dyn SessionProvider>,
    ) -> Self {
        let settings = settings.normalized();
        let catalog = Arc::new(catalog);
        let mixer = TrackMixer::new(catalog.clone(), backend, &settings);

        let core = Arc::new_cyclic(|core: &Weak<Mutex<FacadeCore>>| {
            let core = core.clone();
            Mutex::new(FacadeCore {
                mixer,
                timer: SleepTimer::new(move || fire_sleep_timer(&core)),
                sleep_timer_minutes: 0,
                mixable: settings.mixable_output,
                sessions,
                session: None,
                shut_down: false,
            })
        });

        let facade = Self { core, catalog };
        if let Err(err) = facade.retry_output() {
            warn!("audio output unavailable: {}", err);
        }
        if settings.sleep_timer_minutes > 0 {
            facade.arm_sleep_timer(settings.sleep_timer_minutes);
        }
        facade
    }

    /// Mixer on the default output device, reading files under `root`.
    pub fn with_rodio(
        catalog: Catalog,
        settings: MixerSettings,
        root: impl Into<PathBuf>,
    ) -> Self {
        let output = Arc::new(RodioOutput::new(root));
        Self::new(catalog, settings, output.clone(), output)
    }

    /// Claim the audio output if it is not held yet.
    pub fn retry_output(&self) -> Result<()> {
        let mut core = self.core.lock().unwrap();
        if core.shut_down {
            return Err(MixerError::OutputAcquisitionFailed(
                "mixer has been shut down".to_string(),
            ));
        }
        if core.session.is_some() {
            return Ok(());
        }
        let session = core.sessions.acquire_shared(core.mixable)?;
        core.session = Some(session);
        info!("audio output acquired");
        Ok(())
    }

    pub fn is_output_ready(&self) -> bool {
        let core = self.core.lock().unwrap();
        core.session.is_some() && !core.shut_down
    }

    /// Start `id` if it is silent or fading out, otherwise fade it out.
    ///
    /// Returns `true` when the track is now starting.
    pub fn toggle_track(&self, id: &str) -> Result<bool> {
        let mut core = self.core.lock().unwrap();
        if core.mixer.is_active(id) && !core.mixer.is_stopping(id) {
            core.mixer.stop(id);
            return Ok(false);
        }
        core.ensure_output()?;
        core.mixer.start(id).map(|_| true).map_err(|err| {
            warn!("could not start {}: {}", id, err);
            err
        })
    }

    pub fn start_track(&self, id: &str) -> Result<Transition> {
        let mut core = self.core.lock().unwrap();
        core.ensure_output()?;
        core.mixer.start(id).map_err(|err| {
            warn!("could not start {}: {}", id, err);
            err
        })
    }

    pub fn stop_track(&self, id: &str) -> Transition {
        self.core.lock().unwrap().mixer.stop(id)
    }

    /// Fade out every active track.
    pub fn stop_all_now(&self) -> Transition {
        self.core.lock().unwrap().mixer.stop_all()
    }

    /// Returns the clamped volume actually applied.
    pub fn set_volume(&self, volume: f32) -> f32 {
        self.core.lock().unwrap().mixer.set_shared_volume(volume)
    }

    pub fn set_loop(&self, enabled: bool) {
        self.core.lock().unwrap().mixer.set_loop_enabled(enabled);
    }

    pub fn set_fade_in(&self, seconds: f32) -> f32 {
        self.core.lock().unwrap().mixer.set_fade_in_seconds(seconds)
    }

    pub fn set_fade_out(&self, seconds: f32) -> f32 {
        self.core.lock().unwrap().mixer.set_fade_out_seconds(seconds)
    }

    /// Stop everything after `minutes`. `0` turns the timer off.
    pub fn arm_sleep_timer(&self, minutes: u32) {
        let mut core = self.core.lock().unwrap();
        core.sleep_timer_minutes = minutes;
        core.timer.arm_minutes(minutes);
    }

    /// Arm with an exact delay; the reported minutes are rounded up.
    pub fn arm_sleep_timer_for(&self, delay: Duration) {
        let mut core = self.core.lock().unwrap();
        core.sleep_timer_minutes = if delay.is_zero() {
            0
        } else {
            (delay.min(MAX_DELAY).as_secs_f64() / 60.0).ceil().max(1.0) as u32
        };
        core.timer.arm(delay);
    }

    pub fn cancel_sleep_timer(&self) {
        let mut core = self.core.lock().unwrap();
        core.sleep_timer_minutes = 0;
        core.timer.cancel();
    }

    pub fn state(&self) -> MixerState {
        self.core.lock().unwrap().snapshot()
    }

    pub fn timer_state(&self) -> SleepTimerState {
        self.core.lock().unwrap().timer.state()
    }

    pub fn sleep_timer_remaining(&self) -> Option<Duration> {
        self.core.lock().unwrap().timer.remaining()
    }

    /// Current values in settings form, suitable for persisting.
    pub fn settings(&self) -> MixerSettings {
        let core = self.core.lock().unwrap();
        MixerSettings {
            volume: core.mixer.shared_volume(),
            loop_enabled: core.mixer.loop_enabled(),
            fade_in_seconds: core.mixer.fade_in_seconds(),
            fade_out_seconds: core.mixer.fade_out_seconds(),
            sleep_timer_minutes: core.sleep_timer_minutes,
            mixable_output: core.mixable,
        }
    }

    pub fn is_any_playing(&self) -> bool {
        self.core.lock().unwrap().mixer.is_any_playing()
    }

    pub fn track_level(&self, id: &str) -> Option<f32> {
        self.core.lock().unwrap().mixer.level(id)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// A read-only handle that does not keep the mixer alive.
    pub fn observer(&self) -> MixerObserver {
        MixerObserver {
            core: Arc::downgrade(&self.core),
        }
    }

    /// Cancel the sleep timer, fade out every track, then release the
    /// audio output. Later calls are no-ops.
    pub fn shutdown(&self) {
        let transition = {
            let mut core = self.core.lock().unwrap();
            if core.shut_down {
                return;
            }
            core.shut_down = true;
            core.sleep_timer_minutes = 0;
            core.timer.cancel();
            core.mixer.stop_all()
        };
        transition.wait();

        if let Some(session) = self.core.lock().unwrap().session.take() {
            session.release();
        }
        info!("mixer shut down");
    }
}

impl Drop for MixerFacade {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Polls mixer state without owning the mixer.
#[derive(Clone)]
pub struct MixerObserver {
    core: Weak<Mutex<FacadeCore>>,
}

impl MixerObserver {
    /// `None` once the facade has been dropped.
    pub fn state(&self) -> Option<MixerState> {
        self.core
            .upgrade()
            .map(|core| core.lock().unwrap().snapshot())
    }
}

/// Sleep-timer callback: stop everything through the serialized core.
fn fire_sleep_timer(core: &Weak<Mutex<FacadeCore>>) {
    let Some(core) = core.upgrade() else {
        return;
    };
    let transition = {
        let mut core = core.lock().unwrap();
        // Re-armed between the countdown expiring and this callback taking the lock.
        if core.timer.is_armed() {
            debug!("sleep timer fire superseded by a newer arm");
            return;
        }
        core.sleep_timer_minutes = 0;
        core.mixer.stop_all()
    };
    transition.wait();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::SilentOutput;
    use std::thread;

    fn facade_with(settings: MixerSettings) -> (MixerFacade, SilentOutput) {
        let output = SilentOutput::new();
        let facade = MixerFacade::new(
            Catalog::builtin(),
            settings,
            Arc::new(output.clone()),
            Arc::new(output.clone()),
        );
        (facade, output)
    }

    fn quick_settings() -> MixerSettings {
        MixerSettings {
            fade_in_seconds: 0.05,
            fade_out_seconds: 0.05,
            ..MixerSettings::default()
        }
    }

    #[test]
    fn acquires_output_once_at_startup() {
        let (facade, output) = facade_with(quick_settings());
        assert!(facade.is_output_ready());
        assert_eq!(output.open_sessions(), 1);
        assert_eq!(output.last_mixable(), Some(true));

        facade.retry_output().unwrap();
        assert_eq!(output.open_sessions(), 1);
    }

    #[test]
    fn starts_fail_until_output_is_acquired() {
        let output = SilentOutput::new();
        output.fail_sessions(true);
        let facade = MixerFacade::new(
            Catalog::builtin(),
            quick_settings(),
            Arc::new(output.clone()),
            Arc::new(output.clone()),
        );
        assert!(!facade.is_output_ready());
        assert!(matches!(
            facade.start_track("rain"),
            Err(MixerError::OutputAcquisitionFailed(_))
        ));
        assert!(matches!(
            facade.toggle_track("rain"),
            Err(MixerError::OutputAcquisitionFailed(_))
        ));
        assert!(!facade.is_any_playing());
        assert!(output.handles().is_empty());

        output.fail_sessions(false);
        facade.retry_output().unwrap();
        facade.start_track("rain").unwrap().wait();
        assert!(facade.state().is_active("rain"));
    }

    #[test]
    fn toggle_starts_then_stops() {
        let (facade, output) = facade_with(quick_settings());
        assert!(facade.toggle_track("rain").unwrap());
        assert!(facade.state().is_active("rain"));

        assert!(!facade.toggle_track("rain").unwrap());
        // Still active while fading out.
        assert!(facade.state().is_active("rain"));
        thread::sleep(Duration::from_millis(200));
        assert!(!facade.state().is_active("rain"));
        assert!(output.latest("rain.mp3").unwrap().is_released());
    }

    #[test]
    fn failed_start_reports_error_and_keeps_state() {
        let (facade, output) = facade_with(quick_settings());
        output.mark_missing("waves.mp3");
        facade.start_track("rain").unwrap();
        let before = facade.state();

        assert!(matches!(
            facade.toggle_track("waves"),
            Err(MixerError::ResourceNotFound(_))
        ));
        assert_eq!(facade.state(), before);
    }

    #[test]
    fn snapshot_reflects_every_intent() {
        let (facade, _) = facade_with(quick_settings());
        assert_eq!(facade.set_volume(0.7), 0.7);
        facade.set_loop(false);
        assert_eq!(facade.set_fade_in(3.0), 3.0);
        assert_eq!(facade.set_fade_out(-1.0), 0.0);
        facade.arm_sleep_timer(30);

        let state = facade.state();
        assert_eq!(state.shared_volume, 0.7);
        assert!(!state.loop_enabled);
        assert_eq!(state.fade_in_seconds, 3.0);
        assert_eq!(state.fade_out_seconds, 0.0);
        assert_eq!(state.sleep_timer_minutes, 30);
        assert!(matches!(facade.timer_state(), SleepTimerState::Armed { .. }));

        let settings = facade.settings();
        assert_eq!(settings.volume, 0.7);
        assert_eq!(settings.sleep_timer_minutes, 30);
    }

    #[test]
    fn zero_minute_timer_is_off() {
        let (facade, _) = facade_with(quick_settings());
        facade.arm_sleep_timer(15);
        facade.arm_sleep_timer(0);
        assert_eq!(facade.timer_state(), SleepTimerState::Idle);
        assert_eq!(facade.state().sleep_timer_minutes, 0);
        assert_eq!(facade.sleep_timer_remaining(), None);
    }

    #[test]
    fn sleep_timer_stops_everything_once() {
        let (facade, output) = facade_with(quick_settings());
        facade.start_track("rain").unwrap();
        facade.start_track("waves").unwrap();
        facade.arm_sleep_timer_for(Duration::from_millis(100));
        assert_eq!(facade.state().sleep_timer_minutes, 1);

        thread::sleep(Duration::from_millis(400));
        let state = facade.state();
        assert!(!state.is_any_playing());
        assert_eq!(state.sleep_timer_minutes, 0);
        assert_eq!(facade.timer_state(), SleepTimerState::Idle);
        assert!(output.handles().iter().all(|probe| probe.is_released()));
    }

    #[test]
    fn cancelled_timer_never_stops_playback() {
        let (facade, _) = facade_with(quick_settings());
        facade.start_track("rain").unwrap();
        facade.arm_sleep_timer_for(Duration::from_millis(100));
        facade.cancel_sleep_timer();

        thread::sleep(Duration::from_millis(250));
        assert!(facade.state().is_active("rain"));
    }

    #[test]
    fn oversized_timer_delay_keeps_the_facade_usable() {
        let (facade, _) = facade_with(quick_settings());
        facade.arm_sleep_timer_for(Duration::MAX);

        let state = facade.state();
        assert!(state.sleep_timer_minutes > 0);
        assert!(matches!(facade.timer_state(), SleepTimerState::Armed { .. }));
        assert!(facade.sleep_timer_remaining().unwrap() <= MAX_DELAY);
        facade.start_track("rain").unwrap();
        assert!(facade.state().is_active("rain"));
    }

    #[test]
    fn rearm_during_an_expiring_fire_wins() {
        let (facade, _) = facade_with(MixerSettings {
            fade_in_seconds: 0.0,
            fade_out_seconds: 0.0,
            ..MixerSettings::default()
        });
        facade.start_track("rain").unwrap();
        facade.arm_sleep_timer_for(Duration::from_millis(20));

        {
            // The countdown expires while an intent holds the core; its
            // callback queues behind this re-arm.
            let mut core = facade.core.lock().unwrap();
            thread::sleep(Duration::from_millis(100));
            assert!(!core.timer.is_armed());
            core.sleep_timer_minutes = 15;
            core.timer.arm_minutes(15);
        }
        thread::sleep(Duration::from_millis(100));

        let state = facade.state();
        assert_eq!(state.sleep_timer_minutes, 15);
        assert!(matches!(facade.timer_state(), SleepTimerState::Armed { .. }));
        assert!(state.is_active("rain"));
    }

    #[test]
    fn settings_arm_the_timer_at_startup() {
        let (facade, _) = facade_with(MixerSettings {
            sleep_timer_minutes: 45,
            ..quick_settings()
        });
        assert_eq!(facade.state().sleep_timer_minutes, 45);
        assert!(facade.sleep_timer_remaining().unwrap() > Duration::from_secs(44 * 60));
    }

    #[test]
    fn shutdown_stops_tracks_and_releases_output() {
        let (facade, output) = facade_with(quick_settings());
        facade.start_track("rain").unwrap();
        facade.start_track("fireplace").unwrap();
        facade.arm_sleep_timer(10);

        facade.shutdown();
        assert!(!facade.is_any_playing());
        assert!(!facade.is_output_ready());
        assert_eq!(facade.timer_state(), SleepTimerState::Idle);
        assert_eq!(output.open_sessions(), 0);
        assert!(output.handles().iter().all(|probe| probe.is_released()));
        assert!(facade.start_track("rain").is_err());
        assert!(facade.retry_output().is_err());

        facade.shutdown();
    }

    #[test]
    fn dropping_the_facade_releases_output() {
        let (facade, output) = facade_with(quick_settings());
        facade.start_track("rain").unwrap();
        let observer = facade.observer();
        assert!(observer.state().unwrap().is_active("rain"));

        drop(facade);
        assert_eq!(output.open_sessions(), 0);
        assert!(output.latest("rain.mp3").unwrap().is_released());
        assert!(observer.state().is_none());
    }

    #[test]
    fn catalog_is_exposed_read_only() {
        let (facade, _) = facade_with(quick_settings());
        assert!(facade.catalog().get("fireplace").is_some());
    }
}
