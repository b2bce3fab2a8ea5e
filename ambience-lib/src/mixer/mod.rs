//! Track-level mixing: which tracks are active, and how they fade.
//!
//! [`TrackMixer`] owns one voice per active track id. Starting a track
//! registers it at once and fades it in from silence; stopping it fades it
//! out and only then stops the handle and drops the entry, so observers see
//! the track as active for the whole fade-out.

mod fade;
mod voice;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, info};

use crate::catalog::Catalog;
use crate::config::{clamp_seconds, clamp_volume, MixerSettings};
use crate::error::{MixerError, Result};
use crate::playback::PlaybackBackend;

pub use fade::{interpolate, FadeController, Transition, FADE_TICK_MS};
use voice::Voice;

struct ActiveTrack {
    voice: Arc<Voice>,
    /// Set while the fade-out runs; cleared if the track is revived.
    stopping: bool,
}

type TrackMap = Arc<Mutex<HashMap<String, ActiveTrack>>>;

/// Set of concurrently playing tracks under one shared volume and loop mode.
pub struct TrackMixer {
    catalog: Arc<Catalog>,
    backend: Arc<dyn PlaybackBackend>,
    fades: FadeController,
    tracks: TrackMap,
    volume: f32,
    loop_enabled: bool,
    fade_in_seconds: f32,
    fade_out_seconds: f32,
}

impl TrackMixer {
    pub fn new(
        catalog: Arc<Catalog>,
        backend: Arc<dyn PlaybackBackend>,
        settings: &MixerSettings,
    ) -> Self {
        let settings = settings.normalized();
        Self {
            catalog,
            backend,
            fades: FadeController::default(),
            tracks: Arc::new(Mutex::new(HashMap::new())),
            volume: settings.volume,
            loop_enabled: settings.loop_enabled,
            fade_in_seconds: settings.fade_in_seconds,
            fade_out_seconds: settings.fade_out_seconds,
        }
    }

    /// Start `id`, fading it in toward the current shared volume.
    ///
    /// Idempotent for a track that is already playing. A track that is
    /// fading out is revived from whatever level it has reached.
    pub fn start(&mut self, id: &str) -> Result<Transition> {
        let mut tracks = self.tracks.lock().unwrap();

        if let Some(track) = tracks.get_mut(id) {
            if !track.stopping {
                debug!("{} already active", id);
                return Ok(Transition::done());
            }
            track.stopping = false;
            let (generation, level) = track.voice.supersede();
            info!("reviving {} from {:.2}", id, level);
            return Ok(self.fades.fade(
                track.voice.clone(),
                generation,
                level,
                self.volume,
                self.fade_in_seconds,
            ));
        }

        let descriptor = self
            .catalog
            .get(id)
            .ok_or_else(|| MixerError::ResourceNotFound(format!("no track with id '{}'", id)))?;
        let handle = self.backend.acquire(&descriptor.resource_ref)?;
        let voice = Arc::new(Voice::new(handle));
        let generation = voice.prepare(self.loop_enabled);
        tracks.insert(
            id.to_string(),
            ActiveTrack {
                voice: voice.clone(),
                stopping: false,
            },
        );
        info!(
            "started {} (fade in {:.2}s to {:.2})",
            id, self.fade_in_seconds, self.volume
        );

        Ok(self
            .fades
            .fade(voice, generation, 0.0, self.volume, self.fade_in_seconds))
    }

    /// Fade `id` out, then stop and release it. No-op if it is not active
    /// or already fading out.
    pub fn stop(&mut self, id: &str) -> Transition {
        let mut tracks = self.tracks.lock().unwrap();
        let voice = match tracks.get_mut(id) {
            Some(track) if !track.stopping => {
                track.stopping = true;
                track.voice.clone()
            }
            _ => return Transition::done(),
        };

        if self.fade_out_seconds <= 0.0 {
            tracks.remove(id);
            voice.finish();
            info!("stopped {}", id);
            return Transition::done();
        }

        let (generation, level) = voice.supersede();
        info!(
            "stopping {} (fade out {:.2}s from {:.2})",
            id, self.fade_out_seconds, level
        );
        let tracks_ref = self.tracks.clone();
        let track_id = id.to_string();
        self.fades.fade_then(
            voice,
            generation,
            level,
            0.0,
            self.fade_out_seconds,
            move || finish_track(&tracks_ref, &track_id, generation),
        )
    }

    /// Stop every active track concurrently.
    pub fn stop_all(&mut self) -> Transition {
        let ids: Vec<String> = self.tracks.lock().unwrap().keys().cloned().collect();
        if !ids.is_empty() {
            info!("stopping all ({} tracks)", ids.len());
        }
        Transition::merge(ids.iter().map(|id| self.stop(id)).collect::<Vec<_>>())
    }

    /// Set the shared volume and apply it to playing tracks immediately.
    ///
    /// Tracks that are fading in jump to the new level; tracks that are
    /// fading out keep ramping toward silence.
    pub fn set_shared_volume(&mut self, volume: f32) -> f32 {
        self.volume = clamp_volume(volume);
        let tracks = self.tracks.lock().unwrap();
        for track in tracks.values().filter(|track| !track.stopping) {
            track.voice.set_level_now(self.volume);
        }
        debug!("shared volume {:.2}", self.volume);
        self.volume
    }

    pub fn set_loop_enabled(&mut self, enabled: bool) {
        self.loop_enabled = enabled;
        let tracks = self.tracks.lock().unwrap();
        for track in tracks.values() {
            track.voice.set_loop(enabled);
        }
        debug!("loop {}", if enabled { "on" } else { "off" });
    }

    pub fn set_fade_in_seconds(&mut self, seconds: f32) -> f32 {
        self.fade_in_seconds = clamp_seconds(seconds);
        self.fade_in_seconds
    }

    pub fn set_fade_out_seconds(&mut self, seconds: f32) -> f32 {
        self.fade_out_seconds = clamp_seconds(seconds);
        self.fade_out_seconds
    }

    pub fn shared_volume(&self) -> f32 {
        self.volume
    }

    pub fn loop_enabled(&self) -> bool {
        self.loop_enabled
    }

    pub fn fade_in_seconds(&self) -> f32 {
        self.fade_in_seconds
    }

    pub fn fade_out_seconds(&self) -> f32 {
        self.fade_out_seconds
    }

    /// Ids of every active track, including ones fading out, sorted.
    pub fn active_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tracks.lock().unwrap().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.tracks.lock().unwrap().contains_key(id)
    }

    pub fn is_stopping(&self, id: &str) -> bool {
        self.tracks
            .lock()
            .unwrap()
            .get(id)
            .map(|track| track.stopping)
            .unwrap_or(false)
    }

    /// Current volume of `id`, if it is active.
    pub fn level(&self, id: &str) -> Option<f32> {
        self.tracks
            .lock()
            .unwrap()
            .get(id)
            .map(|track| track.voice.level())
    }

    pub fn is_any_playing(&self) -> bool {
        !self.tracks.lock().unwrap().is_empty()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

/// Runs on the fade-out thread once the ramp has reached silence.
fn finish_track(tracks: &TrackMap, id: &str, generation: u64) {
    let mut tracks = tracks.lock().unwrap();
    let owned = tracks
        .get(id)
        .map(|track| track.voice.generation() == generation)
        .unwrap_or(false);
    if !owned {
        debug!("{} was revived before its fade-out finished", id);
        return;
    }
    if let Some(track) = tracks.remove(id) {
        track.voice.finish();
        info!("stopped {}", id);
    }
}
