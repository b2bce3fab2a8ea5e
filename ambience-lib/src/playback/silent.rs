//! Headless output that records everything the mixer does to its handles.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use log::debug;

use crate::error::{MixerError, Result};

use super::{OutputSession, PlaybackBackend, PlaybackHandle, SessionProvider};

#[derive(Debug, Default)]
struct HandleRecord {
    resource_ref: String,
    volumes: Vec<f32>,
    looping: bool,
    playing: bool,
    stopped: bool,
    released: bool,
}

/// Read-only view of one handle handed out by [`SilentOutput`].
#[derive(Debug, Clone)]
pub struct HandleProbe {
    record: Arc<Mutex<HandleRecord>>,
}

impl HandleProbe {
    pub fn resource_ref(&self) -> String {
        self.record.lock().unwrap().resource_ref.clone()
    }

    /// Last volume written, `0.0` if none was.
    pub fn volume(&self) -> f32 {
        self.record
            .lock()
            .unwrap()
            .volumes
            .last()
            .copied()
            .unwrap_or(0.0)
    }

    /// Every volume written, oldest first.
    pub fn volume_history(&self) -> Vec<f32> {
        self.record.lock().unwrap().volumes.clone()
    }

    pub fn is_looping(&self) -> bool {
        self.record.lock().unwrap().looping
    }

    pub fn is_playing(&self) -> bool {
        self.record.lock().unwrap().playing
    }

    pub fn is_stopped(&self) -> bool {
        self.record.lock().unwrap().stopped
    }

    pub fn is_released(&self) -> bool {
        self.record.lock().unwrap().released
    }
}

struct SilentHandle {
    record: Arc<Mutex<HandleRecord>>,
}

impl PlaybackHandle for SilentHandle {
    fn set_volume(&mut self, volume: f32) {
        self.record.lock().unwrap().volumes.push(volume);
    }

    fn set_loop(&mut self, enabled: bool) {
        self.record.lock().unwrap().looping = enabled;
    }

    fn play(&mut self) {
        self.record.lock().unwrap().playing = true;
    }

    fn stop(&mut self) {
        let mut record = self.record.lock().unwrap();
        record.playing = false;
        record.stopped = true;
    }

    fn release(self: Box<Self>) {
        let mut record = self.record.lock().unwrap();
        record.playing = false;
        record.released = true;
    }
}

#[derive(Debug, Default)]
struct SilentState {
    missing: HashSet<String>,
    fail_sessions: bool,
    probes: Vec<HandleProbe>,
    open_sessions: usize,
    last_mixable: Option<bool>,
}

/// Output backend without an audio device.
///
/// Used for headless runs and tests. Resources can be marked missing and
/// session acquisition can be forced to fail.
#[derive(Debug, Clone, Default)]
pub struct SilentOutput {
    state: Arc<Mutex<SilentState>>,
}

impl SilentOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_missing(&self, resource_ref: &str) {
        self.state
            .lock()
            .unwrap()
            .missing
            .insert(resource_ref.to_string());
    }

    pub fn fail_sessions(&self, fail: bool) {
        self.state.lock().unwrap().fail_sessions = fail;
    }

    /// All handles acquired so far, in acquisition order.
    pub fn handles(&self) -> Vec<HandleProbe> {
        self.state.lock().unwrap().probes.clone()
    }

    pub fn handles_for(&self, resource_ref: &str) -> Vec<HandleProbe> {
        self.handles()
            .into_iter()
            .filter(|probe| probe.resource_ref() == resource_ref)
            .collect()
    }

    /// Most recent handle acquired for `resource_ref`.
    pub fn latest(&self, resource_ref: &str) -> Option<HandleProbe> {
        self.handles_for(resource_ref).pop()
    }

    pub fn open_sessions(&self) -> usize {
        self.state.lock().unwrap().open_sessions
    }

    pub fn last_mixable(&self) -> Option<bool> {
        self.state.lock().unwrap().last_mixable
    }
}

impl PlaybackBackend for SilentOutput {
    fn acquire(&self, resource_ref: &str) -> Result<Box<dyn PlaybackHandle>> {
        let mut state = self.state.lock().unwrap();
        if state.missing.contains(resource_ref) {
            return Err(MixerError::ResourceNotFound(resource_ref.to_string()));
        }
        let record = Arc::new(Mutex::new(HandleRecord {
            resource_ref: resource_ref.to_string(),
            ..HandleRecord::default()
        }));
        state.probes.push(HandleProbe {
            record: record.clone(),
        });
        debug!("silent handle acquired for {}", resource_ref);
        Ok(Box::new(SilentHandle { record }))
    }
}

struct SilentSession {
    state: Arc<Mutex<SilentState>>,
}

impl OutputSession for SilentSession {
    fn release(self: Box<Self>) {
        let mut state = self.state.lock().unwrap();
        state.open_sessions = state.open_sessions.saturating_sub(1);
    }
}

impl SessionProvider for SilentOutput {
    fn acquire_shared(&self, mixable: bool) -> Result<Box<dyn OutputSession>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_sessions {
            return Err(MixerError::OutputAcquisitionFailed(
                "silent output configured to refuse sessions".to_string(),
            ));
        }
        state.open_sessions += 1;
        state.last_mixable = Some(mixable);
        Ok(Box::new(SilentSession {
            state: self.state.clone(),
        }))
    }
}
