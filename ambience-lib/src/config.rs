//! Mixer settings that a shell can load, tweak and persist.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const DEFAULT_VOLUME: f32 = 0.5;
pub const DEFAULT_FADE_IN_SECONDS: f32 = 2.0;
pub const DEFAULT_FADE_OUT_SECONDS: f32 = 2.0;

/// Initial values for the observable mixer state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerSettings {
    /// Shared volume applied to every active track, in `[0, 1]`.
    pub volume: f32,
    pub loop_enabled: bool,
    pub fade_in_seconds: f32,
    pub fade_out_seconds: f32,
    /// `0` leaves the sleep timer off.
    pub sleep_timer_minutes: u32,
    /// Ask the output session to mix with other applications' audio.
    pub mixable_output: bool,
}

impl Default for MixerSettings {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            loop_enabled: true,
            fade_in_seconds: DEFAULT_FADE_IN_SECONDS,
            fade_out_seconds: DEFAULT_FADE_OUT_SECONDS,
            sleep_timer_minutes: 0,
            mixable_output: true,
        }
    }
}

impl MixerSettings {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        Ok(settings.normalized())
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Clamp every field into its valid range.
    pub fn normalized(self) -> Self {
        Self {
            volume: clamp_volume(self.volume),
            fade_in_seconds: clamp_seconds(self.fade_in_seconds),
            fade_out_seconds: clamp_seconds(self.fade_out_seconds),
            ..self
        }
    }
}

/// Clamp to `[0, 1]`, mapping NaN to silence.
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

/// Clamp a duration in seconds to a finite, non-negative value.
pub fn clamp_seconds(seconds: f32) -> f32 {
    if seconds.is_finite() {
        seconds.max(0.0)
    } else {
        0.0
    }
}
