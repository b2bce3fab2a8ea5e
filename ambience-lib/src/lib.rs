//! # Ambience Library
//!
//! Core mixing and playback-lifecycle control for a multi-track ambient sound
//! mixer. Any number of looping tracks can play at once under a shared
//! volume, with fade-in/fade-out transitions and a sleep timer that stops
//! everything once it elapses.
//!
//! The presentation layer talks to [`MixerFacade`] only; audio output is
//! delegated to the collaborators in [`playback`].

pub mod catalog;
pub mod config;
pub mod error;
pub mod facade;
pub mod mixer;
pub mod playback;
pub mod reporter;
pub mod sleep_timer;

pub use catalog::{Catalog, Category, TrackDescriptor};
pub use config::MixerSettings;
pub use error::{MixerError, Result};
pub use facade::{MixerFacade, MixerObserver, MixerState};
pub use mixer::Transition;
pub use sleep_timer::SleepTimerState;
