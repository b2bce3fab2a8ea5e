//! Collaborator abstractions for audio output and per-track playback.
//!
//! The mixer never decodes or renders audio itself. It asks a
//! [`PlaybackBackend`] for one [`PlaybackHandle`] per track and claims the
//! device once through a [`SessionProvider`].

mod rodio_backend;
mod silent;

pub use rodio_backend::RodioOutput;
pub use silent::{HandleProbe, SilentOutput};

use crate::error::Result;

/// One decoded track routed to the shared output.
pub trait PlaybackHandle: Send {
    fn set_volume(&mut self, volume: f32);
    fn set_loop(&mut self, enabled: bool);
    fn play(&mut self);
    fn stop(&mut self);
    /// Free the underlying resources. The handle is gone afterwards.
    fn release(self: Box<Self>);
}

/// Produces playback handles for catalog resources.
pub trait PlaybackBackend: Send + Sync {
    /// Fails with `ResourceNotFound` when `resource_ref` cannot be resolved.
    fn acquire(&self, resource_ref: &str) -> Result<Box<dyn PlaybackHandle>>;
}

/// A claimed audio output, held for the lifetime of the mixer.
pub trait OutputSession: Send {
    fn release(self: Box<Self>);
}

pub trait SessionProvider: Send + Sync {
    fn acquire_shared(&self, mixable: bool) -> Result<Box<dyn OutputSession>>;
}
