//! rodio-backed output: one shared device stream, one `Sink` per track.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};
use rodio::mixer::Mixer;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};

use crate::error::{MixerError, Result};

use super::{OutputSession, PlaybackBackend, PlaybackHandle, SessionProvider};

const OUTPUT_STREAM_OPEN_RETRIES: usize = 20;
const OUTPUT_STREAM_OPEN_RETRY_MS: u64 = 100;

/// Session provider and playback backend for the default output device.
///
/// Resources are file names resolved against `root`. The device stream lives
/// on its own thread for as long as the session is held; track sinks connect
/// to its mixer.
#[derive(Clone)]
pub struct RodioOutput {
    root: PathBuf,
    mixer: Arc<Mutex<Option<Mixer>>>,
}

impl RodioOutput {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            mixer: Arc::new(Mutex::new(None)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SessionProvider for RodioOutput {
    fn acquire_shared(&self, mixable: bool) -> Result<Box<dyn OutputSession>> {
        if self.mixer.lock().unwrap().is_some() {
            return Err(MixerError::OutputAcquisitionFailed(
                "output session already held".to_string(),
            ));
        }

        // rodio always mixes through its own stream mixer, so the flag is informational.
        info!("opening default output stream (mixable: {})", mixable);
        let (ready_tx, ready_rx) = mpsc::channel::<Option<Mixer>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let thread = thread::spawn(move || {
            let Some(stream) = open_default_stream() else {
                let _ = ready_tx.send(None);
                return;
            };
            let _ = ready_tx.send(Some(stream.mixer().clone()));
            // Blocks until the session is released or dropped.
            let _ = shutdown_rx.recv();
            drop(stream);
            debug!("output stream closed");
        });

        match ready_rx.recv() {
            Ok(Some(mixer)) => {
                *self.mixer.lock().unwrap() = Some(mixer);
                Ok(Box::new(RodioSession {
                    mixer: self.mixer.clone(),
                    shutdown: Some(shutdown_tx),
                    thread: Some(thread),
                }))
            }
            _ => {
                if thread.join().is_err() {
                    warn!("output stream thread panicked");
                }
                Err(MixerError::OutputAcquisitionFailed(
                    "could not open the default output device".to_string(),
                ))
            }
        }
    }
}

impl PlaybackBackend for RodioOutput {
    fn acquire(&self, resource_ref: &str) -> Result<Box<dyn PlaybackHandle>> {
        let mixer = self.mixer.lock().unwrap().clone().ok_or_else(|| {
            MixerError::OutputAcquisitionFailed("no output session is open".to_string())
        })?;

        let path = self.root.join(resource_ref);
        if !path.is_file() {
            return Err(MixerError::ResourceNotFound(path.display().to_string()));
        }
        let file = File::open(&path)?;
        let decoder = Decoder::new(BufReader::new(file))
            .map_err(|err| MixerError::Decode(format!("{}: {}", path.display(), err)))?;

        let looping = Arc::new(AtomicBool::new(false));
        let sink = Sink::connect_new(&mixer);
        sink.pause();
        sink.set_volume(0.0);
        sink.append(LoopingSource::new(decoder.buffered(), looping.clone()));
        debug!("sink ready for {}", path.display());

        Ok(Box::new(RodioHandle { sink, looping }))
    }
}

fn open_default_stream() -> Option<OutputStream> {
    for attempt in 1..=OUTPUT_STREAM_OPEN_RETRIES {
        match OutputStreamBuilder::open_default_stream() {
            Ok(stream) => return Some(stream),
            Err(err) => {
                if attempt == OUTPUT_STREAM_OPEN_RETRIES {
                    error!(
                        "failed to open default output stream after {} attempts: {}",
                        OUTPUT_STREAM_OPEN_RETRIES, err
                    );
                    return None;
                }
                warn!(
                    "open_default_stream attempt {}/{} failed: {}",
                    attempt, OUTPUT_STREAM_OPEN_RETRIES, err
                );
                thread::sleep(Duration::from_millis(OUTPUT_STREAM_OPEN_RETRY_MS));
            }
        }
    }
    None
}

struct RodioSession {
    mixer: Arc<Mutex<Option<Mixer>>>,
    shutdown: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl OutputSession for RodioSession {
    fn release(self: Box<Self>) {
        info!("releasing output session");
        drop(self);
    }
}

impl Drop for RodioSession {
    fn drop(&mut self) {
        self.mixer.lock().unwrap().take();
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("output stream thread panicked during join");
            }
        }
    }
}

struct RodioHandle {
    sink: Sink,
    looping: Arc<AtomicBool>,
}

impl PlaybackHandle for RodioHandle {
    fn set_volume(&mut self, volume: f32) {
        self.sink.set_volume(volume);
    }

    fn set_loop(&mut self, enabled: bool) {
        self.looping.store(enabled, Ordering::Relaxed);
    }

    fn play(&mut self) {
        self.sink.play();
    }

    fn stop(&mut self) {
        self.sink.stop();
    }

    fn release(self: Box<Self>) {
        drop(self);
    }
}

/// Source that restarts from its first sample while `looping` is set.
///
/// The flag is read when the inner source runs dry, so loop mode can be
/// switched while the track is playing.
struct LoopingSource<S>
where
    S: Source + Clone,
{
    pristine: S,
    current: S,
    looping: Arc<AtomicBool>,
}

impl<S> LoopingSource<S>
where
    S: Source + Clone,
{
    fn new(source: S, looping: Arc<AtomicBool>) -> Self {
        Self {
            pristine: source.clone(),
            current: source,
            looping,
        }
    }
}

impl<S> Iterator for LoopingSource<S>
where
    S: Source + Clone,
{
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(sample) = self.current.next() {
            return Some(sample);
        }
        if !self.looping.load(Ordering::Relaxed) {
            return None;
        }
        self.current = self.pristine.clone();
        self.current.next()
    }
}

impl<S> Source for LoopingSource<S>
where
    S: Source + Clone,
{
    fn current_span_len(&self) -> Option<usize> {
        self.current.current_span_len()
    }

    fn channels(&self) -> u16 {
        self.current.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.current.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}
