//! Periodic mixer state reporter for UI updates.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{debug, warn};

use crate::facade::{MixerObserver, MixerState};

/// Background reporter that polls a mixer at fixed intervals and invokes the
/// callback whenever the snapshot changed.
///
/// The reporter stops by itself once the observed mixer has been dropped.
#[derive(Clone)]
pub struct StateReporter {
    observer: MixerObserver,
    report: Arc<Mutex<dyn FnMut(MixerState) + Send>>,
    interval: Duration,
    finish: Arc<AtomicBool>,
    thread_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl StateReporter {
    pub fn new<F>(observer: MixerObserver, report: F, interval: Duration) -> Self
    where
        F: FnMut(MixerState) + Send + 'static,
    {
        Self {
            observer,
            report: Arc::new(Mutex::new(report)),
            interval,
            finish: Arc::new(AtomicBool::new(false)),
            thread_handle: Arc::new(Mutex::new(None)),
        }
    }

    fn run(&self) {
        let mut last_report: Option<MixerState> = None;

        loop {
            let Some(report) = self.observer.state() else {
                break;
            };

            if last_report.as_ref() != Some(&report) {
                let mut report_fn = self.report.lock().unwrap();
                (*report_fn)(report.clone());
                last_report = Some(report);
            }

            if self.finish.load(Ordering::Relaxed) {
                break;
            }

            thread::sleep(self.interval);
        }
    }

    /// Start polling on a background thread, restarting it if it already runs.
    pub fn start(&self) {
        self.stop();
        if self.observer.state().is_none() {
            debug!("mixer already dropped; state reporter not started");
            return;
        }
        self.finish.store(false, Ordering::Relaxed);
        let this = self.clone();
        let spawned = thread::Builder::new()
            .name("ambience-reporter".to_string())
            .spawn(move || this.run());
        match spawned {
            Ok(handle) => *self.thread_handle.lock().unwrap() = Some(handle),
            Err(err) => warn!("could not start state reporter: {}", err),
        }
    }

    /// Stop polling. The last change is reported before the thread exits.
    pub fn stop(&self) {
        self.finish.store(true, Ordering::Relaxed);
        let Some(handle) = self.thread_handle.lock().unwrap().take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            debug!("state reporter stopped from its own callback");
            return;
        }
        if handle.join().is_err() {
            warn!("state reporter panicked");
        }
    }

    /// `false` once stopped, or once the observed mixer has been dropped.
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}
