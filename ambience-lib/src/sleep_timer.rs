//! Cancellable single-shot countdown that stops playback once it elapses.

use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};

/// Observable state of the sleep timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepTimerState {
    Idle,
    Armed { fire_at: Instant },
}

#[derive(Debug, Default)]
struct TimerSlot {
    /// Bumped by every arm and cancel; a countdown only fires for its own.
    generation: u64,
    fire_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct TimerShared {
    slot: Mutex<TimerSlot>,
    wake: Condvar,
}

type FireCallback = Arc<dyn Fn() + Send + Sync>;

/// Longest countdown honoured; longer delays are shortened to this.
pub const MAX_DELAY: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Single pending fire at most; re-arming replaces the previous countdown.
pub struct SleepTimer {
    shared: Arc<TimerShared>,
    on_fire: FireCallback,
}

impl SleepTimer {
    pub fn new<F>(on_fire: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            shared: Arc::new(TimerShared::default()),
            on_fire: Arc::new(on_fire),
        }
    }

    /// Arm for `minutes`. `0` turns the timer off.
    pub fn arm_minutes(&self, minutes: u32) {
        self.arm(Duration::from_secs(u64::from(minutes) * 60));
    }

    /// Arm for `delay`, replacing any pending countdown. A zero delay cancels.
    ///
    /// Delays beyond [`MAX_DELAY`] are capped.
    pub fn arm(&self, delay: Duration) {
        if delay.is_zero() {
            self.cancel();
            return;
        }

        let now = Instant::now();
        let mut delay = delay.min(MAX_DELAY);
        // The representable range of `Instant` is platform dependent.
        let fire_at = loop {
            if let Some(fire_at) = now.checked_add(delay) {
                break fire_at;
            }
            delay /= 2;
        };
        let generation = {
            let mut slot = self.shared.slot.lock().unwrap();
            slot.generation += 1;
            slot.fire_at = Some(fire_at);
            slot.generation
        };
        self.shared.wake.notify_all();
        info!("sleep timer armed for {:.1}s", delay.as_secs_f32());

        let shared = self.shared.clone();
        let on_fire = self.on_fire.clone();
        thread::spawn(move || run_countdown(&shared, &on_fire, generation));
    }

    /// Disarm without firing. A fire that has already begun is not undone.
    pub fn cancel(&self) {
        let was_armed = {
            let mut slot = self.shared.slot.lock().unwrap();
            slot.generation += 1;
            slot.fire_at.take().is_some()
        };
        self.shared.wake.notify_all();
        if was_armed {
            info!("sleep timer cancelled");
        }
    }

    pub fn state(&self) -> SleepTimerState {
        match self.shared.slot.lock().unwrap().fire_at {
            Some(fire_at) => SleepTimerState::Armed { fire_at },
            None => SleepTimerState::Idle,
        }
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state(), SleepTimerState::Armed { .. })
    }

    /// Time left before the timer fires, `None` when idle.
    pub fn remaining(&self) -> Option<Duration> {
        self.shared
            .slot
            .lock()
            .unwrap()
            .fire_at
            .map(|fire_at| fire_at.saturating_duration_since(Instant::now()))
    }
}

impl Drop for SleepTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn run_countdown(shared: &TimerShared, on_fire: &FireCallback, generation: u64) {
    let mut slot = shared.slot.lock().unwrap();
    loop {
        if slot.generation != generation {
            debug!("sleep timer countdown {} replaced", generation);
            return;
        }
        let Some(fire_at) = slot.fire_at else {
            return;
        };
        let now = Instant::now();
        if now >= fire_at {
            break;
        }
        slot = shared.wake.wait_timeout(slot, fire_at - now).unwrap().0;
    }
    slot.fire_at = None;
    drop(slot);

    info!("sleep timer fired");
    on_fire();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_timer() -> (SleepTimer, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let timer = SleepTimer::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (timer, fired)
    }

    #[test]
    fn fires_exactly_once_and_returns_to_idle() {
        let (timer, fired) = counting_timer();
        timer.arm(Duration::from_millis(50));
        assert!(timer.is_armed());

        thread::sleep(Duration::from_millis(200));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(timer.state(), SleepTimerState::Idle);
        assert_eq!(timer.remaining(), None);
    }

    #[test]
    fn cancel_prevents_fire() {
        let (timer, fired) = counting_timer();
        timer.arm(Duration::from_millis(80));
        thread::sleep(Duration::from_millis(20));
        timer.cancel();

        thread::sleep(Duration::from_millis(150));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(timer.state(), SleepTimerState::Idle);
    }

    #[test]
    fn arming_zero_minutes_is_cancel() {
        let (timer, fired) = counting_timer();
        timer.arm(Duration::from_millis(60));
        timer.arm_minutes(0);
        assert_eq!(timer.state(), SleepTimerState::Idle);

        thread::sleep(Duration::from_millis(150));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn rearming_replaces_the_pending_countdown() {
        let (timer, fired) = counting_timer();
        let started = Instant::now();
        timer.arm(Duration::from_millis(400));
        thread::sleep(Duration::from_millis(50));
        timer.arm(Duration::from_millis(150));

        // Second arm fires around 200ms, well before the first would have.
        while fired.load(Ordering::SeqCst) == 0 && started.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(5));
        }
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(190), "fired at {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(350), "fired at {:?}", elapsed);

        thread::sleep(Duration::from_millis(300));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn oversized_delays_are_capped() {
        let (timer, fired) = counting_timer();
        timer.arm(Duration::MAX);
        assert!(timer.is_armed());
        let remaining = timer.remaining().unwrap();
        assert!(remaining <= MAX_DELAY);
        assert!(remaining > MAX_DELAY - Duration::from_secs(60));

        timer.arm_minutes(u32::MAX);
        assert!(timer.remaining().unwrap() <= MAX_DELAY);
        timer.cancel();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn remaining_counts_down() {
        let (timer, _) = counting_timer();
        timer.arm_minutes(15);
        let first = timer.remaining().unwrap();
        assert!(first <= Duration::from_secs(15 * 60));
        assert!(first > Duration::from_secs(14 * 60));

        thread::sleep(Duration::from_millis(20));
        assert!(timer.remaining().unwrap() < first);
        timer.cancel();
        assert_eq!(timer.remaining(), None);
    }
}
