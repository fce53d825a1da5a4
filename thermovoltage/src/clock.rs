use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

// How often a pacing sleep checks whether the run has been interrupted.
const INTERRUPT_POLL: Duration = Duration::from_millis(50);

/// Time source for the sampling loop. `now` only has to be monotonic, the loop works with
/// differences from the first reading.
pub trait Clock {
    fn now(&self) -> Duration;

    /// Sleeps for `duration`, returning early once `interrupted` is set.
    fn sleep(&mut self, duration: Duration, interrupted: &AtomicBool);
}

pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&mut self, duration: Duration, interrupted: &AtomicBool) {
        let deadline = Instant::now() + duration;
        loop {
            if interrupted.load(Ordering::Relaxed) {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(INTERRUPT_POLL));
        }
    }
}

/// A clock that only moves when slept on.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Duration,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, duration: Duration) {
        self.now += duration;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now
    }

    fn sleep(&mut self, duration: Duration, _interrupted: &AtomicBool) {
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupted_sleep_returns_early() {
        let mut clock = SystemClock::new();
        let interrupted = AtomicBool::new(true);

        let started = Instant::now();
        clock.sleep(Duration::from_secs(30), &interrupted);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn manual_clock_moves_by_the_slept_amount() {
        let mut clock = ManualClock::new();
        let interrupted = AtomicBool::new(false);
        clock.sleep(Duration::from_millis(250), &interrupted);
        clock.sleep(Duration::from_millis(250), &interrupted);
        assert_eq!(clock.now(), Duration::from_millis(500));
    }
}
