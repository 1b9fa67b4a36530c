#![forbid(unsafe_code)]

//! Time sources and the loop's wake primitive.
//!
//! The event loop never calls `Instant::now()` or sleeps directly; it asks
//! its [`Clock`]. [`SystemClock`] is wall time. [`ManualClock`] is simulated
//! time for deterministic tests: sleeping jumps straight to the deadline.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Wake-up signal for a sleeping event loop.
///
/// Setting the signal is sticky: a wake that arrives before the loop goes to
/// sleep makes the next sleep return immediately.
#[derive(Debug, Clone, Default)]
pub struct WakeSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl WakeSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake the loop (or make its next sleep return at once).
    pub fn wake(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(|e| e.into_inner()) = true;
        cvar.notify_all();
    }

    /// Consume a pending wake. Returns `true` if there was one.
    pub fn take(&self) -> bool {
        let (lock, _) = &*self.inner;
        std::mem::take(&mut *lock.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Whether a wake is pending, without consuming it.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Block until woken or `deadline` passes.
    ///
    /// Returns `true` if woken, `false` on timeout. Spurious condvar wakeups
    /// are absorbed.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let (lock, cvar) = &*self.inner;
        let mut woken = lock.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if *woken {
                *woken = false;
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = cvar
                .wait_timeout(woken, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            woken = guard;
        }
    }
}

/// Source of time for the event loop.
pub trait Clock {
    fn now(&self) -> Instant;

    /// Sleep until `deadline` unless `waker` fires first.
    ///
    /// Returns `true` if the sleep was cut short by a wake.
    fn sleep_until(&self, deadline: Instant, waker: &WakeSignal) -> bool;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep_until(&self, deadline: Instant, waker: &WakeSignal) -> bool {
        waker.wait_until(deadline)
    }
}

/// Simulated time. Clones share the same timeline.
///
/// Sleeping never blocks: a pending wake is consumed and reported, otherwise
/// the clock jumps forward to the deadline.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
    origin: Instant,
}

impl ManualClock {
    /// A clock starting at the current instant.
    #[must_use]
    pub fn new() -> Self {
        let origin = Instant::now();
        Self {
            now: Arc::new(Mutex::new(origin)),
            origin,
        }
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    /// Time elapsed since the clock was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.now() - self.origin
    }

    /// The instant the clock was created at.
    #[must_use]
    pub fn origin(&self) -> Instant {
        self.origin
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn sleep_until(&self, deadline: Instant, waker: &WakeSignal) -> bool {
        if waker.take() {
            return true;
        }
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        if deadline > *now {
            *now = deadline;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn wake_before_sleep_is_sticky() {
        let waker = WakeSignal::new();
        waker.wake();
        assert!(waker.is_pending());
        assert!(waker.wait_until(Instant::now() + Duration::from_secs(5)));
        assert!(!waker.is_pending());
    }

    #[test]
    fn wait_times_out() {
        let waker = WakeSignal::new();
        let start = Instant::now();
        assert!(!waker.wait_until(start + Duration::from_millis(10)));
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn wake_from_other_thread() {
        let waker = WakeSignal::new();
        let remote = waker.clone();
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            remote.wake();
        });
        assert!(waker.wait_until(Instant::now() + Duration::from_secs(10)));
        t.join().unwrap();
    }

    #[test]
    fn manual_clock_jumps_to_deadline() {
        let clock = ManualClock::new();
        let waker = WakeSignal::new();
        let deadline = clock.now() + Duration::from_millis(50);
        assert!(!clock.sleep_until(deadline, &waker));
        assert_eq!(clock.now(), deadline);
        assert_eq!(clock.elapsed(), Duration::from_millis(50));
    }

    #[test]
    fn manual_clock_reports_wake_without_advancing() {
        let clock = ManualClock::new();
        let waker = WakeSignal::new();
        waker.wake();
        let before = clock.now();
        assert!(clock.sleep_until(before + Duration::from_secs(1), &waker));
        assert_eq!(clock.now(), before);
    }

    #[test]
    fn manual_clock_never_goes_backwards() {
        let clock = ManualClock::new();
        clock.advance(Duration::from_millis(20));
        let past = clock.origin() + Duration::from_millis(5);
        clock.sleep_until(past, &WakeSignal::new());
        assert_eq!(clock.elapsed(), Duration::from_millis(20));
    }

    #[test]
    fn clones_share_time() {
        let a = ManualClock::new();
        let b = a.clone();
        a.advance(Duration::from_millis(7));
        assert_eq!(b.elapsed(), Duration::from_millis(7));
    }
}
