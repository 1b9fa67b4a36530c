#![forbid(unsafe_code)]

//! Cooperative cancellation for background work.
//!
//! A [`CancelTrigger`] and any number of [`CancelToken`] clones share one
//! flag. Work running on a background thread polls the token or sleeps on it
//! with [`CancelToken::wait`], which returns early with [`Cancelled`] once
//! the trigger fires. Nothing is ever preempted.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// The operation observed a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("operation cancelled")
    }
}

impl std::error::Error for Cancelled {}

type Flag = Arc<(Mutex<bool>, Condvar)>;

/// Observer side of a cancellation pair.
#[derive(Clone)]
pub struct CancelToken {
    inner: Flag,
}

impl CancelToken {
    /// Create a linked (token, trigger) pair.
    #[must_use]
    pub fn new() -> (Self, CancelTrigger) {
        let inner: Flag = Arc::new((Mutex::new(false), Condvar::new()));
        let token = Self {
            inner: inner.clone(),
        };
        (token, CancelTrigger { inner })
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// `Err(Cancelled)` if cancellation was requested.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep for `timeout` unless cancelled first.
    ///
    /// Returns `Ok(())` when the full timeout elapsed and `Err(Cancelled)`
    /// as soon as cancellation is observed (immediately if it already was).
    pub fn wait(&self, timeout: Duration) -> Result<(), Cancelled> {
        let (lock, cvar) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut cancelled = lock.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if *cancelled {
                return Err(Cancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            let (guard, _) = cvar
                .wait_timeout(cancelled, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            cancelled = guard;
        }
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Requesting side of a cancellation pair.
pub struct CancelTrigger {
    inner: Flag,
}

impl CancelTrigger {
    /// Request cancellation and wake every waiter. Idempotent.
    pub fn cancel(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(|e| e.into_inner()) = true;
        cvar.notify_all();
    }

    /// A new token observing this trigger.
    #[must_use]
    pub fn token(&self) -> CancelToken {
        CancelToken {
            inner: self.inner.clone(),
        }
    }
}

impl fmt::Debug for CancelTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelTrigger").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn wait_times_out_when_not_cancelled() {
        let (token, _trigger) = CancelToken::new();
        let start = Instant::now();
        assert_eq!(token.wait(Duration::from_millis(10)), Ok(()));
        assert!(start.elapsed() >= Duration::from_millis(10));
        assert!(token.check().is_ok());
    }

    #[test]
    fn cancel_wakes_waiter() {
        let (token, trigger) = CancelToken::new();
        let waiter = thread::spawn(move || token.wait(Duration::from_secs(30)));
        thread::sleep(Duration::from_millis(10));
        trigger.cancel();
        assert_eq!(waiter.join().unwrap(), Err(Cancelled));
    }

    #[test]
    fn already_cancelled_returns_immediately() {
        let (token, trigger) = CancelToken::new();
        trigger.cancel();
        trigger.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.check(), Err(Cancelled));
        assert_eq!(token.wait(Duration::from_secs(30)), Err(Cancelled));
        assert!(trigger.token().is_cancelled());
    }
}
