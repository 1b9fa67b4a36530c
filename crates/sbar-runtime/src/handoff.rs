#![forbid(unsafe_code)]

//! Cross-thread execution handoff.
//!
//! A single shared slot carries one job at a time from any thread to the
//! loop thread. The caller installs its job, wakes the loop, and blocks
//! until the loop has run it and posted the outcome back into the slot.
//!
//! # Invariants
//!
//! 1. At most one job is outstanding. A second caller waits until the
//!    first has collected its result before installing its own job, so two
//!    jobs never interleave.
//! 2. A job's failure or panic is caught on the loop thread, logged, and
//!    returned to the caller as a [`HandoffError`]; it never unwinds the loop.
//! 3. Calling from the loop thread itself returns
//!    [`HandoffError::Reentrant`] without running the job (the loop is busy
//!    running the caller and would deadlock).
//! 4. After [`close`](Handoff::close) every pending and future call returns
//!    [`HandoffError::Closed`].

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use crate::clock::WakeSignal;
use crate::error::{TaskResult, panic_message};

/// A job handed to the loop thread.
pub type Job = Box<dyn FnOnce() -> TaskResult + Send + 'static>;

/// Why a handed-off job did not complete successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandoffError {
    /// The job ran and returned an error (its message).
    Failed(String),
    /// The job panicked (the panic message).
    Panicked(String),
    /// The loop is gone; the job did not run.
    Closed,
    /// Called from the loop thread; the job did not run.
    Reentrant,
}

impl fmt::Display for HandoffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(msg) => write!(f, "handed-off job failed: {msg}"),
            Self::Panicked(msg) => write!(f, "handed-off job panicked: {msg}"),
            Self::Closed => write!(f, "event loop closed before the job could run"),
            Self::Reentrant => write!(f, "cannot hand off a job from the loop thread"),
        }
    }
}

impl std::error::Error for HandoffError {}

#[derive(Default)]
struct Slot {
    job: Option<Job>,
    /// A caller owns the slot until it has collected its result.
    busy: bool,
    result: Option<Result<(), HandoffError>>,
    owner: Option<ThreadId>,
    closed: bool,
    completed: u64,
}

/// The shared single-job mailbox.
#[derive(Default)]
pub struct Handoff {
    slot: Mutex<Slot>,
    changed: Condvar,
}

impl Handoff {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, Slot>) -> MutexGuard<'a, Slot> {
        self.changed.wait(guard).unwrap_or_else(|e| e.into_inner())
    }

    /// Record the thread that runs jobs.
    pub(crate) fn set_owner(&self, owner: ThreadId) {
        self.lock().owner = Some(owner);
    }

    /// Install `job`, wake the owner via `wake`, and block for its outcome.
    pub fn execute_blocking(&self, job: Job, wake: &WakeSignal) -> Result<(), HandoffError> {
        let mut slot = self.lock();
        if slot.closed {
            return Err(HandoffError::Closed);
        }
        if slot.owner == Some(thread::current().id()) {
            tracing::debug!("handoff called from the loop thread; not running job");
            return Err(HandoffError::Reentrant);
        }
        loop {
            if slot.closed {
                return Err(HandoffError::Closed);
            }
            if !slot.busy {
                break;
            }
            slot = self.wait(slot);
        }

        slot.busy = true;
        slot.result = None;
        slot.job = Some(job);
        wake.wake();

        loop {
            if let Some(result) = slot.result.take() {
                slot.busy = false;
                self.changed.notify_all();
                return result;
            }
            if slot.closed {
                slot.job = None;
                slot.busy = false;
                self.changed.notify_all();
                return Err(HandoffError::Closed);
            }
            slot = self.wait(slot);
        }
    }

    /// Run the pending job, if any, on the calling (owner) thread.
    ///
    /// Returns `true` if a job ran.
    pub(crate) fn run_pending(&self) -> bool {
        let Some(job) = self.lock().job.take() else {
            return false;
        };
        let result = match panic::catch_unwind(AssertUnwindSafe(job)) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                tracing::error!(error = %err, "handed-off job failed");
                Err(HandoffError::Failed(err.to_string()))
            }
            Err(payload) => {
                let msg = panic_message(&*payload);
                tracing::error!(panic = %msg, "handed-off job panicked");
                Err(HandoffError::Panicked(msg))
            }
        };
        let mut slot = self.lock();
        slot.result = Some(result);
        slot.completed += 1;
        self.changed.notify_all();
        true
    }

    /// Whether a job is waiting to run.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.lock().job.is_some()
    }

    /// Number of jobs run so far.
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.lock().completed
    }

    /// Refuse further jobs and release every waiting caller.
    pub(crate) fn close(&self) {
        let mut slot = self.lock();
        slot.closed = true;
        self.changed.notify_all();
    }
}

impl fmt::Debug for Handoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.lock();
        f.debug_struct("Handoff")
            .field("pending", &slot.job.is_some())
            .field("busy", &slot.busy)
            .field("closed", &slot.closed)
            .field("completed", &slot.completed)
            .finish()
    }
}
