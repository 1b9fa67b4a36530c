#![forbid(unsafe_code)]

//! Background work for blocks.
//!
//! A block that has to block (waiting on a child process, polling a slow
//! source) does so on a [`Worker`] thread. The worker never touches drawing
//! state. It stores its latest reading in a [`Shared`] cell and asks for a
//! repaint through a [`RedrawFlag`]; the block copies the reading out of the
//! cell when it draws.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use sbar_core::event::Event;

use crate::cancel::{CancelToken, CancelTrigger, Cancelled};
use crate::handle::LoopHandle;

/// A named background thread with a cancellation token.
///
/// Dropping the worker cancels it and joins the thread.
pub struct Worker {
    name: String,
    trigger: CancelTrigger,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn `f` on a new thread named `sbar-{name}`.
    ///
    /// `f` should return once its token is cancelled; returning
    /// `Err(Cancelled)` is the usual way out of a [`CancelToken::wait`].
    pub fn spawn<F>(name: impl Into<String>, handle: LoopHandle, f: F) -> io::Result<Self>
    where
        F: FnOnce(CancelToken, LoopHandle) -> Result<(), Cancelled> + Send + 'static,
    {
        let name = name.into();
        let (token, trigger) = CancelToken::new();
        let label = name.clone();
        let thread = thread::Builder::new()
            .name(format!("sbar-{name}"))
            .spawn(move || {
                tracing::debug!(worker = %label, "worker started");
                match f(token, handle) {
                    Ok(()) => tracing::debug!(worker = %label, "worker finished"),
                    Err(Cancelled) => tracing::debug!(worker = %label, "worker cancelled"),
                }
            })?;
        Ok(Self {
            name,
            trigger,
            thread: Some(thread),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request cancellation without waiting.
    pub fn cancel(&self) {
        self.trigger.cancel();
    }

    /// Whether the thread has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Cancel and wait for the thread. `Err` carries the thread's panic.
    pub fn join(mut self) -> thread::Result<()> {
        self.trigger.cancel();
        match self.thread.take() {
            Some(thread) => thread.join(),
            None => Ok(()),
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.trigger.cancel();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!(worker = %self.name, "worker thread panicked");
            }
        }
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// A block's "last known state", shared between its worker and the loop.
///
/// Keep critical sections short: copy data out, then release.
pub struct Shared<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(value)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the stored value.
    pub fn set(&self, value: T) {
        *self.lock() = value;
    }

    /// Mutate the stored value in place.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.lock())
    }

    /// Read the stored value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.lock())
    }

    /// Clone the stored value out.
    #[must_use]
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.lock().clone()
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Default> Default for Shared<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Shared").field(&*self.lock()).finish()
    }
}

/// Coalescing repaint request, usable from any thread.
///
/// The first [`request`](Self::request) after a repaint posts
/// [`Event::Expose`]; later requests are absorbed until the bar clears the
/// flag at the start of its next redraw.
#[derive(Clone)]
pub struct RedrawFlag {
    pending: Arc<AtomicBool>,
    handle: LoopHandle,
}

impl RedrawFlag {
    /// A flag posting to `handle`, sharing the `pending` bit with its owner.
    pub fn new(pending: Arc<AtomicBool>, handle: LoopHandle) -> Self {
        Self { pending, handle }
    }

    /// Ask for a repaint. Returns `true` if this call posted the event.
    pub fn request(&self) -> bool {
        if self.pending.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.handle.post(Event::Expose);
        true
    }

    /// Whether a repaint is pending.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

impl fmt::Debug for RedrawFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedrawFlag")
            .field("pending", &self.is_pending())
            .finish()
    }
}
