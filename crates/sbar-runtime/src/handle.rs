#![forbid(unsafe_code)]

//! Thread-safe access to a running event loop.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use sbar_core::event::Event;

use crate::clock::WakeSignal;
use crate::error::TaskResult;
use crate::handoff::{Handoff, HandoffError};

#[derive(Debug, Default)]
struct Mailbox {
    events: VecDeque<Event>,
    stop: bool,
}

#[derive(Debug, Default)]
struct Shared {
    mailbox: Mutex<Mailbox>,
    wake: WakeSignal,
    handoff: Handoff,
}

/// A `Send + Sync` handle for posting events to the loop, stopping it, and
/// running jobs on its thread.
///
/// Every post wakes the loop, so events from other threads interleave with
/// timers without waiting for the next deadline.
#[derive(Clone, Default)]
pub struct LoopHandle {
    shared: Arc<Shared>,
}

impl LoopHandle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn mailbox(&self) -> MutexGuard<'_, Mailbox> {
        self.shared
            .mailbox
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Queue an event for dispatch on the loop thread.
    ///
    /// [`Event::Stop`] goes to the dedicated stop queue, which the loop
    /// checks before anything else.
    pub fn post(&self, event: Event) {
        {
            let mut mailbox = self.mailbox();
            if event.is_stop() {
                mailbox.stop = true;
            } else {
                mailbox.events.push_back(event);
            }
        }
        self.shared.wake.wake();
    }

    /// Ask the loop to stop by firing the stop event.
    pub fn stop(&self) {
        tracing::debug!("stop requested");
        self.post(Event::Stop);
    }

    /// Whether a stop is queued and not yet drained.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.mailbox().stop
    }

    /// Wake the loop without posting anything.
    pub fn wake(&self) {
        self.shared.wake.wake();
    }

    /// Number of queued non-stop events.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.mailbox().events.len()
    }

    /// Run `job` on the loop thread and block until it has finished.
    ///
    /// The job's error or panic comes back as a [`HandoffError`]. Calling
    /// this from the loop thread returns [`HandoffError::Reentrant`].
    pub fn execute_blocking<F>(&self, job: F) -> Result<(), HandoffError>
    where
        F: FnOnce() -> TaskResult + Send + 'static,
    {
        self.shared
            .handoff
            .execute_blocking(Box::new(job), &self.shared.wake)
    }

    pub(crate) fn take_stop(&self) -> bool {
        std::mem::take(&mut self.mailbox().stop)
    }

    pub(crate) fn drain_events(&self) -> VecDeque<Event> {
        std::mem::take(&mut self.mailbox().events)
    }

    pub(crate) fn wake_signal(&self) -> &WakeSignal {
        &self.shared.wake
    }

    pub(crate) fn handoff(&self) -> &Handoff {
        &self.shared.handoff
    }
}

impl fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mailbox = self.mailbox();
        f.debug_struct("LoopHandle")
            .field("pending_events", &mailbox.events.len())
            .field("stop", &mailbox.stop)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbar_core::event::PointerEvent;

    #[test]
    fn stop_goes_to_its_own_queue() {
        let handle = LoopHandle::new();
        handle.post(Event::Expose);
        handle.stop();
        assert!(handle.is_stop_requested());
        assert_eq!(handle.pending_events(), 1);
        assert!(handle.take_stop());
        assert!(!handle.is_stop_requested());
    }

    #[test]
    fn posts_wake_the_loop() {
        let handle = LoopHandle::new();
        handle.post(Event::Pointer(PointerEvent::motion(1, 1)));
        assert!(handle.wake_signal().take());
    }

    #[test]
    fn drain_preserves_order() {
        let handle = LoopHandle::new();
        handle.post(Event::User(1));
        handle.post(Event::User(2));
        let drained: Vec<Event> = handle.drain_events().into_iter().collect();
        assert_eq!(drained, vec![Event::User(1), Event::User(2)]);
        assert_eq!(handle.pending_events(), 0);
    }

    #[test]
    fn handle_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LoopHandle>();
    }
}
