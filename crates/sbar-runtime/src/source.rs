#![forbid(unsafe_code)]

//! OS event sources that feed the event loop.
//!
//! Each source owns a helper thread that blocks on the OS and posts a
//! canonical [`Event`] through a [`LoopHandle`].

use std::io;
use std::process::Child;
use std::thread::{self, JoinHandle};

use sbar_core::event::Event;

use crate::handle::LoopHandle;

/// Delivers OS signals as [`Event::Signal`].
///
/// Dropping the source unregisters the signals and joins its thread.
#[cfg(unix)]
#[derive(Debug)]
pub struct SignalSource {
    handle: signal_hook::iterator::Handle,
    thread: Option<JoinHandle<()>>,
}

#[cfg(unix)]
impl SignalSource {
    /// Listen for `signals` and post each delivery to `target`.
    pub fn new(signals: &[i32], target: LoopHandle) -> io::Result<Self> {
        let mut iter = signal_hook::iterator::Signals::new(signals.iter().copied())
            .map_err(io::Error::other)?;
        let handle = iter.handle();
        let thread = thread::Builder::new()
            .name("sbar-signals".into())
            .spawn(move || {
                for signal in iter.forever() {
                    tracing::debug!(signal, "signal received");
                    target.post(Event::Signal(signal));
                }
            })?;
        tracing::debug!(?signals, "signal source installed");
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }

    /// SIGINT and SIGTERM, the signals that should stop the bar.
    pub fn termination(target: LoopHandle) -> io::Result<Self> {
        use signal_hook::consts::signal::{SIGINT, SIGTERM};
        Self::new(&[SIGINT, SIGTERM], target)
    }
}

#[cfg(unix)]
impl Drop for SignalSource {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Waits for a child process on a helper thread and posts
/// [`Event::ChildExited`] when it ends.
#[derive(Debug)]
pub struct ChildWatcher {
    tag: u64,
    pid: u32,
    thread: Option<JoinHandle<()>>,
}

impl ChildWatcher {
    /// Take ownership of `child` and watch it. `tag` is echoed in the event.
    pub fn spawn(tag: u64, mut child: Child, target: LoopHandle) -> io::Result<Self> {
        let pid = child.id();
        let thread = thread::Builder::new()
            .name(format!("sbar-child-{pid}"))
            .spawn(move || {
                let code = match child.wait() {
                    Ok(status) => status.code(),
                    Err(err) => {
                        tracing::warn!(pid, error = %err, "waiting on child failed");
                        None
                    }
                };
                tracing::debug!(pid, tag, ?code, "child exited");
                target.post(Event::ChildExited { tag, code });
            })?;
        Ok(Self {
            tag,
            pid,
            thread: Some(thread),
        })
    }

    #[must_use]
    pub fn tag(&self) -> u64 {
        self.tag
    }

    #[must_use]
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Block until the child has exited and its event was posted.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Command;

    #[test]
    fn child_exit_is_posted() {
        let handle = LoopHandle::new();
        let child = Command::new("sh").args(["-c", "exit 3"]).spawn().unwrap();
        let watcher = ChildWatcher::spawn(7, child, handle.clone()).unwrap();
        assert_eq!(watcher.tag(), 7);
        watcher.join();
        assert_eq!(
            handle.drain_events().pop_front(),
            Some(Event::ChildExited {
                tag: 7,
                code: Some(3)
            })
        );
    }

    #[test]
    fn raised_signal_is_posted() {
        use signal_hook::consts::signal::SIGUSR1;
        let handle = LoopHandle::new();
        let source = SignalSource::new(&[SIGUSR1], handle.clone()).unwrap();
        signal_hook::low_level::raise(SIGUSR1).unwrap();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while handle.pending_events() == 0 && std::time::Instant::now() < deadline {
            thread::yield_now();
        }
        drop(source);
        assert_eq!(handle.drain_events().pop_front(), Some(Event::Signal(SIGUSR1)));
    }
}
