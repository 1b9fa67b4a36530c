#![forbid(unsafe_code)]

//! The event loop: one thread owning the loop state, timed tasks, and event
//! dispatch.
//!
//! # Pump order
//!
//! Each [`pump`](EventLoop::pump):
//!
//! 1. If a stop is queued, runs the [`EventKind::Stop`] handlers, marks the
//!    loop stopped, and returns without touching timers.
//! 2. Sleeps until the earliest task is due, or until something wakes the
//!    loop (a posted event, a handed-off job).
//! 3. Pops every task due by now and runs it in `(due, sequence)` order.
//!    Tasks are always called directly, never through the executor. Tasks
//!    scheduled during this batch run on a later pump.
//! 4. Runs a pending cross-thread job, if any.
//! 5. Dispatches posted events in arrival order through the executor.
//! 6. Checks for a stop again.
//!
//! # Failure policy
//!
//! A failing task or handler goes to the loop's [`ErrorPolicy`]. The failed
//! task has already been popped, so the queue stays consistent either way.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Instant;

use sbar_core::event::{Event, EventKind};
use tracing::{debug_span, error, info};

use crate::clock::{Clock, SystemClock};
use crate::error::{ErrorPolicy, LoopError, TaskResult};
use crate::executor::{Executor, InlineExecutor};
use crate::handle::LoopHandle;
use crate::scheduler::{Due, HandlerId, Scheduler, TaskKind, next_due_after};

/// Outcome of one [`EventLoop::pump`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpStatus {
    /// More work may follow.
    Running,
    /// No tasks are scheduled and nothing is queued.
    Idle,
    /// The stop event was drained; the loop will do nothing further.
    Stopped,
}

/// Single-threaded event loop over state `S`.
///
/// Tasks and handlers receive `&mut S` and `&mut Scheduler<S>`, so they can
/// mutate the state and (re)schedule work without any locking.
pub struct EventLoop<S> {
    state: S,
    sched: Scheduler<S>,
    executor: Box<dyn Executor>,
    policy: ErrorPolicy,
    stopped: bool,
    started: bool,
}

impl<S> EventLoop<S> {
    /// A loop on wall-clock time.
    pub fn new(state: S) -> Self {
        Self::with_clock(state, SystemClock)
    }

    /// A loop on the given clock.
    ///
    /// The constructing thread owns the loop until a pump runs elsewhere.
    pub fn with_clock(state: S, clock: impl Clock + 'static) -> Self {
        let handle = LoopHandle::new();
        handle.handoff().set_owner(thread::current().id());
        Self {
            state,
            sched: Scheduler::new(Box::new(clock), handle),
            executor: Box::new(InlineExecutor),
            policy: ErrorPolicy::default(),
            stopped: false,
            started: false,
        }
    }

    /// Set how task and handler failures are treated.
    #[must_use]
    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the executor that runs event handlers.
    #[must_use]
    pub fn with_executor(mut self, executor: impl Executor + 'static) -> Self {
        self.executor = Box::new(executor);
        self
    }

    #[must_use]
    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    pub fn scheduler(&self) -> &Scheduler<S> {
        &self.sched
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler<S> {
        &mut self.sched
    }

    /// Borrow state and scheduler together, e.g. to install tasks that
    /// read the state while scheduling.
    pub fn split_mut(&mut self) -> (&mut S, &mut Scheduler<S>) {
        (&mut self.state, &mut self.sched)
    }

    /// A cloneable cross-thread handle.
    #[must_use]
    pub fn handle(&self) -> LoopHandle {
        self.sched.handle().clone()
    }

    /// Register a handler for events of `kind`.
    pub fn on<F>(&mut self, kind: EventKind, f: F) -> HandlerId
    where
        F: FnMut(&mut S, &mut Scheduler<S>, &Event) -> TaskResult + 'static,
    {
        self.sched.on(kind, f)
    }

    /// Unregister a handler.
    pub fn off(&mut self, id: HandlerId) -> bool {
        self.sched.off(id)
    }

    /// Fire the stop event. The next pump drains it.
    pub fn stop(&self) {
        self.sched.stop();
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Run until stopped, until no tasks remain, or until a failure is
    /// propagated by [`ErrorPolicy::StopAndPropagate`].
    pub fn run(&mut self) -> Result<(), LoopError> {
        loop {
            match self.pump()? {
                PumpStatus::Running => {}
                PumpStatus::Idle => {
                    info!("event loop idle, no tasks left");
                    return Ok(());
                }
                PumpStatus::Stopped => return Ok(()),
            }
        }
    }

    /// One iteration of the loop.
    pub fn pump(&mut self) -> Result<PumpStatus, LoopError> {
        if self.stopped {
            return Ok(PumpStatus::Stopped);
        }
        if !self.started {
            self.started = true;
            info!(
                tasks = self.sched.len(),
                policy = ?self.policy,
                "event loop started"
            );
        }
        self.sched.handle().handoff().set_owner(thread::current().id());

        let _span = debug_span!(
            "sbar.pump",
            duration_us = tracing::field::Empty,
            tasks = tracing::field::Empty
        )
        .entered();
        let start = Instant::now();
        let result = self.pump_inner();
        tracing::Span::current().record("duration_us", start.elapsed().as_micros() as u64);

        match result {
            Ok(status) => Ok(status),
            Err(err) => {
                // Only StopAndPropagate surfaces errors here.
                if !self.stopped {
                    self.sched.stop();
                    if let Err(again) = self.drain_stop() {
                        error!(error = %again, "stop handler failed while stopping after an error");
                    }
                }
                Err(err)
            }
        }
    }

    fn pump_inner(&mut self) -> Result<PumpStatus, LoopError> {
        if self.sched.handle().take_stop() {
            self.drain_stop()?;
            return Ok(PumpStatus::Stopped);
        }

        if let Some(deadline) = self.sched.next_due() {
            if deadline > self.sched.now() {
                let wake = self.sched.handle().wake_signal().clone();
                self.sched.clock().sleep_until(deadline, &wake);
            }
        }

        let now = self.sched.now();
        let due = self.sched.pop_due(now);
        tracing::Span::current().record("tasks", due.len());
        let mut due = due.into_iter();
        while let Some(entry) = due.next() {
            if let Err(err) = self.run_task(entry) {
                if let Err(err) = self.fail(err) {
                    // The rest of the batch stays queued at its original slot.
                    for rest in due {
                        self.sched.requeue(rest);
                    }
                    return Err(err);
                }
            }
        }

        self.sched.handle().handoff().run_pending();

        let events = self.sched.handle().drain_events();
        for event in &events {
            self.dispatch(event)?;
        }

        if self.sched.handle().take_stop() {
            self.drain_stop()?;
            return Ok(PumpStatus::Stopped);
        }

        let handle = self.sched.handle();
        if self.sched.is_empty() && handle.pending_events() == 0 && !handle.handoff().has_pending()
        {
            Ok(PumpStatus::Idle)
        } else {
            Ok(PumpStatus::Running)
        }
    }

    fn run_task(&mut self, due: Due) -> Result<(), LoopError> {
        // Cancelled by an earlier task of the same batch.
        let Some(mut task) = self.sched.begin(due.id) else {
            return Ok(());
        };
        let fired = self.sched.now();
        let delta = fired.saturating_duration_since(task.last);
        task.last = fired;
        tracing::trace!(
            task = %due.id,
            delta_us = delta.as_micros() as u64,
            "task fired"
        );

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            (task.callback)(&mut self.state, &mut self.sched, delta)
        }));

        // Runs on unwind too, so a panicking task never stays marked running.
        let cancelled = self.sched.end();
        if let TaskKind::Repeated { interval } = task.kind {
            if !cancelled {
                let next = next_due_after(due.at, interval, self.sched.now());
                self.sched.enqueue(due.id, next, task);
            }
        }
        match outcome {
            Ok(result) => result.map_err(|source| LoopError::Task { id: due.id, source }),
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    fn dispatch(&mut self, event: &Event) -> Result<(), LoopError> {
        let kind = event.kind();
        let mut handlers = self.sched.take_handlers(kind);
        let mut outcome = Ok(());
        for handler in &mut handlers {
            // Removed by an earlier handler of this dispatch.
            if !self.sched.is_registered(handler.id) {
                continue;
            }
            let state = &mut self.state;
            let sched = &mut self.sched;
            let callback = &mut handler.callback;
            let result = self
                .executor
                .execute(&mut || callback(&mut *state, &mut *sched, event));
            if let Err(source) = result {
                let err = LoopError::Handler {
                    id: handler.id,
                    kind,
                    source,
                };
                if let Err(err) = self.fail(err) {
                    outcome = Err(err);
                    break;
                }
            }
        }
        self.sched.restore_handlers(kind, handlers);
        outcome
    }

    fn drain_stop(&mut self) -> Result<(), LoopError> {
        self.sched.handle().take_stop();
        self.stopped = true;
        info!(
            handlers = self.sched.handler_count(EventKind::Stop),
            "event loop stopping"
        );
        self.dispatch(&Event::Stop)
    }

    fn fail(&mut self, err: LoopError) -> Result<(), LoopError> {
        match self.policy {
            ErrorPolicy::LogAndContinue => {
                error!(error = %err, "continuing after failure");
                Ok(())
            }
            ErrorPolicy::StopAndPropagate => {
                error!(error = %err, "stopping after failure");
                Err(err)
            }
        }
    }
}

impl<S> Drop for EventLoop<S> {
    fn drop(&mut self) {
        self.sched.handle().handoff().close();
    }
}

impl<S> fmt::Debug for EventLoop<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("scheduler", &self.sched)
            .field("policy", &self.policy)
            .field("stopped", &self.stopped)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::TaskError;
    use std::time::Duration;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn stop_drains_before_timers() {
        let clock = ManualClock::new();
        let mut ev = EventLoop::with_clock(Vec::<&str>::new(), clock.clone());
        ev.scheduler_mut().schedule_now(|log, _, _| {
            log.push("task");
            Ok(())
        });
        ev.on(EventKind::Stop, |log, _, _| {
            log.push("stop");
            Ok(())
        });
        ev.stop();
        assert_eq!(ev.pump().unwrap(), PumpStatus::Stopped);
        assert_eq!(ev.state(), &vec!["stop"]);
        assert!(ev.is_stopped());
        assert_eq!(ev.pump().unwrap(), PumpStatus::Stopped);
    }

    #[test]
    fn stop_from_task_runs_stop_handlers_in_same_pump() {
        let clock = ManualClock::new();
        let mut ev = EventLoop::with_clock(0u32, clock);
        ev.scheduler_mut().schedule_now(|_, s, _| {
            s.stop();
            Ok(())
        });
        ev.on(EventKind::Stop, |n, _, _| {
            *n += 1;
            Ok(())
        });
        assert_eq!(ev.pump().unwrap(), PumpStatus::Stopped);
        assert_eq!(*ev.state(), 1);
    }

    #[test]
    fn run_returns_when_tasks_run_out() {
        let clock = ManualClock::new();
        let mut ev = EventLoop::with_clock(0u32, clock.clone());
        ev.scheduler_mut().schedule_after(ms(30), |n, _, _| {
            *n += 1;
            Ok(())
        });
        ev.run().unwrap();
        assert_eq!(*ev.state(), 1);
        assert_eq!(clock.elapsed(), ms(30));
    }

    #[test]
    fn events_dispatch_in_order() {
        let clock = ManualClock::new();
        let mut ev = EventLoop::with_clock(Vec::<u32>::new(), clock);
        ev.on(EventKind::User, |log, _, e| {
            if let Event::User(n) = e {
                log.push(*n);
            }
            Ok(())
        });
        let handle = ev.handle();
        handle.post(Event::User(1));
        handle.post(Event::User(2));
        assert_eq!(ev.pump().unwrap(), PumpStatus::Idle);
        assert_eq!(ev.state(), &vec![1, 2]);
    }

    #[test]
    fn handler_added_during_dispatch_runs_next_time() {
        let clock = ManualClock::new();
        let mut ev = EventLoop::with_clock(Vec::<&str>::new(), clock);
        ev.on(EventKind::Expose, |log, s, _| {
            log.push("first");
            if log.len() == 1 {
                s.on(EventKind::Expose, |log, _, _| {
                    log.push("late");
                    Ok(())
                });
            }
            Ok(())
        });
        let handle = ev.handle();
        handle.post(Event::Expose);
        ev.pump().unwrap();
        assert_eq!(ev.state(), &vec!["first"]);
        handle.post(Event::Expose);
        ev.pump().unwrap();
        assert_eq!(ev.state(), &vec!["first", "first", "late"]);
    }

    #[test]
    fn handler_can_remove_itself() {
        let clock = ManualClock::new();
        let mut ev = EventLoop::with_clock(0u32, clock);
        let id = std::rc::Rc::new(std::cell::Cell::new(None));
        let own = id.clone();
        let registered = ev.on(EventKind::User, move |n, s, _| {
            *n += 1;
            if let Some(me) = own.get() {
                s.off(me);
            }
            Ok(())
        });
        id.set(Some(registered));
        let handle = ev.handle();
        handle.post(Event::User(0));
        handle.post(Event::User(0));
        ev.pump().unwrap();
        assert_eq!(*ev.state(), 1);
        assert_eq!(ev.scheduler().handler_count(EventKind::User), 0);
    }

    #[test]
    fn task_error_stops_and_propagates() {
        let clock = ManualClock::new();
        let mut ev = EventLoop::with_clock(Vec::<&str>::new(), clock);
        let bad = ev
            .scheduler_mut()
            .schedule_now(|_, _, _| Err(TaskError::msg("broken")));
        ev.on(EventKind::Stop, |log, _, _| {
            log.push("stop");
            Ok(())
        });
        let err = ev.run().unwrap_err();
        assert!(matches!(err, LoopError::Task { id, .. } if id == bad));
        assert_eq!(err.task_error().message(), "broken");
        assert!(ev.is_stopped());
        assert_eq!(ev.state(), &vec!["stop"]);
    }

    #[test]
    fn log_and_continue_keeps_running() {
        let clock = ManualClock::new();
        let mut ev =
            EventLoop::with_clock(0u32, clock).with_policy(ErrorPolicy::LogAndContinue);
        ev.scheduler_mut().schedule_every(ms(10), |n, s, _| {
            *n += 1;
            if *n == 3 {
                s.stop();
            }
            Err(TaskError::msg("flaky"))
        });
        ev.run().unwrap();
        assert_eq!(*ev.state(), 3);
    }

    #[test]
    fn handler_panic_caught_by_executor() {
        let clock = ManualClock::new();
        let mut ev = EventLoop::with_clock((), clock)
            .with_executor(crate::executor::CatchUnwindExecutor);
        ev.on(EventKind::User, |_, _, _| -> TaskResult { panic!("in handler") });
        ev.handle().post(Event::User(9));
        let err = ev.pump().unwrap_err();
        assert!(matches!(err, LoopError::Handler { kind: EventKind::User, .. }));
        assert_eq!(err.task_error().message(), "handler panicked: in handler");
        assert!(ev.is_stopped());
    }

    #[test]
    fn tasks_scheduled_in_a_batch_wait_for_next_pump() {
        let clock = ManualClock::new();
        let mut ev = EventLoop::with_clock(Vec::<&str>::new(), clock);
        ev.scheduler_mut().schedule_now(|log, s, _| {
            log.push("outer");
            s.schedule_now(|log, _, _| {
                log.push("inner");
                Ok(())
            });
            Ok(())
        });
        assert_eq!(ev.pump().unwrap(), PumpStatus::Running);
        assert_eq!(ev.state(), &vec!["outer"]);
        assert_eq!(ev.pump().unwrap(), PumpStatus::Idle);
        assert_eq!(ev.state(), &vec!["outer", "inner"]);
    }

    #[test]
    fn repeated_task_can_cancel_itself() {
        let clock = ManualClock::new();
        let mut ev = EventLoop::with_clock(0u32, clock);
        let id = std::rc::Rc::new(std::cell::Cell::new(None));
        let own = id.clone();
        let task = ev.scheduler_mut().schedule_every(ms(5), move |n, s, _| {
            *n += 1;
            if *n == 2 {
                if let Some(me) = own.get() {
                    assert!(s.cancel(me));
                }
            }
            Ok(())
        });
        id.set(Some(task));
        ev.run().unwrap();
        assert_eq!(*ev.state(), 2);
        assert!(!ev.scheduler().is_scheduled(task));
    }

    #[test]
    fn failed_task_leaves_rest_of_batch_queued() {
        let clock = ManualClock::new();
        let mut ev = EventLoop::with_clock(0u32, clock);
        let t0 = ev.scheduler().now();
        ev.scheduler_mut()
            .schedule_now(|_, _, _| Err(TaskError::msg("first fails")));
        let second = ev.scheduler_mut().schedule_now(|n, _, _| {
            *n += 1;
            Ok(())
        });

        let err = ev.pump().unwrap_err();
        assert_eq!(err.task_error().message(), "first fails");
        assert_eq!(*ev.state(), 0);
        assert!(ev.scheduler().is_scheduled(second));
        assert_eq!(ev.scheduler().len(), 1);
        assert_eq!(ev.scheduler_mut().next_due(), Some(t0));
    }

    #[test]
    fn panicking_task_is_not_left_running() {
        let clock = ManualClock::new();
        let mut ev = EventLoop::with_clock(0u32, clock);
        let oneshot = ev
            .scheduler_mut()
            .schedule_now(|_, _, _| -> TaskResult { panic!("oneshot blew up") });
        let repeated = ev.scheduler_mut().schedule_every(ms(10), |n, _, _| {
            *n += 1;
            if *n == 1 {
                panic!("repeated blew up");
            }
            Ok(())
        });

        let first = std::panic::catch_unwind(AssertUnwindSafe(|| ev.pump()));
        assert!(first.is_err());
        assert!(!ev.scheduler().is_scheduled(oneshot));
        assert_eq!(ev.scheduler().len(), 1);

        let second = std::panic::catch_unwind(AssertUnwindSafe(|| ev.pump()));
        assert!(second.is_err());
        assert!(ev.scheduler().is_scheduled(repeated));
        assert_eq!(ev.scheduler().len(), 1);

        ev.pump().unwrap();
        assert_eq!(*ev.state(), 2);
        assert_eq!(ev.scheduler().len(), 1);
    }

    #[test]
    fn handoff_before_first_pump_is_reentrant() {
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let ev = EventLoop::with_clock((), ManualClock::new());
            let _ = tx.send(ev.handle().execute_blocking(|| Ok(())));
        });
        let result = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("handoff on the owning thread returned");
        assert_eq!(result, Err(crate::handoff::HandoffError::Reentrant));
    }

    #[test]
    fn drop_closes_handoff() {
        let clock = ManualClock::new();
        let ev = EventLoop::with_clock((), clock);
        let handle = ev.handle();
        drop(ev);
        assert_eq!(
            handle.execute_blocking(|| Ok(())),
            Err(crate::handoff::HandoffError::Closed)
        );
    }
}
