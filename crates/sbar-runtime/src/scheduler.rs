#![forbid(unsafe_code)]

//! Timed task queue and event handler table.
//!
//! The [`Scheduler`] is the part of the event loop that tasks and handlers
//! can reach: they receive `&mut Scheduler<S>` and use it to schedule or
//! cancel tasks, register handlers, post events, and request a stop.
//!
//! # Task kinds
//!
//! - **Oneshot**: runs once, eligible immediately.
//! - **Timed**: runs once at an absolute instant.
//! - **Repeated**: runs at `first, first + interval, ...`. Firing never
//!   removes it. After each run the next due time is advanced past the
//!   current time by whole intervals, so a consumer that fell behind gets
//!   one call (with the true elapsed time as its delta), never a burst.
//!
//! # Ordering
//!
//! Tasks are kept in a min-heap keyed by `(due, sequence)`. Ties run in the
//! order they were (re)scheduled. Cancellation is lazy: the heap entry stays
//! and is skipped when it surfaces.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::fmt;
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;
use sbar_core::event::{Event, EventKind};
use smallvec::SmallVec;

use crate::clock::Clock;
use crate::error::TaskResult;
use crate::handle::LoopHandle;

/// Shortest accepted repeat interval.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Identity of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a registered event handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

/// How a task is (re)scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Oneshot,
    Timed,
    Repeated { interval: Duration },
}

/// Task callback: loop state, scheduler, and time since the task was
/// created (first run) or last fired.
pub type TaskFn<S> = dyn FnMut(&mut S, &mut Scheduler<S>, Duration) -> TaskResult;

/// Event handler callback.
pub type HandlerFn<S> = dyn FnMut(&mut S, &mut Scheduler<S>, &Event) -> TaskResult;

pub(crate) struct Task<S> {
    pub(crate) kind: TaskKind,
    pub(crate) callback: Box<TaskFn<S>>,
    /// Creation time, then the start time of the latest firing.
    pub(crate) last: Instant,
}

pub(crate) struct Handler<S> {
    pub(crate) id: HandlerId,
    pub(crate) callback: Box<HandlerFn<S>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct Due {
    pub(crate) at: Instant,
    seq: u64,
    pub(crate) id: TaskId,
}

/// Tasks, handlers, and the loop's outward handle.
pub struct Scheduler<S> {
    clock: Box<dyn Clock>,
    handle: LoopHandle,
    queue: BinaryHeap<Reverse<Due>>,
    tasks: FxHashMap<TaskId, Task<S>>,
    handlers: BTreeMap<EventKind, Vec<Handler<S>>>,
    handler_kinds: FxHashMap<HandlerId, EventKind>,
    next_task: u64,
    next_handler: u64,
    seq: u64,
    running: Option<TaskId>,
    running_kind: Option<TaskKind>,
    running_cancelled: bool,
}

impl<S> Scheduler<S> {
    pub(crate) fn new(clock: Box<dyn Clock>, handle: LoopHandle) -> Self {
        Self {
            clock,
            handle,
            queue: BinaryHeap::new(),
            tasks: FxHashMap::default(),
            handlers: BTreeMap::new(),
            handler_kinds: FxHashMap::default(),
            next_task: 1,
            next_handler: 1,
            seq: 0,
            running: None,
            running_kind: None,
            running_cancelled: false,
        }
    }

    /// Current time according to the loop's clock.
    #[inline]
    #[must_use]
    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        &*self.clock
    }

    /// A cloneable handle usable from other threads.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> &LoopHandle {
        &self.handle
    }

    /// Queue an event; it is dispatched on a later pump.
    pub fn post(&self, event: Event) {
        self.handle.post(event);
    }

    /// Fire the stop event.
    pub fn stop(&self) {
        self.handle.stop();
    }

    // ------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------

    /// Run `f` once, as soon as possible.
    pub fn schedule_now<F>(&mut self, f: F) -> TaskId
    where
        F: FnMut(&mut S, &mut Scheduler<S>, Duration) -> TaskResult + 'static,
    {
        let now = self.now();
        self.insert(TaskKind::Oneshot, now, Box::new(f))
    }

    /// Run `f` once at `at` (immediately if `at` is in the past).
    pub fn schedule_at<F>(&mut self, at: Instant, f: F) -> TaskId
    where
        F: FnMut(&mut S, &mut Scheduler<S>, Duration) -> TaskResult + 'static,
    {
        self.insert(TaskKind::Timed, at, Box::new(f))
    }

    /// Run `f` once after `delay`.
    pub fn schedule_after<F>(&mut self, delay: Duration, f: F) -> TaskId
    where
        F: FnMut(&mut S, &mut Scheduler<S>, Duration) -> TaskResult + 'static,
    {
        let at = self.now() + delay;
        self.schedule_at(at, f)
    }

    /// Run `f` every `interval`, first after one interval.
    ///
    /// Intervals shorter than [`MIN_INTERVAL`] are raised to it.
    pub fn schedule_every<F>(&mut self, interval: Duration, f: F) -> TaskId
    where
        F: FnMut(&mut S, &mut Scheduler<S>, Duration) -> TaskResult + 'static,
    {
        let interval = interval.max(MIN_INTERVAL);
        let first = self.now() + interval;
        self.schedule_every_from(first, interval, f)
    }

    /// Run `f` every `interval`, first at `first`.
    pub fn schedule_every_from<F>(&mut self, first: Instant, interval: Duration, f: F) -> TaskId
    where
        F: FnMut(&mut S, &mut Scheduler<S>, Duration) -> TaskResult + 'static,
    {
        let interval = interval.max(MIN_INTERVAL);
        self.insert(TaskKind::Repeated { interval }, first, Box::new(f))
    }

    fn insert(&mut self, kind: TaskKind, at: Instant, callback: Box<TaskFn<S>>) -> TaskId {
        let id = TaskId(self.next_task);
        self.next_task += 1;
        let task = Task {
            kind,
            callback,
            last: self.now(),
        };
        tracing::debug!(task = %id, kind = ?kind, "task scheduled");
        self.enqueue(id, at, task);
        id
    }

    pub(crate) fn enqueue(&mut self, id: TaskId, at: Instant, task: Task<S>) {
        let seq = self.seq;
        self.seq += 1;
        self.tasks.insert(id, task);
        self.queue.push(Reverse(Due { at, seq, id }));
    }

    /// Cancel a task. Returns `false` if it already finished or was
    /// cancelled.
    ///
    /// A repeated task may cancel itself from inside its own callback.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        if self.running == Some(id) {
            let first = !self.running_cancelled;
            self.running_cancelled = true;
            tracing::debug!(task = %id, "running task cancelled");
            return first;
        }
        let removed = self.tasks.remove(&id).is_some();
        if removed {
            tracing::debug!(task = %id, "task cancelled");
        }
        removed
    }

    /// Whether `id` will fire again.
    #[must_use]
    pub fn is_scheduled(&self, id: TaskId) -> bool {
        if self.running == Some(id) {
            return !self.running_cancelled
                && matches!(self.running_kind, Some(TaskKind::Repeated { .. }));
        }
        self.tasks.contains_key(&id)
    }

    /// Number of live tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len() + usize::from(self.running.is_some())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Due time of the earliest live task.
    pub fn next_due(&mut self) -> Option<Instant> {
        self.purge_cancelled();
        self.queue.peek().map(|Reverse(due)| due.at)
    }

    fn purge_cancelled(&mut self) {
        while let Some(Reverse(top)) = self.queue.peek() {
            if self.tasks.contains_key(&top.id) {
                break;
            }
            self.queue.pop();
        }
    }

    /// Pop every live entry due at or before `now`, in firing order.
    pub(crate) fn pop_due(&mut self, now: Instant) -> SmallVec<[Due; 8]> {
        let mut due = SmallVec::new();
        while let Some(Reverse(top)) = self.queue.peek() {
            if top.at > now {
                break;
            }
            let top = *top;
            self.queue.pop();
            if self.tasks.contains_key(&top.id) {
                due.push(top);
            }
        }
        due
    }

    /// Put back an entry popped by [`pop_due`](Self::pop_due) but not run.
    pub(crate) fn requeue(&mut self, due: Due) {
        if self.tasks.contains_key(&due.id) {
            self.queue.push(Reverse(due));
        }
    }

    /// Take a task out of the table for invocation.
    pub(crate) fn begin(&mut self, id: TaskId) -> Option<Task<S>> {
        let task = self.tasks.remove(&id)?;
        self.running = Some(id);
        self.running_kind = Some(task.kind);
        self.running_cancelled = false;
        Some(task)
    }

    /// Finish an invocation. Returns `true` if the task cancelled itself.
    pub(crate) fn end(&mut self) -> bool {
        self.running = None;
        self.running_kind = None;
        std::mem::take(&mut self.running_cancelled)
    }

    // ------------------------------------------------------------------
    // Handlers
    // ------------------------------------------------------------------

    /// Register `f` for events of `kind`. Handlers for one kind run in
    /// registration order.
    pub fn on<F>(&mut self, kind: EventKind, f: F) -> HandlerId
    where
        F: FnMut(&mut S, &mut Scheduler<S>, &Event) -> TaskResult + 'static,
    {
        let id = HandlerId(self.next_handler);
        self.next_handler += 1;
        self.handlers.entry(kind).or_default().push(Handler {
            id,
            callback: Box::new(f),
        });
        self.handler_kinds.insert(id, kind);
        tracing::debug!(handler = %id, kind = ?kind, "handler registered");
        id
    }

    /// Unregister a handler. Returns `false` if it was not registered.
    ///
    /// Safe to call from inside a handler, including the one being removed.
    pub fn off(&mut self, id: HandlerId) -> bool {
        let Some(kind) = self.handler_kinds.remove(&id) else {
            return false;
        };
        if let Some(list) = self.handlers.get_mut(&kind) {
            list.retain(|h| h.id != id);
        }
        tracing::debug!(handler = %id, kind = ?kind, "handler removed");
        true
    }

    /// Number of handlers registered for `kind`.
    #[must_use]
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handler_kinds.values().filter(|&&k| k == kind).count()
    }

    pub(crate) fn is_registered(&self, id: HandlerId) -> bool {
        self.handler_kinds.contains_key(&id)
    }

    /// Take the handler list for `kind` out for dispatch.
    pub(crate) fn take_handlers(&mut self, kind: EventKind) -> Vec<Handler<S>> {
        self.handlers
            .get_mut(&kind)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    /// Put a dispatched list back, keeping handlers registered meanwhile
    /// after it and dropping handlers removed meanwhile.
    pub(crate) fn restore_handlers(&mut self, kind: EventKind, list: Vec<Handler<S>>) {
        let slot = self.handlers.entry(kind).or_default();
        let added = std::mem::replace(slot, list);
        slot.extend(added);
        let kinds = &self.handler_kinds;
        slot.retain(|h| kinds.contains_key(&h.id));
    }
}

impl<S> fmt::Debug for Scheduler<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("tasks", &self.len())
            .field("queued", &self.queue.len())
            .field("handlers", &self.handler_kinds.len())
            .finish()
    }
}

/// The first due time strictly after `now` on the grid
/// `prev + k * interval` (`k >= 1`).
pub(crate) fn next_due_after(prev: Instant, interval: Duration, now: Instant) -> Instant {
    let next = prev + interval;
    if next > now {
        return next;
    }
    let behind = now.duration_since(next).as_nanos();
    let step = interval.as_nanos().max(1);
    let skipped = behind / step + 1;
    let jump = skipped.saturating_mul(step).min(u128::from(u64::MAX)) as u64;
    next + Duration::from_nanos(jump)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn sched(clock: &ManualClock) -> Scheduler<()> {
        Scheduler::new(Box::new(clock.clone()), LoopHandle::new())
    }

    #[test]
    fn next_due_on_time() {
        let t0 = Instant::now();
        assert_eq!(next_due_after(t0, ms(10), t0 + ms(3)), t0 + ms(10));
    }

    #[test]
    fn next_due_skips_missed_slots() {
        let t0 = Instant::now();
        // Callback ran from 10ms to 45ms: slots 20, 30, 40 are skipped.
        assert_eq!(next_due_after(t0 + ms(10), ms(10), t0 + ms(45)), t0 + ms(50));
    }

    #[test]
    fn next_due_is_strictly_after_now() {
        let t0 = Instant::now();
        assert_eq!(next_due_after(t0, ms(10), t0 + ms(20)), t0 + ms(30));
        assert_eq!(next_due_after(t0, ms(10), t0 + ms(10)), t0 + ms(20));
    }

    #[test]
    fn pop_due_orders_by_time_then_insertion() {
        let clock = ManualClock::new();
        let mut s = sched(&clock);
        let t0 = clock.now();
        let late = s.schedule_at(t0 + ms(5), |_, _, _| Ok(()));
        let a = s.schedule_now(|_, _, _| Ok(()));
        let b = s.schedule_now(|_, _, _| Ok(()));
        let ids: Vec<TaskId> = s.pop_due(t0 + ms(5)).iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![a, b, late]);
    }

    #[test]
    fn cancelled_tasks_are_skipped() {
        let clock = ManualClock::new();
        let mut s = sched(&clock);
        let a = s.schedule_now(|_, _, _| Ok(()));
        let b = s.schedule_after(ms(1), |_, _, _| Ok(()));
        assert!(s.cancel(a));
        assert!(!s.cancel(a));
        assert_eq!(s.next_due(), Some(clock.now() + ms(1)));
        let ids: Vec<TaskId> = s.pop_due(clock.now() + ms(1)).iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![b]);
    }

    #[test]
    fn tiny_intervals_are_clamped() {
        let clock = ManualClock::new();
        let mut s = sched(&clock);
        let id = s.schedule_every(Duration::ZERO, |_, _, _| Ok(()));
        let task = s.begin(id).unwrap();
        assert_eq!(task.kind, TaskKind::Repeated { interval: MIN_INTERVAL });
    }

    #[test]
    fn self_cancel_while_running() {
        let clock = ManualClock::new();
        let mut s = sched(&clock);
        let id = s.schedule_every(ms(10), |_, _, _| Ok(()));
        let _task = s.begin(id).unwrap();
        assert!(s.is_scheduled(id));
        assert!(s.cancel(id));
        assert!(!s.is_scheduled(id));
        assert!(s.end());
    }

    #[test]
    fn handlers_keep_registration_order_across_dispatch() {
        let clock = ManualClock::new();
        let mut s = sched(&clock);
        let a = s.on(EventKind::User, |_, _, _| Ok(()));
        let b = s.on(EventKind::User, |_, _, _| Ok(()));
        let list = s.take_handlers(EventKind::User);
        // Registered and removed while the list is out.
        let c = s.on(EventKind::User, |_, _, _| Ok(()));
        assert!(s.off(a));
        s.restore_handlers(EventKind::User, list);
        let ids: Vec<HandlerId> = s.handlers[&EventKind::User].iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![b, c]);
        assert_eq!(s.handler_count(EventKind::User), 2);
        assert!(!s.off(a));
    }
}
