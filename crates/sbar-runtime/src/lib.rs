#![forbid(unsafe_code)]

//! Runtime for sbar: the event loop and scheduler, cross-thread plumbing,
//! and the bar's layout driver.
//!
//! # Threads
//!
//! One thread owns the [`EventLoop`] and everything it drives: the loop
//! state, the [`Bar`], its surfaces and text caches. Nothing on that thread
//! is locked. Other threads reach it only through a [`LoopHandle`]: posting
//! events, requesting a stop, or running a job there with
//! [`LoopHandle::execute_blocking`]. Background work for blocks runs on
//! [`Worker`] threads and reports through [`Shared`] cells and a
//! [`RedrawFlag`].
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use sbar_runtime::{EventLoop, ManualClock};
//!
//! let mut ev = EventLoop::with_clock(0u32, ManualClock::new());
//! ev.scheduler_mut().schedule_every(Duration::from_millis(10), |ticks, sched, _| {
//!     *ticks += 1;
//!     if *ticks == 3 {
//!         sched.stop();
//!     }
//!     Ok(())
//! });
//! ev.run().unwrap();
//! assert_eq!(*ev.state(), 3);
//! ```

pub mod bar;
pub mod block;
pub mod cancel;
pub mod clock;
pub mod error;
pub mod event_loop;
pub mod executor;
pub mod handle;
pub mod handoff;
pub mod popup;
pub mod scheduler;
pub mod source;
pub mod worker;

pub use bar::{Bar, BarConfig, BlockId, BlockInfo, Side};
pub use block::{Block, BlockCaps, BlockError};
pub use cancel::{CancelToken, CancelTrigger, Cancelled};
pub use clock::{Clock, ManualClock, SystemClock, WakeSignal};
pub use error::{ErrorPolicy, LoopError, TaskError, TaskResult};
pub use event_loop::{EventLoop, PumpStatus};
pub use executor::{CatchUnwindExecutor, Executor, InlineExecutor};
pub use handle::LoopHandle;
pub use handoff::HandoffError;
pub use popup::{CanvasPopup, Popup};
pub use scheduler::{HandlerId, MIN_INTERVAL, Scheduler, TaskId, TaskKind};
#[cfg(unix)]
pub use source::SignalSource;
pub use source::ChildWatcher;
pub use worker::{RedrawFlag, Shared, Worker};
