#![forbid(unsafe_code)]

//! sbar public facade.
//!
//! Re-exports the types needed to build a bar: geometry and events, colors,
//! fonts and the text cache, surfaces and the software canvas, and the
//! runtime (event loop, blocks, bar driver, workers).

use std::fmt;

// --- Core re-exports -------------------------------------------------------

pub use sbar_core::event::{Event, EventKind, PointerEvent, PointerEventKind};
pub use sbar_core::geometry::{Point, Rect, Size};
pub use sbar_core::hover::{HoverFlags, HoverTracker};

// --- Style re-exports ------------------------------------------------------

pub use sbar_style::{Color, Hsl, Rgb};

// --- Text re-exports -------------------------------------------------------

pub use sbar_text::{
    CacheStats, FixedFace, FontError, FontFace, FontSet, TextCache, TextCacheConfig, TextEntry,
};

// --- Render re-exports -----------------------------------------------------

pub use sbar_render::{Backend, BufferedSurface, Canvas, DirectSurface, DrawOp, Surface};

// --- Runtime re-exports ----------------------------------------------------

pub use sbar_runtime::{
    Bar, BarConfig, Block, BlockCaps, BlockError, BlockId, BlockInfo, CancelToken, CancelTrigger,
    Cancelled, CanvasPopup, CatchUnwindExecutor, ChildWatcher, Clock, ErrorPolicy, EventLoop,
    Executor, HandlerId, HandoffError, InlineExecutor, LoopError, LoopHandle, ManualClock, Popup,
    PumpStatus, RedrawFlag, Scheduler, Shared, Side, SystemClock, TaskError, TaskId, TaskKind,
    TaskResult, Worker,
};
#[cfg(unix)]
pub use sbar_runtime::SignalSource;

// --- Errors ---------------------------------------------------------------

/// Top-level error type for sbar applications.
#[derive(Debug)]
pub enum Error {
    /// I/O failure (thread spawn, signal setup, file output).
    Io(std::io::Error),
    /// The font configuration is unusable.
    Font(FontError),
    /// The event loop stopped on a task or handler failure.
    Loop(LoopError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Font(err) => write!(f, "font setup failed: {err}"),
            Self::Loop(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Font(err) => Some(err),
            Self::Loop(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<FontError> for Error {
    fn from(err: FontError) -> Self {
        Self::Font(err)
    }
}

impl From<LoopError> for Error {
    fn from(err: LoopError) -> Self {
        Self::Loop(err)
    }
}

/// Standard result type for sbar APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Bar, BarConfig, Block, BlockCaps, BlockError, Color, Error, Event, EventKind, EventLoop,
        Point, Rect, Result, Side, Size, Surface, TaskResult,
    };
}
