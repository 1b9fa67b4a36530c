#![forbid(unsafe_code)]

//! Canonical event types.
//!
//! Every asynchronous source (OS signals, child process completion, the
//! windowing system's input and lifecycle notifications) is normalized into
//! an [`Event`] before it reaches the event loop. Handlers are registered per
//! [`EventKind`], so the kind is the dispatch key and the event carries the
//! payload.

use crate::geometry::Point;

/// Canonical event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Request to stop the loop. Checked before any other dispatch.
    Stop,

    /// An OS signal was delivered (signal number).
    Signal(i32),

    /// A watched child process exited.
    ChildExited {
        /// Caller-chosen tag identifying which child this was.
        tag: u64,
        /// Exit code, or `None` if the child was killed by a signal or could
        /// not be waited on.
        code: Option<i32>,
    },

    /// Pointer input on the bar window.
    Pointer(PointerEvent),

    /// The window content was damaged and needs repainting.
    Expose,

    /// The bar window was resized.
    Resize {
        /// New width in pixels.
        width: i32,
        /// New height in pixels.
        height: i32,
    },

    /// Application-defined event.
    User(u32),
}

impl Event {
    /// The dispatch key for this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Stop => EventKind::Stop,
            Self::Signal(_) => EventKind::Signal,
            Self::ChildExited { .. } => EventKind::ChildExited,
            Self::Pointer(_) => EventKind::Pointer,
            Self::Expose => EventKind::Expose,
            Self::Resize { .. } => EventKind::Resize,
            Self::User(_) => EventKind::User,
        }
    }

    /// Whether this is the distinguished stop event.
    #[inline]
    #[must_use]
    pub const fn is_stop(&self) -> bool {
        matches!(self, Self::Stop)
    }
}

/// Dispatch key of an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Stop,
    Signal,
    ChildExited,
    Pointer,
    Expose,
    Resize,
    User,
}

/// A pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEvent {
    /// What happened.
    pub kind: PointerEventKind,
    /// Position relative to the bar window.
    pub position: Point,
}

impl PointerEvent {
    /// Create a new pointer event.
    #[must_use]
    pub const fn new(kind: PointerEventKind, x: i32, y: i32) -> Self {
        Self {
            kind,
            position: Point::new(x, y),
        }
    }

    /// Pointer moved to `(x, y)`.
    #[must_use]
    pub const fn motion(x: i32, y: i32) -> Self {
        Self::new(PointerEventKind::Motion, x, y)
    }

    /// Pointer left the window at `(x, y)`.
    #[must_use]
    pub const fn leave(x: i32, y: i32) -> Self {
        Self::new(PointerEventKind::Leave, x, y)
    }

    /// Pointer entered the window at `(x, y)`.
    #[must_use]
    pub const fn enter(x: i32, y: i32) -> Self {
        Self::new(PointerEventKind::Enter, x, y)
    }
}

/// Pointer event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerEventKind {
    /// Pointer moved within the window.
    Motion,
    /// Pointer entered the window.
    Enter,
    /// Pointer left the window.
    Leave,
    /// Button pressed (1 = primary).
    Press(u8),
    /// Button released.
    Release(u8),
}
