#![forbid(unsafe_code)]

//! Core: geometry, the event model shared by every event source, and
//! pointer hover tracking.

pub mod event;
pub mod geometry;
pub mod hover;

pub use event::{Event, EventKind, PointerEvent, PointerEventKind};
pub use geometry::{Point, Rect, Size};
pub use hover::{HoverFlags, HoverTracker};
