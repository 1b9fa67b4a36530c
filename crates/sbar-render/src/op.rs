#![forbid(unsafe_code)]

//! Recorded drawing operations.

use sbar_core::geometry::{Point, Rect, Size};
use sbar_style::Color;

use crate::surface::Surface;

/// One primitive call captured by a [`BufferedSurface`](crate::BufferedSurface).
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Line {
        from: Point,
        to: Point,
        color: Color,
    },
    Rect {
        rect: Rect,
        color: Color,
    },
    FillRect {
        rect: Rect,
        color: Color,
    },
    FillCircle {
        center: Point,
        radius: i32,
        color: Color,
    },
    Text {
        pos: Point,
        text: Box<str>,
        color: Color,
    },
}

impl DrawOp {
    /// The same operation moved by `(dx, dy)`.
    #[must_use]
    pub fn translated(&self, dx: i32, dy: i32) -> DrawOp {
        match self {
            Self::Line { from, to, color } => Self::Line {
                from: from.offset(dx, dy),
                to: to.offset(dx, dy),
                color: *color,
            },
            Self::Rect { rect, color } => Self::Rect {
                rect: rect.offset(dx, dy),
                color: *color,
            },
            Self::FillRect { rect, color } => Self::FillRect {
                rect: rect.offset(dx, dy),
                color: *color,
            },
            Self::FillCircle {
                center,
                radius,
                color,
            } => Self::FillCircle {
                center: center.offset(dx, dy),
                radius: *radius,
                color: *color,
            },
            Self::Text { pos, text, color } => Self::Text {
                pos: pos.offset(dx, dy),
                text: text.clone(),
                color: *color,
            },
        }
    }

    /// Invoke the matching primitive on `target`, shifted by `(dx, dy)`.
    pub fn apply<S: Surface + ?Sized>(&self, target: &mut S, dx: i32, dy: i32) {
        match self {
            Self::Line { from, to, color } => {
                target.line(from.offset(dx, dy), to.offset(dx, dy), *color);
            }
            Self::Rect { rect, color } => target.rect(rect.offset(dx, dy), *color),
            Self::FillRect { rect, color } => target.fill_rect(rect.offset(dx, dy), *color),
            Self::FillCircle {
                center,
                radius,
                color,
            } => target.fill_circle(center.offset(dx, dy), *radius, *color),
            Self::Text { pos, text, color } => {
                target.text(pos.offset(dx, dy), text, *color);
            }
        }
    }

    /// Exclusive bottom-right corner of the area the operation covers.
    ///
    /// Lines cover both endpoints, rectangles their own box, circles
    /// `center + radius`, and text its logical box as reported by `measure`.
    pub fn extent(&self, measure: &mut dyn FnMut(&str) -> Size) -> Point {
        match self {
            Self::Line { from, to, .. } => {
                Point::new(from.x.max(to.x) + 1, from.y.max(to.y) + 1)
            }
            Self::Rect { rect, .. } | Self::FillRect { rect, .. } => {
                Point::new(rect.right(), rect.bottom())
            }
            Self::FillCircle { center, radius, .. } => {
                Point::new(center.x + radius, center.y + radius)
            }
            Self::Text { pos, text, .. } => {
                let size = measure(text);
                Point::new(pos.x + size.width, pos.y - size.height / 2 + size.height)
            }
        }
    }

    /// The operation's color.
    #[must_use]
    pub fn color(&self) -> Color {
        match self {
            Self::Line { color, .. }
            | Self::Rect { color, .. }
            | Self::FillRect { color, .. }
            | Self::FillCircle { color, .. }
            | Self::Text { color, .. } => *color,
        }
    }
}
