#![forbid(unsafe_code)]

//! Deferred drawing.
//!
//! A [`BufferedSurface`] records primitive calls instead of executing them.
//! Size queries and text measurement go to the wrapped surface, so a block
//! lays itself out exactly as it would when drawing directly. Once the
//! block is done, [`calculate_size`](BufferedSurface::calculate_size) tells
//! the caller how much room the drawing needs and
//! [`replay`](BufferedSurface::replay) commits it at an offset.
//!
//! # Invariants
//!
//! 1. Recording never touches the wrapped surface's pixels.
//! 2. Replaying at `(dx, dy)` invokes the same primitives, in recording
//!    order, with every coordinate shifted by exactly `(dx, dy)`.
//! 3. [`clear`](BufferedSurface::clear) forgets every recorded op and
//!    nothing else.

use sbar_core::geometry::{Point, Rect, Size};
use sbar_style::Color;

use crate::op::DrawOp;
use crate::surface::Surface;

/// A recording surface layered over a real one.
pub struct BufferedSurface<'a> {
    target: &'a mut dyn Surface,
    ops: Vec<DrawOp>,
}

impl<'a> BufferedSurface<'a> {
    #[must_use]
    pub fn new(target: &'a mut dyn Surface) -> Self {
        Self::with_ops(target, Vec::new())
    }

    /// Reuse a previously recorded op list's allocation.
    ///
    /// Any ops still in `ops` are discarded.
    #[must_use]
    pub fn with_ops(target: &'a mut dyn Surface, mut ops: Vec<DrawOp>) -> Self {
        ops.clear();
        Self { target, ops }
    }

    /// Give back the op list, e.g. to reuse its allocation next frame.
    #[must_use]
    pub fn into_ops(self) -> Vec<DrawOp> {
        self.ops
    }

    /// Recorded operations, in order.
    #[inline]
    #[must_use]
    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The wrapped surface, for drawing that must bypass the recording.
    #[inline]
    pub fn target_mut(&mut self) -> &mut dyn Surface {
        &mut *self.target
    }

    /// Replay every recorded op onto the wrapped surface, shifted by
    /// `(dx, dy)`. The recording is kept.
    pub fn replay(&mut self, dx: i32, dy: i32) {
        for op in &self.ops {
            op.apply(&mut *self.target, dx, dy);
        }
    }

    /// Replay onto some other surface.
    pub fn replay_onto<S: Surface + ?Sized>(&self, target: &mut S, dx: i32, dy: i32) {
        for op in &self.ops {
            op.apply(target, dx, dy);
        }
    }

    /// Size of the box from the origin to the far corner of every recorded
    /// op. `(0, 0)` when nothing is recorded.
    pub fn calculate_size(&mut self) -> Size {
        let target = &mut *self.target;
        let mut measure = |text: &str| target.measure_text(text);
        let far = self
            .ops
            .iter()
            .fold(Point::ZERO, |acc, op| {
                let corner = op.extent(&mut measure);
                Point::new(acc.x.max(corner.x), acc.y.max(corner.y))
            });
        Size::new(far.x, far.y)
    }

    /// Discard the recording.
    pub fn clear(&mut self) {
        self.ops.clear();
    }
}

impl Surface for BufferedSurface<'_> {
    fn width(&self) -> i32 {
        self.target.width()
    }

    fn height(&self) -> i32 {
        self.target.height()
    }

    fn vcenter(&self) -> i32 {
        self.target.vcenter()
    }

    fn hcenter(&self) -> i32 {
        self.target.hcenter()
    }

    fn line(&mut self, from: Point, to: Point, color: Color) {
        self.ops.push(DrawOp::Line { from, to, color });
    }

    fn rect(&mut self, rect: Rect, color: Color) {
        self.ops.push(DrawOp::Rect { rect, color });
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.ops.push(DrawOp::FillRect { rect, color });
    }

    fn fill_circle(&mut self, center: Point, radius: i32, color: Color) {
        self.ops.push(DrawOp::FillCircle {
            center,
            radius,
            color,
        });
    }

    fn text(&mut self, pos: Point, text: &str, color: Color) -> Size {
        let size = self.target.measure_text(text);
        self.ops.push(DrawOp::Text {
            pos,
            text: text.into(),
            color,
        });
        size
    }

    fn measure_text(&mut self, text: &str) -> Size {
        self.target.measure_text(text)
    }
}

impl std::fmt::Debug for BufferedSurface<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedSurface")
            .field("target_size", &Size::new(self.target.width(), self.target.height()))
            .field("ops", &self.ops.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A surface that records into a log and measures 6x10 cells.
    #[derive(Default)]
    struct Log {
        calls: Vec<DrawOp>,
    }

    impl Surface for Log {
        fn width(&self) -> i32 {
            200
        }
        fn height(&self) -> i32 {
            20
        }
        fn line(&mut self, from: Point, to: Point, color: Color) {
            self.calls.push(DrawOp::Line { from, to, color });
        }
        fn rect(&mut self, rect: Rect, color: Color) {
            self.calls.push(DrawOp::Rect { rect, color });
        }
        fn fill_rect(&mut self, rect: Rect, color: Color) {
            self.calls.push(DrawOp::FillRect { rect, color });
        }
        fn fill_circle(&mut self, center: Point, radius: i32, color: Color) {
            self.calls.push(DrawOp::FillCircle {
                center,
                radius,
                color,
            });
        }
        fn text(&mut self, pos: Point, text: &str, color: Color) -> Size {
            self.calls.push(DrawOp::Text {
                pos,
                text: text.into(),
                color,
            });
            self.measure_text(text)
        }
        fn measure_text(&mut self, text: &str) -> Size {
            Size::new(text.chars().count() as i32 * 6, 10)
        }
    }

    #[test]
    fn empty_buffer_has_zero_size() {
        let mut log = Log::default();
        let mut buf = BufferedSurface::new(&mut log);
        assert_eq!(buf.calculate_size(), Size::ZERO);
    }

    #[test]
    fn single_fill_rect_size() {
        let mut log = Log::default();
        let mut buf = BufferedSurface::new(&mut log);
        buf.fill_rect(Rect::new(5, 5, 10, 10), Color::WHITE);
        assert_eq!(buf.calculate_size(), Size::new(15, 15));
    }

    #[test]
    fn recording_does_not_touch_target() {
        let mut log = Log::default();
        {
            let mut buf = BufferedSurface::new(&mut log);
            buf.fill_rect(Rect::new(0, 0, 3, 3), Color::WHITE);
            let size = buf.text(Point::new(0, 10), "hey", Color::WHITE);
            assert_eq!(size, Size::new(18, 10));
            assert_eq!(buf.len(), 2);
        }
        assert!(log.calls.is_empty());
    }

    #[test]
    fn metrics_proxy_to_target() {
        let mut log = Log::default();
        let buf = BufferedSurface::new(&mut log);
        assert_eq!(buf.width(), 200);
        assert_eq!(buf.height(), 20);
        assert_eq!(buf.vcenter(), 10);
    }

    #[test]
    fn replay_shifts_every_op() {
        let mut log = Log::default();
        {
            let mut buf = BufferedSurface::new(&mut log);
            buf.line(Point::new(0, 0), Point::new(0, 9), Color::WHITE);
            buf.fill_circle(Point::new(4, 4), 2, Color::BLACK);
            buf.text(Point::new(1, 10), "x", Color::WHITE);
            buf.replay(30, 2);
        }
        assert_eq!(log.calls, vec![
            DrawOp::Line {
                from: Point::new(30, 2),
                to: Point::new(30, 11),
                color: Color::WHITE,
            },
            DrawOp::FillCircle {
                center: Point::new(34, 6),
                radius: 2,
                color: Color::BLACK,
            },
            DrawOp::Text {
                pos: Point::new(31, 12),
                text: "x".into(),
                color: Color::WHITE,
            },
        ]);
    }

    #[test]
    fn clear_after_replay_resets_size() {
        let mut log = Log::default();
        let mut buf = BufferedSurface::new(&mut log);
        buf.fill_rect(Rect::new(0, 0, 40, 20), Color::WHITE);
        buf.replay(0, 0);
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.calculate_size(), Size::ZERO);
        buf.rect(Rect::new(1, 1, 2, 2), Color::WHITE);
        assert_eq!(buf.calculate_size(), Size::new(3, 3));
    }

    #[test]
    fn with_ops_discards_stale_ops() {
        let mut log = Log::default();
        let stale = vec![DrawOp::FillRect {
            rect: Rect::new(0, 0, 1, 1),
            color: Color::WHITE,
        }];
        let buf = BufferedSurface::with_ops(&mut log, stale);
        assert!(buf.is_empty());
        assert!(buf.into_ops().capacity() >= 1);
    }

    #[test]
    fn nested_buffers_record_translated_ops() {
        let mut log = Log::default();
        let mut outer = BufferedSurface::new(&mut log);
        let mut inner_ops = Vec::new();
        {
            let mut inner = BufferedSurface::new(&mut outer);
            inner.fill_rect(Rect::new(0, 0, 4, 4), Color::WHITE);
            inner.replay(10, 0);
            inner_ops.extend_from_slice(inner.ops());
        }
        assert_eq!(outer.ops(), &[inner_ops[0].translated(10, 0)]);
        assert_eq!(outer.calculate_size(), Size::new(14, 4));
    }
}
