//! Buffered drawing replayed onto a real canvas.

use proptest::prelude::*;
use sbar_core::geometry::{Point, Rect, Size};
use sbar_render::{BufferedSurface, Canvas, DirectSurface, DrawOp, Surface};
use sbar_style::Color;
use sbar_text::{FixedFace, FontSet, TextCache};

fn direct(width: i32, height: i32) -> DirectSurface<Canvas> {
    let fonts = FontSet::single(FixedFace::ascii()).unwrap();
    DirectSurface::new(
        Canvas::new(width, height, Color::BLACK),
        TextCache::new(fonts, 64),
    )
}

fn arb_color() -> impl Strategy<Value = Color> {
    (any::<u8>(), any::<u8>(), any::<u8>()).prop_map(|(r, g, b)| Color::rgb(r, g, b))
}

fn arb_op() -> impl Strategy<Value = DrawOp> {
    let coord = -20i32..60;
    let len = 0i32..30;
    prop_oneof![
        (coord.clone(), coord.clone(), coord.clone(), coord.clone(), arb_color()).prop_map(
            |(x0, y0, x1, y1, color)| DrawOp::Line {
                from: Point::new(x0, y0),
                to: Point::new(x1, y1),
                color,
            }
        ),
        (coord.clone(), coord.clone(), len.clone(), len.clone(), arb_color()).prop_map(
            |(x, y, w, h, color)| DrawOp::Rect {
                rect: Rect::new(x, y, w, h),
                color,
            }
        ),
        (coord.clone(), coord.clone(), len.clone(), len.clone(), arb_color()).prop_map(
            |(x, y, w, h, color)| DrawOp::FillRect {
                rect: Rect::new(x, y, w, h),
                color,
            }
        ),
        (coord.clone(), coord.clone(), 0i32..10, arb_color()).prop_map(|(x, y, radius, color)| {
            DrawOp::FillCircle {
                center: Point::new(x, y),
                radius,
                color,
            }
        }),
        (coord.clone(), coord, "[a-z ]{0,6}", arb_color()).prop_map(|(x, y, text, color)| {
            DrawOp::Text {
                pos: Point::new(x, y),
                text: text.into(),
                color,
            }
        }),
    ]
}

#[test]
fn replay_matches_direct_drawing_at_offset() {
    let mut expected = direct(80, 20);
    expected.fill_rect(Rect::new(12, 2, 5, 5), Color::WHITE);
    expected.text(Point::new(20, 10), "ok", Color::WHITE);
    expected.line(Point::new(10, 0), Point::new(10, 19), Color::WHITE);

    let mut actual = direct(80, 20);
    {
        let mut buf = BufferedSurface::new(&mut actual);
        buf.fill_rect(Rect::new(2, 2, 5, 5), Color::WHITE);
        buf.text(Point::new(10, 10), "ok", Color::WHITE);
        buf.line(Point::new(0, 0), Point::new(0, 19), Color::WHITE);
        buf.replay(10, 0);
    }
    assert_eq!(actual.backend(), expected.backend());
}

#[test]
fn recording_leaves_canvas_untouched_until_replay() {
    let mut surface = direct(40, 20);
    let before = surface.backend().clone();
    let mut buf = BufferedSurface::new(&mut surface);
    buf.fill_rect(Rect::new(0, 0, 40, 20), Color::WHITE);
    let size = buf.calculate_size();
    assert_eq!(size, Size::new(40, 20));
    buf.clear();
    buf.replay(0, 0);
    drop(buf);
    assert_eq!(surface.backend(), &before);
}

#[test]
fn text_extent_comes_from_measurement() {
    let mut surface = direct(100, 20);
    let mut buf = BufferedSurface::new(&mut surface);
    let vcenter = buf.vcenter();
    buf.text(Point::new(4, vcenter), "12:00", Color::WHITE);
    assert_eq!(buf.calculate_size(), Size::new(4 + 30, 10 - 5 + 10));
}

proptest! {
    #[test]
    fn replay_translates_every_op(
        ops in prop::collection::vec(arb_op(), 0..12),
        dx in -50i32..50,
        dy in -50i32..50,
    ) {
        let mut sink = direct(10, 10);
        let mut outer = BufferedSurface::new(&mut sink);
        {
            let mut inner = BufferedSurface::new(&mut outer);
            for op in &ops {
                op.apply(&mut inner, 0, 0);
            }
            prop_assert_eq!(inner.ops(), ops.as_slice());
            inner.replay(dx, dy);
        }
        let shifted: Vec<DrawOp> = ops.iter().map(|op| op.translated(dx, dy)).collect();
        prop_assert_eq!(outer.ops(), shifted.as_slice());
    }

    #[test]
    fn clear_leaves_no_residual_size(
        first in prop::collection::vec(arb_op(), 1..8),
        second in prop::collection::vec(arb_op(), 0..8),
    ) {
        let mut sink = direct(10, 10);
        let mut fresh_sink = direct(10, 10);

        let mut reused = BufferedSurface::new(&mut sink);
        for op in &first {
            op.apply(&mut reused, 0, 0);
        }
        reused.replay(3, 3);
        reused.clear();
        for op in &second {
            op.apply(&mut reused, 0, 0);
        }

        let mut fresh = BufferedSurface::new(&mut fresh_sink);
        for op in &second {
            op.apply(&mut fresh, 0, 0);
        }
        prop_assert_eq!(reused.calculate_size(), fresh.calculate_size());
    }
}
