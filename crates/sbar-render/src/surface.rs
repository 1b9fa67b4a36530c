#![forbid(unsafe_code)]

//! The drawing contract shared by direct and buffered surfaces.

use sbar_core::geometry::{Point, Rect, Size};
use sbar_style::Color;

/// Something blocks can draw on.
///
/// Coordinates are pixels with the origin at the top-left and `y` growing
/// down. Text is positioned by its pen start (`x`) and the vertical center
/// of its line box (`y`), so `surface.text(Point::new(x, surface.vcenter()), ..)`
/// centers a label in the bar.
pub trait Surface {
    /// Width of the underlying drawable, in pixels.
    fn width(&self) -> i32;

    /// Height of the underlying drawable, in pixels.
    fn height(&self) -> i32;

    /// Vertical center line.
    fn vcenter(&self) -> i32 {
        self.height() / 2
    }

    /// Horizontal center line.
    fn hcenter(&self) -> i32 {
        self.width() / 2
    }

    /// One-pixel line between two points, both inclusive.
    fn line(&mut self, from: Point, to: Point, color: Color);

    /// One-pixel outline drawn inside `rect`.
    fn rect(&mut self, rect: Rect, color: Color);

    fn fill_rect(&mut self, rect: Rect, color: Color);

    /// Filled disc covering the pixels `center.x - radius..center.x + radius`
    /// (and likewise vertically) whose centers fall inside the circle.
    fn fill_circle(&mut self, center: Point, radius: i32, color: Color);

    /// Draw `text`; returns its logical size.
    fn text(&mut self, pos: Point, text: &str, color: Color) -> Size;

    /// Logical size of `text` without drawing it.
    ///
    /// Takes `&mut self` because measurement populates the text cache.
    fn measure_text(&mut self, text: &str) -> Size;
}
