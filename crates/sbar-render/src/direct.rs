#![forbid(unsafe_code)]

//! Immediate drawing onto a rendering backend.

use sbar_core::geometry::{Point, Rect, Size};
use sbar_style::Color;
use sbar_text::{TextCache, Texture};

use crate::surface::Surface;

/// A native rendering target.
///
/// Backends only deal in pixels: text arrives as an alpha [`Texture`]
/// already shaped and rasterized by the text cache.
pub trait Backend {
    /// Drawable size in pixels.
    fn size(&self) -> Size;

    fn draw_line(&mut self, from: Point, to: Point, color: Color);

    fn draw_rect(&mut self, rect: Rect, color: Color);

    fn fill_rect(&mut self, rect: Rect, color: Color);

    fn fill_circle(&mut self, center: Point, radius: i32, color: Color);

    /// Composite `texture`'s coverage tinted with `color`, its top-left
    /// corner at `origin`.
    fn blit_texture(&mut self, origin: Point, texture: &Texture, color: Color);
}

/// A [`Surface`] that forwards every call to a [`Backend`] immediately.
#[derive(Debug)]
pub struct DirectSurface<B> {
    backend: B,
    text: TextCache,
}

impl<B: Backend> DirectSurface<B> {
    #[must_use]
    pub fn new(backend: B, text: TextCache) -> Self {
        Self { backend, text }
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[inline]
    pub fn text_cache(&self) -> &TextCache {
        &self.text
    }

    #[inline]
    pub fn text_cache_mut(&mut self) -> &mut TextCache {
        &mut self.text
    }

    pub fn into_parts(self) -> (B, TextCache) {
        (self.backend, self.text)
    }
}

impl<B: Backend> Surface for DirectSurface<B> {
    fn width(&self) -> i32 {
        self.backend.size().width
    }

    fn height(&self) -> i32 {
        self.backend.size().height
    }

    fn line(&mut self, from: Point, to: Point, color: Color) {
        self.backend.draw_line(from, to, color);
    }

    fn rect(&mut self, rect: Rect, color: Color) {
        if !rect.is_empty() {
            self.backend.draw_rect(rect, color);
        }
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        if !rect.is_empty() {
            self.backend.fill_rect(rect, color);
        }
    }

    fn fill_circle(&mut self, center: Point, radius: i32, color: Color) {
        if radius > 0 {
            self.backend.fill_circle(center, radius, color);
        }
    }

    fn text(&mut self, pos: Point, text: &str, color: Color) -> Size {
        let entry = self.text.render(text);
        match entry.texture() {
            Some(texture) => {
                let offset = entry.draw_offset();
                let origin = pos.offset(offset.x, offset.y);
                tracing::trace!(
                    len = text.len(),
                    x = origin.x,
                    y = origin.y,
                    texture = texture.id(),
                    "text blit"
                );
                self.backend.blit_texture(origin, texture, color);
            }
            None => tracing::trace!(len = text.len(), "text has no ink"),
        }
        entry.logical_size()
    }

    fn measure_text(&mut self, text: &str) -> Size {
        self.text.measure(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbar_text::{FixedFace, FontSet};
    use tracing_test::traced_test;

    #[derive(Debug, Default)]
    struct Calls {
        log: Vec<String>,
    }

    impl Backend for Calls {
        fn size(&self) -> Size {
            Size::new(100, 20)
        }
        fn draw_line(&mut self, from: Point, to: Point, _: Color) {
            self.log.push(format!("line {},{} {},{}", from.x, from.y, to.x, to.y));
        }
        fn draw_rect(&mut self, rect: Rect, _: Color) {
            self.log.push(format!("rect {}x{}", rect.width, rect.height));
        }
        fn fill_rect(&mut self, rect: Rect, _: Color) {
            self.log.push(format!("fill {}x{}", rect.width, rect.height));
        }
        fn fill_circle(&mut self, center: Point, radius: i32, _: Color) {
            self.log.push(format!("circle {},{} r{}", center.x, center.y, radius));
        }
        fn blit_texture(&mut self, origin: Point, texture: &Texture, _: Color) {
            let size = texture.size();
            self.log.push(format!(
                "blit {},{} {}x{}",
                origin.x, origin.y, size.width, size.height
            ));
        }
    }

    fn surface() -> DirectSurface<Calls> {
        let fonts = FontSet::single(FixedFace::ascii()).unwrap();
        DirectSurface::new(Calls::default(), TextCache::new(fonts, 16))
    }

    #[test]
    fn primitives_forward_immediately() {
        let mut s = surface();
        s.line(Point::new(0, 0), Point::new(0, 5), Color::WHITE);
        s.fill_rect(Rect::new(0, 0, 4, 2), Color::WHITE);
        s.rect(Rect::new(0, 0, 3, 3), Color::WHITE);
        s.fill_circle(Point::new(5, 5), 3, Color::WHITE);
        assert_eq!(s.backend().log, vec![
            "line 0,0 0,5",
            "fill 4x2",
            "rect 3x3",
            "circle 5,5 r3",
        ]);
    }

    #[test]
    fn degenerate_shapes_are_dropped() {
        let mut s = surface();
        s.fill_rect(Rect::new(0, 0, 0, 5), Color::WHITE);
        s.rect(Rect::new(0, 0, 5, -1), Color::WHITE);
        s.fill_circle(Point::new(1, 1), 0, Color::WHITE);
        assert!(s.backend().log.is_empty());
    }

    #[test]
    fn text_blits_at_draw_offset() {
        let mut s = surface();
        let size = s.text(Point::new(10, 10), "a", Color::WHITE);
        assert_eq!(size, Size::new(6, 10));
        // Ink of 'a' starts 1px right of the pen and 1px below the line top.
        assert_eq!(s.backend().log, vec!["blit 11,6 4x7"]);
    }

    #[test]
    fn whitespace_text_draws_nothing_but_has_size() {
        let mut s = surface();
        assert_eq!(s.text(Point::new(0, 10), "  ", Color::WHITE), Size::new(12, 10));
        assert!(s.backend().log.is_empty());
    }

    #[traced_test]
    #[test]
    fn text_draws_are_traced() {
        let mut s = surface();
        s.text(Point::new(10, 10), "a", Color::WHITE);
        assert!(logs_contain("text blit"));
        assert!(!logs_contain("text has no ink"));
        s.text(Point::new(0, 10), " ", Color::WHITE);
        assert!(logs_contain("text has no ink"));
    }

    #[test]
    fn measure_and_draw_share_cache() {
        let mut s = surface();
        s.measure_text("abc");
        s.text(Point::new(0, 10), "abc", Color::WHITE);
        assert_eq!(s.text_cache().stats().misses, 1);
        assert_eq!(s.text_cache().stats().hits, 1);
    }
}
