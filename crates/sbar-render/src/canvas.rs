#![forbid(unsafe_code)]

//! Software RGB backend.
//!
//! Every primitive is clipped to the canvas. Text textures are alpha
//! coverage masks blended over the existing pixels with the draw color.

use std::io::{self, Write};

use sbar_core::geometry::{Point, Rect, Size};
use sbar_style::{Color, Rgb};
use sbar_text::Texture;

use crate::direct::Backend;

/// An in-memory RGB framebuffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: i32,
    height: i32,
    pixels: Vec<Rgb>,
}

impl Canvas {
    /// A canvas filled with `background`.
    #[must_use]
    pub fn new(width: i32, height: i32, background: Color) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            width,
            height,
            pixels: vec![background.to_rgb(); (width as usize) * (height as usize)],
        }
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Pixel at `(x, y)`, or `None` outside the canvas.
    #[must_use]
    pub fn pixel(&self, x: i32, y: i32) -> Option<Rgb> {
        self.index(x, y).map(|i| self.pixels[i])
    }

    /// Row-major pixels.
    #[inline]
    #[must_use]
    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }

    /// Fill the whole canvas.
    pub fn clear(&mut self, color: Color) {
        self.pixels.fill(color.to_rgb());
    }

    /// Resize, discarding the content.
    pub fn resize(&mut self, width: i32, height: i32, background: Color) {
        *self = Self::new(width, height, background);
    }

    /// Number of pixels equal to `color`.
    #[must_use]
    pub fn count(&self, color: Color) -> usize {
        let rgb = color.to_rgb();
        self.pixels.iter().filter(|&&p| p == rgb).count()
    }

    /// Encode as binary PPM (`P6`).
    pub fn write_ppm<W: Write>(&self, mut out: W) -> io::Result<()> {
        write!(out, "P6\n{} {}\n255\n", self.width, self.height)?;
        let mut row = Vec::with_capacity(self.width as usize * 3);
        for line in self.pixels.chunks(self.width.max(1) as usize) {
            row.clear();
            for p in line {
                row.extend_from_slice(&[p.r, p.g, p.b]);
            }
            out.write_all(&row)?;
        }
        out.flush()
    }

    #[must_use]
    pub fn to_ppm(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 + self.pixels.len() * 3);
        // Writing into a Vec cannot fail.
        let _ = self.write_ppm(&mut out);
        out
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            None
        } else {
            Some((y * self.width + x) as usize)
        }
    }

    fn put(&mut self, x: i32, y: i32, rgb: Rgb) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = rgb;
        }
    }

    fn blend(&mut self, x: i32, y: i32, rgb: Rgb, alpha: u8) {
        let Some(i) = self.index(x, y) else {
            return;
        };
        let dst = self.pixels[i];
        let a = u32::from(alpha);
        let mix = |s: u8, d: u8| ((u32::from(s) * a + u32::from(d) * (255 - a) + 127) / 255) as u8;
        self.pixels[i] = Rgb::new(mix(rgb.r, dst.r), mix(rgb.g, dst.g), mix(rgb.b, dst.b));
    }

    fn clip(&self, rect: Rect) -> Option<Rect> {
        rect.intersection(&Rect::new(0, 0, self.width, self.height))
    }
}

impl Backend for Canvas {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    fn draw_line(&mut self, from: Point, to: Point, color: Color) {
        let Some((from, to)) = clip_line(from, to, self.width, self.height) else {
            return;
        };
        let rgb = color.to_rgb();
        // Bresenham, both endpoints inclusive.
        let (mut x, mut y) = (from.x, from.y);
        let dx = i64::from(to.x - from.x).abs();
        let dy = -i64::from(to.y - from.y).abs();
        let sx = if from.x < to.x { 1 } else { -1 };
        let sy = if from.y < to.y { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.put(x, y, rgb);
            if x == to.x && y == to.y {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    fn draw_rect(&mut self, rect: Rect, color: Color) {
        if rect.is_empty() {
            return;
        }
        let (right, bottom) = (rect.right() - 1, rect.bottom() - 1);
        self.draw_line(Point::new(rect.x, rect.y), Point::new(right, rect.y), color);
        self.draw_line(Point::new(rect.x, bottom), Point::new(right, bottom), color);
        self.draw_line(Point::new(rect.x, rect.y), Point::new(rect.x, bottom), color);
        self.draw_line(Point::new(right, rect.y), Point::new(right, bottom), color);
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        let Some(area) = self.clip(rect) else {
            return;
        };
        let rgb = color.to_rgb();
        for y in area.y..area.bottom() {
            let start = (y * self.width + area.x) as usize;
            self.pixels[start..start + area.width as usize].fill(rgb);
        }
    }

    fn fill_circle(&mut self, center: Point, radius: i32, color: Color) {
        if radius <= 0 {
            return;
        }
        let rgb = color.to_rgb();
        // Pixel (px, py) is inside when its center lies within the circle;
        // doubled coordinates keep the test in integers.
        let r2 = 4 * i64::from(radius) * i64::from(radius);
        for py in center.y - radius..center.y + radius {
            for px in center.x - radius..center.x + radius {
                let dx = i64::from(2 * (px - center.x) + 1);
                let dy = i64::from(2 * (py - center.y) + 1);
                if dx * dx + dy * dy <= r2 {
                    self.put(px, py, rgb);
                }
            }
        }
    }

    fn blit_texture(&mut self, origin: Point, texture: &Texture, color: Color) {
        let rgb = color.to_rgb();
        let mask = texture.pixmap();
        for (row, line) in mask.data().chunks(mask.width().max(1) as usize).enumerate() {
            for (col, &alpha) in line.iter().enumerate() {
                if alpha > 0 {
                    self.blend(origin.x + col as i32, origin.y + row as i32, rgb, alpha);
                }
            }
        }
    }
}

/// Clip a segment to the pixel grid `0..width` x `0..height`
/// (Liang-Barsky). `None` when no part of it lies on the canvas.
fn clip_line(from: Point, to: Point, width: i32, height: i32) -> Option<(Point, Point)> {
    if width <= 0 || height <= 0 {
        return None;
    }
    let (x0, y0) = (f64::from(from.x), f64::from(from.y));
    let (dx, dy) = (f64::from(to.x) - x0, f64::from(to.y) - y0);
    let (xmax, ymax) = (f64::from(width - 1), f64::from(height - 1));
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    for (p, q) in [(-dx, x0), (dx, xmax - x0), (-dy, y0), (dy, ymax - y0)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }
    let at = |t: f64| {
        Point::new(
            ((x0 + t * dx).round() as i32).clamp(0, width - 1),
            ((y0 + t * dy).round() as i32).clamp(0, height - 1),
        )
    };
    Some((at(t0), at(t1)))
}
