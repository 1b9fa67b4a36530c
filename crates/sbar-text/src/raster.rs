#![forbid(unsafe_code)]

//! Rasterization of shaped text into alpha textures.

use std::sync::atomic::{AtomicU64, Ordering};

use sbar_core::geometry::{Point, Size};

use crate::shape::ShapedText;

/// An 8-bit alpha coverage bitmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pixmap {
    width: i32,
    height: i32,
    data: Vec<u8>,
}

impl Pixmap {
    /// A fully transparent pixmap. Non-positive dimensions yield an empty map.
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            width,
            height,
            data: vec![0; (width as usize) * (height as usize)],
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

    #[inline]
    #[must_use]
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Row-major coverage bytes.
    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Coverage at `(x, y)`, or 0 outside the map.
    #[must_use]
    pub fn get(&self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return 0;
        }
        self.data[(y * self.width + x) as usize]
    }

    /// Composite a `width`-wide coverage block at `origin` using max-blend,
    /// clipping anything outside the map.
    pub fn paint(&mut self, origin: Point, width: i32, coverage: &[u8]) {
        if width <= 0 {
            return;
        }
        for (row, line) in coverage.chunks(width as usize).enumerate() {
            let y = origin.y + row as i32;
            if y < 0 || y >= self.height {
                continue;
            }
            for (col, &alpha) in line.iter().enumerate() {
                let x = origin.x + col as i32;
                if x < 0 || x >= self.width {
                    continue;
                }
                let idx = (y * self.width + x) as usize;
                self.data[idx] = self.data[idx].max(alpha);
            }
        }
    }

    /// Number of pixels with non-zero coverage.
    #[must_use]
    pub fn inked_pixels(&self) -> usize {
        self.data.iter().filter(|&&a| a > 0).count()
    }
}

/// Identity of a texture, unique for the life of the process.
pub type TextureId = u64;

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// An owned pixel resource handed to a rendering backend.
///
/// Dropping the texture releases it; the text cache relies on this so that
/// eviction frees pixel memory immediately.
#[derive(Debug)]
pub struct Texture {
    id: TextureId,
    pixmap: Pixmap,
}

impl Texture {
    /// Take ownership of a filled pixmap.
    #[must_use]
    pub fn new(pixmap: Pixmap) -> Self {
        let id = NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(texture = id, width = pixmap.width, height = pixmap.height, "texture created");
        Self { id, pixmap }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> TextureId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> Size {
        self.pixmap.size()
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        tracing::trace!(texture = self.id, "texture released");
    }
}

/// Paint every run of `shaped` into a pixmap sized to its ink box.
///
/// The pixmap origin corresponds to the ink box's top-left corner. Returns
/// `None` when the ink box has zero area.
#[must_use]
pub fn rasterize(shaped: &ShapedText) -> Option<Pixmap> {
    if !shaped.has_ink() {
        return None;
    }
    let ink = shaped.ink;
    let mut pixmap = Pixmap::new(ink.width, ink.height);
    for run in &shaped.runs {
        for glyph in &run.glyphs {
            if !glyph.glyph.has_ink() {
                continue;
            }
            let origin = glyph.ink().origin() - ink.origin();
            pixmap.paint(origin, glyph.glyph.ink.width, &glyph.glyph.coverage);
        }
    }
    Some(pixmap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::{FixedFace, FontFace, FontSet};
    use crate::shape::shape;

    #[test]
    fn paint_clips_and_max_blends() {
        let mut map = Pixmap::new(3, 2);
        map.paint(Point::new(-1, 0), 2, &[10, 200, 30, 40]);
        assert_eq!(map.get(0, 0), 200);
        assert_eq!(map.get(0, 1), 40);
        map.paint(Point::new(0, 0), 1, &[50]);
        assert_eq!(map.get(0, 0), 200, "lower coverage never overwrites");
        assert_eq!(map.get(5, 5), 0);
    }

    #[test]
    fn negative_size_pixmap_is_empty() {
        let map = Pixmap::new(-3, 4);
        assert_eq!(map.size(), Size::new(0, 4));
        assert!(map.data().is_empty());
    }

    #[test]
    fn rasterize_sizes_to_ink_box() {
        let fonts = FontSet::single(FixedFace::ascii()).unwrap();
        let shaped = shape(" ab ", &fonts);
        let map = rasterize(&shaped).unwrap();
        assert_eq!(map.size(), shaped.ink.size());
        // The glyph border makes the corners solid.
        assert_eq!(map.get(0, 0), 255);
        assert_eq!(map.get(map.width() - 1, map.height() - 1), 255);
    }

    #[test]
    fn rasterize_places_glyphs_relative_to_ink_origin() {
        let face = FixedFace::ascii();
        let single = face.glyph('a').unwrap();
        let fonts = FontSet::single(face).unwrap();
        let map = rasterize(&shape("a", &fonts)).unwrap();
        assert_eq!(map.data(), single.coverage.as_slice());
    }

    #[test]
    fn rasterize_skips_inkless_text() {
        let fonts = FontSet::single(FixedFace::ascii()).unwrap();
        assert!(rasterize(&shape("   ", &fonts)).is_none());
        assert!(rasterize(&shape("", &fonts)).is_none());
    }

    #[test]
    fn texture_ids_are_unique() {
        let a = Texture::new(Pixmap::new(1, 1));
        let b = Texture::new(Pixmap::new(1, 1));
        assert_ne!(a.id(), b.id());
        assert_eq!(a.size(), Size::new(1, 1));
    }
}
