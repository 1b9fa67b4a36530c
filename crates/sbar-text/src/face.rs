#![forbid(unsafe_code)]

//! Font faces and the ordered fallback list used during shaping.
//!
//! Loading real font files is the backend's business; the text pipeline
//! only needs per-glyph advance, ink extents, and an alpha coverage bitmap.
//! [`FixedFace`] is a deterministic fixed-advance face used as a last-resort
//! fallback and in tests.

use std::fmt;
use std::ops::RangeInclusive;

use sbar_core::geometry::Rect;
use unicode_width::UnicodeWidthChar;

/// Vertical metrics of a face, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FaceMetrics {
    /// Distance from the baseline to the top of the line box.
    pub ascent: i32,
    /// Distance from the baseline to the bottom of the line box.
    pub descent: i32,
}

impl FaceMetrics {
    #[must_use]
    pub const fn new(ascent: i32, descent: i32) -> Self {
        Self { ascent, descent }
    }

    /// Total line height.
    #[inline]
    #[must_use]
    pub const fn line_height(&self) -> i32 {
        self.ascent + self.descent
    }
}

/// One rasterized glyph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Glyph {
    /// Horizontal pen advance.
    pub advance: i32,
    /// Ink box relative to the pen position on the baseline (y grows down,
    /// so ink above the baseline has negative `y`). Empty for whitespace.
    pub ink: Rect,
    /// Row-major alpha coverage, `ink.width * ink.height` bytes.
    pub coverage: Vec<u8>,
}

impl Glyph {
    /// A glyph that advances the pen without painting anything.
    #[must_use]
    pub fn blank(advance: i32) -> Self {
        Self {
            advance,
            ink: Rect::default(),
            coverage: Vec::new(),
        }
    }

    /// Whether the glyph paints any pixels.
    #[inline]
    #[must_use]
    pub fn has_ink(&self) -> bool {
        !self.ink.is_empty()
    }
}

/// A source of glyphs.
pub trait FontFace: fmt::Debug {
    /// Human-readable face name, used in diagnostics.
    fn name(&self) -> &str;

    /// Vertical metrics.
    fn metrics(&self) -> FaceMetrics;

    /// Whether the face has a glyph for `ch`.
    fn covers(&self, ch: char) -> bool;

    /// Rasterize `ch`, or `None` if the face does not cover it.
    fn glyph(&self, ch: char) -> Option<Glyph>;
}

/// Font acquisition failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontError {
    /// The fallback list is empty.
    NoFaces,
    /// A face reported a non-positive line height.
    InvalidMetrics { face: String },
}

impl fmt::Display for FontError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFaces => write!(f, "no font faces configured"),
            Self::InvalidMetrics { face } => {
                write!(f, "font face {face:?} has a non-positive line height")
            }
        }
    }
}

impl std::error::Error for FontError {}

/// Ordered fallback list of faces. The first face is the primary face.
#[derive(Debug)]
pub struct FontSet {
    faces: Vec<Box<dyn FontFace>>,
}

impl FontSet {
    /// Build a font set, validating that it is usable.
    pub fn new(faces: Vec<Box<dyn FontFace>>) -> Result<Self, FontError> {
        if faces.is_empty() {
            return Err(FontError::NoFaces);
        }
        if let Some(bad) = faces.iter().find(|f| f.metrics().line_height() <= 0) {
            return Err(FontError::InvalidMetrics {
                face: bad.name().to_string(),
            });
        }
        Ok(Self { faces })
    }

    /// Convenience constructor for a single face.
    pub fn single(face: impl FontFace + 'static) -> Result<Self, FontError> {
        Self::new(vec![Box::new(face)])
    }

    /// Face at `index`.
    #[inline]
    #[must_use]
    pub fn face(&self, index: usize) -> Option<&dyn FontFace> {
        self.faces.get(index).map(|f| &**f)
    }

    /// The primary face.
    #[inline]
    #[must_use]
    pub fn primary(&self) -> &dyn FontFace {
        &*self.faces[0]
    }

    /// Number of faces.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.faces.len()
    }

    /// Always false: construction rejects empty sets.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Index of the first face covering `ch`.
    #[must_use]
    pub fn face_for_char(&self, ch: char) -> Option<usize> {
        self.faces.iter().position(|f| f.covers(ch))
    }

    /// Index of the first face covering every character of `cluster`.
    #[must_use]
    pub fn face_for_cluster(&self, cluster: &str) -> Option<usize> {
        self.faces
            .iter()
            .position(|f| cluster.chars().all(|ch| ch.is_control() || f.covers(ch)))
    }
}

/// Deterministic fixed-advance face.
///
/// Every covered non-whitespace character paints a box from just below the
/// ascent line down to the baseline. The box border is solid and the
/// interior encodes the codepoint's bits, so different characters produce
/// different pixels. Double-width characters advance two cells.
#[derive(Debug, Clone)]
pub struct FixedFace {
    name: String,
    advance: i32,
    metrics: FaceMetrics,
    ranges: Vec<RangeInclusive<char>>,
}

impl FixedFace {
    /// A face covering printable ASCII.
    #[must_use]
    pub fn new(name: impl Into<String>, advance: i32, ascent: i32, descent: i32) -> Self {
        Self {
            name: name.into(),
            advance: advance.max(1),
            metrics: FaceMetrics::new(ascent, descent),
            ranges: vec![' '..='~'],
        }
    }

    /// A 6x10 ASCII face (ascent 8, descent 2).
    #[must_use]
    pub fn ascii() -> Self {
        Self::new("fixed-6x10", 6, 8, 2)
    }

    /// Replace the covered ranges.
    #[must_use]
    pub fn covering(mut self, ranges: impl IntoIterator<Item = RangeInclusive<char>>) -> Self {
        self.ranges = ranges.into_iter().collect();
        self
    }

    /// Add a covered range.
    #[must_use]
    pub fn with_range(mut self, range: RangeInclusive<char>) -> Self {
        self.ranges.push(range);
        self
    }

    /// Cell advance for a single-width character.
    #[must_use]
    pub fn advance(&self) -> i32 {
        self.advance
    }
}

impl FontFace for FixedFace {
    fn name(&self) -> &str {
        &self.name
    }

    fn metrics(&self) -> FaceMetrics {
        self.metrics
    }

    fn covers(&self, ch: char) -> bool {
        self.ranges.iter().any(|r| r.contains(&ch))
    }

    fn glyph(&self, ch: char) -> Option<Glyph> {
        if !self.covers(ch) {
            return None;
        }
        let cells = ch.width().unwrap_or(1) as i32;
        let advance = self.advance * cells;
        if ch.is_whitespace() || advance == 0 {
            return Some(Glyph::blank(advance));
        }

        let width = (advance - 2).max(1);
        let height = (self.metrics.ascent - 1).max(1);
        let ink = Rect::new(1.min(advance - 1), -height, width, height);
        let bits = ch as u32;
        let mut coverage = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let border = x == 0 || y == 0 || x == width - 1 || y == height - 1;
                let bit = (bits >> ((x + y * width) % 21)) & 1 == 1;
                coverage.push(if border || bit { 255 } else { 0 });
            }
        }
        Some(Glyph {
            advance,
            ink,
            coverage,
        })
    }
}
