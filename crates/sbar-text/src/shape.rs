#![forbid(unsafe_code)]

//! Shaping: turning a string into positioned glyph runs.
//!
//! A run is a maximal substring drawn with one face. Grapheme clusters are
//! kept in one face when any face covers the whole cluster; otherwise each
//! character falls back independently.
//!
//! # Coordinates
//!
//! Positions are relative to the pen origin on the baseline. The logical box
//! spans `0..advance` horizontally and `-ascent..descent` vertically, using
//! the largest ascent/descent among the faces that contributed glyphs. The
//! ink box is the union of the glyph ink boxes and may be narrower than the
//! logical box (whitespace advances the pen without adding ink).
//!
//! # Failure handling
//!
//! Control characters are skipped silently. A codepoint no face covers is
//! logged at `warn` and skipped; shaping always succeeds.

use std::ops::Range;

use sbar_core::geometry::Rect;
use smallvec::SmallVec;
use unicode_segmentation::UnicodeSegmentation;

use crate::face::{FaceMetrics, FontSet, Glyph};

/// A glyph placed on the pen line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionedGlyph {
    /// Source character.
    pub ch: char,
    /// Pen x position at which the glyph starts.
    pub x: i32,
    /// The rasterized glyph.
    pub glyph: Glyph,
}

impl PositionedGlyph {
    /// Ink box in run coordinates.
    #[inline]
    #[must_use]
    pub fn ink(&self) -> Rect {
        self.glyph.ink.offset(self.x, 0)
    }
}

/// A maximal sequence of glyphs from one face.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    /// Index of the face in the [`FontSet`].
    pub face: usize,
    /// Byte range of the source text covered by the run.
    pub range: Range<usize>,
    /// Glyphs in visual order.
    pub glyphs: SmallVec<[PositionedGlyph; 8]>,
    /// Union of glyph ink boxes.
    pub ink: Rect,
    /// Logical extent: `x..x+advance` by the face's line box.
    pub logical: Rect,
}

/// Result of shaping a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapedText {
    pub runs: SmallVec<[Run; 2]>,
    /// Cumulative logical box.
    pub logical: Rect,
    /// Joint ink box (empty when nothing paints).
    pub ink: Rect,
    /// Number of codepoints dropped for lack of coverage.
    pub missing: usize,
}

impl ShapedText {
    /// Total pen advance.
    #[inline]
    #[must_use]
    pub fn advance(&self) -> i32 {
        self.logical.width
    }

    /// Whether any glyph paints pixels.
    #[inline]
    #[must_use]
    pub fn has_ink(&self) -> bool {
        !self.ink.is_empty()
    }
}

struct RunBuilder {
    face: usize,
    start: usize,
    end: usize,
    pen_start: i32,
    glyphs: SmallVec<[PositionedGlyph; 8]>,
}

impl RunBuilder {
    fn finish(self, pen: i32, metrics: FaceMetrics) -> Run {
        let ink = self
            .glyphs
            .iter()
            .fold(Rect::default(), |acc, g| acc.union(&g.ink()));
        Run {
            face: self.face,
            range: self.start..self.end,
            glyphs: self.glyphs,
            ink,
            logical: Rect::new(
                self.pen_start,
                -metrics.ascent,
                pen - self.pen_start,
                metrics.line_height(),
            ),
        }
    }
}

/// Shape `text` with the faces in `fonts`.
#[must_use]
pub fn shape(text: &str, fonts: &FontSet) -> ShapedText {
    let mut runs: SmallVec<[Run; 2]> = SmallVec::new();
    let mut current: Option<RunBuilder> = None;
    let mut pen = 0i32;
    let mut missing = 0usize;

    for (offset, cluster) in text.grapheme_indices(true) {
        let cluster_face = fonts.face_for_cluster(cluster);
        for (i, ch) in cluster.char_indices() {
            if ch.is_control() {
                continue;
            }
            let Some(face_idx) = cluster_face.or_else(|| fonts.face_for_char(ch)) else {
                missing += 1;
                tracing::warn!(
                    codepoint = %ch.escape_unicode(),
                    "no font face covers codepoint; skipping"
                );
                continue;
            };
            let Some(glyph) = fonts.face(face_idx).and_then(|f| f.glyph(ch)) else {
                missing += 1;
                tracing::warn!(
                    codepoint = %ch.escape_unicode(),
                    face = face_idx,
                    "face claimed coverage but produced no glyph; skipping"
                );
                continue;
            };

            let byte_start = offset + i;
            let byte_end = byte_start + ch.len_utf8();
            match current.as_mut() {
                Some(run) if run.face == face_idx => run.end = byte_end,
                _ => {
                    if let Some(done) = current.take() {
                        let metrics = face_metrics(fonts, done.face);
                        runs.push(done.finish(pen, metrics));
                    }
                    current = Some(RunBuilder {
                        face: face_idx,
                        start: byte_start,
                        end: byte_end,
                        pen_start: pen,
                        glyphs: SmallVec::new(),
                    });
                }
            }

            let advance = glyph.advance;
            if let Some(run) = current.as_mut() {
                run.glyphs.push(PositionedGlyph { ch, x: pen, glyph });
            }
            pen += advance;
        }
    }

    if let Some(done) = current.take() {
        let metrics = face_metrics(fonts, done.face);
        runs.push(done.finish(pen, metrics));
    }

    let line = if runs.is_empty() {
        fonts.primary().metrics()
    } else {
        runs.iter().fold(FaceMetrics::default(), |acc, run| {
            let m = face_metrics(fonts, run.face);
            FaceMetrics::new(acc.ascent.max(m.ascent), acc.descent.max(m.descent))
        })
    };
    let ink = runs.iter().fold(Rect::default(), |acc, r| acc.union(&r.ink));

    ShapedText {
        runs,
        logical: Rect::new(0, -line.ascent, pen, line.line_height()),
        ink,
        missing,
    }
}

fn face_metrics(fonts: &FontSet, face: usize) -> FaceMetrics {
    fonts
        .face(face)
        .map_or_else(|| fonts.primary().metrics(), |f| f.metrics())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::FixedFace;

    fn ascii() -> FontSet {
        FontSet::single(FixedFace::ascii()).unwrap()
    }

    fn two_faces() -> FontSet {
        FontSet::new(vec![
            Box::new(FixedFace::ascii()),
            Box::new(FixedFace::new("greek", 8, 11, 3).covering(['α'..='ω'])),
        ])
        .unwrap()
    }

    #[test]
    fn single_run_for_single_face() {
        let shaped = shape("abc", &ascii());
        assert_eq!(shaped.runs.len(), 1);
        assert_eq!(shaped.runs[0].range, 0..3);
        assert_eq!(shaped.advance(), 18);
        assert_eq!(shaped.logical, Rect::new(0, -8, 18, 10));
    }

    #[test]
    fn face_change_splits_runs() {
        let shaped = shape("aβc", &two_faces());
        assert_eq!(shaped.runs.len(), 3);
        assert_eq!(shaped.runs[0].face, 0);
        assert_eq!(shaped.runs[1].face, 1);
        assert_eq!(shaped.runs[1].range, 1..3);
        assert_eq!(shaped.runs[2].range, 3..4);
        assert_eq!(shaped.advance(), 6 + 8 + 6);
        // Tallest face wins the line box.
        assert_eq!(shaped.logical.y, -11);
        assert_eq!(shaped.logical.height, 14);
    }

    #[test]
    fn whitespace_contributes_logical_not_ink() {
        let shaped = shape("  a  ", &ascii());
        assert_eq!(shaped.advance(), 30);
        assert_eq!(shaped.ink.x, 12 + 1);
        assert!(shaped.ink.right() <= 18);
    }

    #[test]
    fn whitespace_only_has_no_ink() {
        let shaped = shape("   ", &ascii());
        assert!(!shaped.has_ink());
        assert_eq!(shaped.advance(), 18);
        assert_eq!(shaped.logical.height, 10);
    }

    #[test]
    fn empty_string_uses_primary_line_box() {
        let shaped = shape("", &ascii());
        assert!(shaped.runs.is_empty());
        assert_eq!(shaped.logical, Rect::new(0, -8, 0, 10));
    }

    #[test]
    fn control_chars_are_skipped_silently() {
        let shaped = shape("a\n\tb", &ascii());
        assert_eq!(shaped.missing, 0);
        assert_eq!(shaped.advance(), 12);
        let chars: Vec<char> = shaped.runs[0].glyphs.iter().map(|g| g.ch).collect();
        assert_eq!(chars, vec!['a', 'b']);
    }

    #[test]
    fn uncovered_codepoints_are_counted_and_skipped() {
        let shaped = shape("a中b", &ascii());
        assert_eq!(shaped.missing, 1);
        assert_eq!(shaped.advance(), 12);
        assert_eq!(shaped.runs.len(), 1);
    }

    #[test]
    fn glyph_positions_are_cumulative() {
        let shaped = shape("abc", &ascii());
        let xs: Vec<i32> = shaped.runs[0].glyphs.iter().map(|g| g.x).collect();
        assert_eq!(xs, vec![0, 6, 12]);
    }
}
