#![forbid(unsafe_code)]

//! Text for sbar: font faces, shaping into runs, rasterization into
//! textures, and the LRU cache that sits beneath every text draw call.
//!
//! The pipeline for a string that is not yet cached:
//!
//! 1. [`shape`] splits it into runs, one per font face, and computes the
//!    logical (advance) box and the tight ink box.
//! 2. [`rasterize`] paints the glyphs into an alpha [`Pixmap`] sized to the
//!    ink box. Strings with no ink (empty or whitespace) skip this step.
//! 3. [`TextCache`] wraps the pixmap in an owned [`Texture`] and keeps the
//!    result keyed by the exact string under an LRU policy.

pub mod cache;
pub mod face;
pub mod raster;
pub mod shape;

pub use cache::{CacheStats, DEFAULT_CACHE_CAPACITY, TextCache, TextCacheConfig, TextEntry};
pub use face::{FaceMetrics, FixedFace, FontError, FontFace, FontSet, Glyph};
pub use raster::{Pixmap, Texture, TextureId, rasterize};
pub use shape::{PositionedGlyph, Run, ShapedText, shape};
