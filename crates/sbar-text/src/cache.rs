#![forbid(unsafe_code)]

//! LRU cache of shaped and rasterized strings.
//!
//! Every text draw and every text measurement goes through this cache, so
//! a block that redraws the same label each frame shapes it exactly once.
//! Entries are keyed by the exact string (no normalization) and hold the
//! owned [`Texture`]; evicting an entry drops the texture on the spot.
//!
//! # Example
//! ```
//! use sbar_text::{FixedFace, FontSet, TextCache};
//!
//! let fonts = FontSet::single(FixedFace::ascii()).unwrap();
//! let mut cache = TextCache::new(fonts, 16);
//!
//! let size = cache.measure("12:30");
//! assert_eq!(size.width, 30);
//!
//! // Rendering the same string reuses the measured entry.
//! let entry = cache.render("12:30");
//! assert!(entry.texture().is_some());
//! assert_eq!(cache.stats().hits, 1);
//! assert_eq!(cache.stats().misses, 1);
//! ```

use std::num::NonZeroUsize;

use lru::LruCache;
use rustc_hash::FxBuildHasher;
use sbar_core::geometry::{Point, Rect, Size};

use crate::face::FontSet;
use crate::raster::{Texture, TextureId, rasterize};
use crate::shape::shape;

/// Default number of cached strings.
pub const DEFAULT_CACHE_CAPACITY: usize = 512;

/// Text cache tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextCacheConfig {
    /// Maximum number of entries. Zero is treated as one.
    pub capacity: usize,
}

impl Default for TextCacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Statistics about cache behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped to make room for new ones.
    pub evictions: u64,
    /// Current number of entries.
    pub size: usize,
    /// Maximum capacity.
    pub capacity: usize,
}

impl CacheStats {
    /// Hit rate in `0.0..=1.0`.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// A cached string: its layout boxes and, if it paints anything, its texture.
#[derive(Debug)]
pub struct TextEntry {
    logical: Rect,
    ink: Rect,
    offset: Point,
    texture: Option<Texture>,
}

impl TextEntry {
    /// Logical (advance) box relative to the pen origin on the baseline.
    #[inline]
    #[must_use]
    pub fn logical(&self) -> Rect {
        self.logical
    }

    /// Logical size used for layout.
    #[inline]
    #[must_use]
    pub fn logical_size(&self) -> Size {
        self.logical.size()
    }

    /// Tight ink box relative to the pen origin on the baseline.
    #[inline]
    #[must_use]
    pub fn ink(&self) -> Rect {
        self.ink
    }

    #[inline]
    #[must_use]
    pub fn ink_size(&self) -> Size {
        self.ink.size()
    }

    /// Where to place the texture's top-left corner relative to a draw
    /// position whose `x` is the pen start and whose `y` is the vertical
    /// center of the line box.
    #[inline]
    #[must_use]
    pub fn draw_offset(&self) -> Point {
        self.offset
    }

    /// The backing texture; `None` for strings without ink.
    #[inline]
    #[must_use]
    pub fn texture(&self) -> Option<&Texture> {
        self.texture.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn texture_id(&self) -> Option<TextureId> {
        self.texture.as_ref().map(Texture::id)
    }
}

/// LRU cache from exact string to [`TextEntry`].
///
/// Not thread-safe; it belongs to the thread that owns the draw surface.
pub struct TextCache {
    fonts: FontSet,
    cache: LruCache<Box<str>, TextEntry, FxBuildHasher>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl TextCache {
    /// Create a cache holding at most `capacity` strings (minimum one).
    #[must_use]
    pub fn new(fonts: FontSet, capacity: usize) -> Self {
        Self::with_config(fonts, TextCacheConfig { capacity })
    }

    #[must_use]
    pub fn with_config(fonts: FontSet, config: TextCacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            fonts,
            cache: LruCache::with_hasher(capacity, FxBuildHasher),
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// The fallback list used on cache misses.
    #[inline]
    #[must_use]
    pub fn fonts(&self) -> &FontSet {
        &self.fonts
    }

    /// Logical size of `text`, shaping and caching it on a miss.
    pub fn measure(&mut self, text: &str) -> Size {
        self.render(text).logical_size()
    }

    /// The cache entry for `text`, shaping and rasterizing it on a miss.
    ///
    /// A hit refreshes the entry's recency.
    pub fn render(&mut self, text: &str) -> &TextEntry {
        if self.cache.get(text).is_some() {
            self.hits += 1;
            tracing::trace!(len = text.len(), "text cache hit");
        } else {
            self.misses += 1;
            let entry = self.build(text);
            tracing::trace!(
                len = text.len(),
                width = entry.logical.width,
                textured = entry.texture.is_some(),
                "text cache miss"
            );
            if let Some((evicted, _)) = self.cache.push(text.into(), entry) {
                self.evictions += 1;
                tracing::trace!(len = evicted.len(), "text cache eviction");
            }
        }
        self.cache.peek(text).expect("entry present after insert")
    }

    fn build(&self, text: &str) -> TextEntry {
        let shaped = shape(text, &self.fonts);
        let logical = shaped.logical;
        let ink = shaped.ink;
        let texture = rasterize(&shaped).map(Texture::new);
        let offset = if texture.is_some() {
            Point::new(
                ink.x - logical.x,
                ink.y - logical.y - logical.height / 2,
            )
        } else {
            Point::ZERO
        };
        TextEntry {
            logical,
            ink,
            offset,
            texture,
        }
    }

    /// Whether `text` is cached. Does not touch recency.
    #[must_use]
    pub fn contains(&self, text: &str) -> bool {
        self.cache.contains(text)
    }

    /// The cached entry for `text`, without touching recency or stats.
    #[must_use]
    pub fn peek(&self, text: &str) -> Option<&TextEntry> {
        self.cache.peek(text)
    }

    /// Warm the cache with strings known to be drawn soon.
    pub fn preload_many<'a>(&mut self, texts: impl IntoIterator<Item = &'a str>) {
        for text in texts {
            if !self.cache.contains(text) {
                self.render(text);
            }
        }
    }

    /// Drop every entry and its texture.
    pub fn clear(&mut self) {
        let dropped = self.cache.len();
        self.cache.clear();
        tracing::debug!(dropped, "text cache cleared");
    }

    /// Change the capacity, evicting the least recent entries if shrinking.
    pub fn resize(&mut self, capacity: usize) {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        let before = self.cache.len();
        self.cache.resize(capacity);
        self.evictions += (before - self.cache.len()) as u64;
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }

    pub fn reset_stats(&mut self) {
        self.hits = 0;
        self.misses = 0;
        self.evictions = 0;
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            size: self.cache.len(),
            capacity: self.capacity(),
        }
    }
}

impl std::fmt::Debug for TextCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextCache")
            .field("fonts", &self.fonts.len())
            .field("stats", &self.stats())
            .finish()
    }
}
