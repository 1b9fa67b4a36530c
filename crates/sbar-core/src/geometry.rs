#![forbid(unsafe_code)]

//! Geometric primitives.
//!
//! All coordinates are in pixels with the origin at the top-left corner of
//! the surface being drawn on. Coordinates are signed so that buffered
//! drawing can record operations that land partially off-surface before
//! they are translated into place.

use std::ops::{Add, Sub};

/// A point in surface coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    /// The origin.
    pub const ZERO: Self = Self { x: 0, y: 0 };

    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Translate by `(dx, dy)`.
    #[inline]
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// A width/height pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    /// Zero-sized.
    pub const ZERO: Self = Self {
        width: 0,
        height: 0,
    };

    #[inline]
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Check if either dimension is zero or negative.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Component-wise maximum.
    #[inline]
    #[must_use]
    pub fn max(self, other: Size) -> Size {
        Size::new(self.width.max(other.width), self.height.max(other.height))
    }
}

/// A rectangle for layout bounds, ink boxes, and hit testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    /// Left edge (inclusive).
    pub x: i32,
    /// Top edge (inclusive).
    pub y: i32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

impl Rect {
    /// Create a new rectangle.
    #[inline]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a rectangle at the origin with the given size.
    #[inline]
    pub const fn from_size(size: Size) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    /// Create a rectangle from an origin and a size.
    #[inline]
    pub const fn from_origin(origin: Point, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    /// Top-left corner.
    #[inline]
    pub const fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    #[inline]
    pub const fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Right edge (exclusive).
    #[inline]
    pub const fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Bottom edge (exclusive).
    #[inline]
    pub const fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Area in pixels. Degenerate rectangles have zero area.
    #[inline]
    pub const fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    /// Check if the rectangle has zero area.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Check if a point is inside the rectangle.
    #[inline]
    pub const fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x < self.right() && p.y >= self.y && p.y < self.bottom()
    }

    /// Translate by `(dx, dy)`.
    #[inline]
    #[must_use]
    pub const fn offset(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// The smallest rectangle containing both.
    ///
    /// Empty rectangles are ignored so that accumulating ink boxes can start
    /// from `Rect::default()`.
    #[must_use]
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, right - x, bottom - y)
    }

    /// Compute the intersection, returning `None` if there is no overlap.
    #[must_use]
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if x < right && y < bottom {
            Some(Rect::new(x, y, right - x, bottom - y))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_half_open() {
        let r = Rect::new(10, 0, 20, 24);
        assert!(r.contains(Point::new(10, 0)));
        assert!(r.contains(Point::new(29, 23)));
        assert!(!r.contains(Point::new(30, 5)));
        assert!(!r.contains(Point::new(9, 5)));
        assert!(!r.contains(Point::new(15, 24)));
    }

    #[test]
    fn union_skips_empty() {
        let a = Rect::new(3, 4, 0, 0);
        let b = Rect::new(1, 1, 2, 2);
        assert_eq!(a.union(&b), b);
        assert_eq!(b.union(&a), b);
        assert_eq!(
            b.union(&Rect::new(5, -1, 1, 1)),
            Rect::new(1, -1, 5, 4)
        );
    }

    #[test]
    fn intersection_none_when_disjoint() {
        let a = Rect::new(0, 0, 5, 5);
        assert!(a.intersection(&Rect::new(5, 0, 5, 5)).is_none());
        assert_eq!(
            a.intersection(&Rect::new(3, 3, 5, 5)),
            Some(Rect::new(3, 3, 2, 2))
        );
    }

    #[test]
    fn negative_dimensions_have_no_area() {
        assert_eq!(Rect::new(0, 0, -4, 10).area(), 0);
        assert!(Size::new(3, 0).is_empty());
    }

    #[test]
    fn point_arithmetic() {
        let p = Point::new(2, 3) + Point::new(4, -1);
        assert_eq!(p, Point::new(6, 2));
        assert_eq!(p - Point::new(6, 2), Point::ZERO);
        assert_eq!(p.offset(-6, 1), Point::new(0, 3));
    }
}
