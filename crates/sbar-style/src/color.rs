#![forbid(unsafe_code)]

//! Color types with lazily cached RGB/HSL conversion.
//!
//! A [`Color`] is created in one representation (RGB bytes or HSL floats)
//! and converts to the other on demand. The `&mut self` accessors
//! ([`Color::rgb_cached`], [`Color::hsl_cached`]) store the converted value in a cache slot
//! so repeated queries are free; the `&self` accessors ([`Color::to_rgb`],
//! [`Color::to_hsl`]) use the cache when present and otherwise convert on
//! the fly. Conversion is pure, so cached and uncached results agree.

use std::fmt;

/// RGB color (opaque).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    /// Red channel (0–255).
    pub r: u8,
    /// Green channel (0–255).
    pub g: u8,
    /// Blue channel (0–255).
    pub b: u8,
}

impl Rgb {
    /// Create a new RGB color.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Pack into a `u32` (`0x00RRGGBB`).
    #[must_use]
    pub const fn as_key(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | (self.b as u32)
    }

    /// Compute perceived luminance (BT.709) as a `u8` (0 = black, 255 = white).
    #[must_use]
    pub fn luminance_u8(self) -> u8 {
        let r = self.r as u32;
        let g = self.g as u32;
        let b = self.b as u32;
        let luma = 2126 * r + 7152 * g + 722 * b;
        ((luma + 5000) / 10_000) as u8
    }

    /// Convert to HSL.
    #[must_use]
    pub fn to_hsl(self) -> Hsl {
        let r = f32::from(self.r) / 255.0;
        let g = f32::from(self.g) / 255.0;
        let b = f32::from(self.b) / 255.0;

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let l = (max + min) / 2.0;

        if max == min {
            return Hsl { h: 0.0, s: 0.0, l };
        }

        let d = max - min;
        let s = if l > 0.5 {
            d / (2.0 - max - min)
        } else {
            d / (max + min)
        };
        let h = if max == r {
            (g - b) / d + if g < b { 6.0 } else { 0.0 }
        } else if max == g {
            (b - r) / d + 2.0
        } else {
            (r - g) / d + 4.0
        };

        Hsl { h: h * 60.0, s, l }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// HSL color.
///
/// Hue is in degrees `[0, 360)`, saturation and lightness in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Hsl {
    pub h: f32,
    pub s: f32,
    pub l: f32,
}

impl Hsl {
    /// Create a normalized HSL color (hue wrapped, s/l clamped).
    #[must_use]
    pub fn new(h: f32, s: f32, l: f32) -> Self {
        Self {
            h: h.rem_euclid(360.0),
            s: s.clamp(0.0, 1.0),
            l: l.clamp(0.0, 1.0),
        }
    }

    /// Convert to RGB, rounding each channel to the nearest byte.
    #[must_use]
    pub fn to_rgb(self) -> Rgb {
        if self.s <= 0.0 {
            let v = channel(self.l);
            return Rgb::new(v, v, v);
        }

        let q = if self.l < 0.5 {
            self.l * (1.0 + self.s)
        } else {
            self.l + self.s - self.l * self.s
        };
        let p = 2.0 * self.l - q;
        let h = self.h / 360.0;

        Rgb::new(
            channel(hue_to_channel(p, q, h + 1.0 / 3.0)),
            channel(hue_to_channel(p, q, h)),
            channel(hue_to_channel(p, q, h - 1.0 / 3.0)),
        )
    }

    /// Approximate equality. Hue is ignored for achromatic colors.
    #[must_use]
    pub fn approx_eq(self, other: Hsl) -> bool {
        const EPS: f32 = 1e-3;
        if (self.s - other.s).abs() > EPS || (self.l - other.l).abs() > EPS {
            return false;
        }
        let achromatic = self.s < EPS || self.l < EPS || self.l > 1.0 - EPS;
        if achromatic {
            return true;
        }
        let dh = (self.h - other.h).rem_euclid(360.0);
        dh.min(360.0 - dh) < 0.05
    }
}

fn hue_to_channel(p: f32, q: f32, t: f32) -> f32 {
    let t = t.rem_euclid(1.0);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

fn channel(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

#[derive(Debug, Clone, Copy)]
enum Repr {
    Rgb(Rgb),
    Hsl(Hsl),
}

/// A color stored as RGB or HSL, with a cache slot for the other form.
///
/// Equality compares in HSL when both sides were created as HSL, and in
/// RGB otherwise (the byte representation is the common ground).
#[derive(Debug, Clone, Copy)]
pub struct Color {
    primary: Repr,
    cached: Option<Repr>,
}

impl Color {
    /// Opaque black.
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    /// Opaque white.
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    /// Create a color from RGB bytes.
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            primary: Repr::Rgb(Rgb::new(r, g, b)),
            cached: None,
        }
    }

    /// Create a color from HSL components (normalized, see [`Hsl::new`]).
    #[must_use]
    pub fn hsl(h: f32, s: f32, l: f32) -> Self {
        Self {
            primary: Repr::Hsl(Hsl::new(h, s, l)),
            cached: None,
        }
    }

    /// Parse `#rgb` or `#rrggbb` (leading `#` optional).
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if !hex.is_ascii() {
            return None;
        }
        match hex.len() {
            3 => {
                let r = u8::from_str_radix(&hex[0..1], 16).ok()?;
                let g = u8::from_str_radix(&hex[1..2], 16).ok()?;
                let b = u8::from_str_radix(&hex[2..3], 16).ok()?;
                Some(Self::rgb(r * 17, g * 17, b * 17))
            }
            6 => {
                let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
                let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
                let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
                Some(Self::rgb(r, g, b))
            }
            _ => None,
        }
    }

    /// Whether the color was created from RGB bytes.
    #[must_use]
    pub const fn is_rgb(&self) -> bool {
        matches!(self.primary, Repr::Rgb(_))
    }

    /// Whether the opposite representation has been computed and cached.
    #[must_use]
    pub const fn is_cached(&self) -> bool {
        self.cached.is_some()
    }

    /// RGB form, converting without caching if needed.
    #[must_use]
    pub fn to_rgb(&self) -> Rgb {
        match (self.primary, self.cached) {
            (Repr::Rgb(rgb), _) | (_, Some(Repr::Rgb(rgb))) => rgb,
            (Repr::Hsl(hsl), _) => hsl.to_rgb(),
        }
    }

    /// HSL form, converting without caching if needed.
    #[must_use]
    pub fn to_hsl(&self) -> Hsl {
        match (self.primary, self.cached) {
            (Repr::Hsl(hsl), _) | (_, Some(Repr::Hsl(hsl))) => hsl,
            (Repr::Rgb(rgb), _) => rgb.to_hsl(),
        }
    }

    /// RGB form, caching the conversion on first use.
    pub fn rgb_cached(&mut self) -> Rgb {
        let rgb = self.to_rgb();
        if !self.is_rgb() {
            self.cached = Some(Repr::Rgb(rgb));
        }
        rgb
    }

    /// HSL form, caching the conversion on first use.
    pub fn hsl_cached(&mut self) -> Hsl {
        let hsl = self.to_hsl();
        if self.is_rgb() {
            self.cached = Some(Repr::Hsl(hsl));
        }
        hsl
    }

    /// Same hue and saturation with a different lightness.
    #[must_use]
    pub fn with_lightness(&self, l: f32) -> Color {
        let hsl = self.to_hsl();
        Color::hsl(hsl.h, hsl.s, l)
    }

    /// Increase (or with a negative `delta`, decrease) lightness.
    #[must_use]
    pub fn lighten(&self, delta: f32) -> Color {
        let hsl = self.to_hsl();
        Color::hsl(hsl.h, hsl.s, hsl.l + delta)
    }

    /// Linear interpolation in RGB space; `t` is clamped to `[0, 1]`.
    #[must_use]
    pub fn lerp(&self, other: &Color, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        let a = self.to_rgb();
        let b = other.to_rgb();
        let mix = |x: u8, y: u8| {
            (f32::from(x) + (f32::from(y) - f32::from(x)) * t)
                .round()
                .clamp(0.0, 255.0) as u8
        };
        Color::rgb(mix(a.r, b.r), mix(a.g, b.g), mix(a.b, b.b))
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

impl PartialEq for Color {
    fn eq(&self, other: &Self) -> bool {
        match (self.primary, other.primary) {
            (Repr::Hsl(a), Repr::Hsl(b)) => a.approx_eq(b),
            _ => self.to_rgb() == other.to_rgb(),
        }
    }
}

impl From<Rgb> for Color {
    fn from(rgb: Rgb) -> Self {
        Self::rgb(rgb.r, rgb.g, rgb.b)
    }
}

impl From<Hsl> for Color {
    fn from(hsl: Hsl) -> Self {
        Self::hsl(hsl.h, hsl.s, hsl.l)
    }
}
