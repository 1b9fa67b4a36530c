#![forbid(unsafe_code)]

//! Tooltip windows.

use sbar_core::geometry::Rect;
use sbar_render::{Canvas, DirectSurface, Surface};
use sbar_style::Color;
use sbar_text::TextCache;

/// A separate drawable the bar shows tooltips in.
///
/// The bar records the tooltip first, then calls [`show`](Self::show) with
/// the final area (in screen coordinates relative to the bar's origin) and
/// draws into [`surface`](Self::surface).
pub trait Popup {
    fn surface(&mut self) -> &mut dyn Surface;

    /// Move and resize to `area`, clear, and make visible.
    fn show(&mut self, area: Rect);

    fn hide(&mut self);

    fn is_visible(&self) -> bool;
}

/// A popup backed by a software canvas.
#[derive(Debug)]
pub struct CanvasPopup {
    surface: DirectSurface<Canvas>,
    background: Color,
    area: Option<Rect>,
}

impl CanvasPopup {
    /// A hidden popup with its own text cache.
    pub fn new(text: TextCache, background: Color) -> Self {
        Self {
            surface: DirectSurface::new(Canvas::new(0, 0, background), text),
            background,
            area: None,
        }
    }

    /// Where the popup is shown, if visible.
    #[must_use]
    pub fn area(&self) -> Option<Rect> {
        self.area
    }

    #[must_use]
    pub fn canvas(&self) -> &Canvas {
        self.surface.backend()
    }
}

impl Popup for CanvasPopup {
    fn surface(&mut self) -> &mut dyn Surface {
        &mut self.surface
    }

    fn show(&mut self, area: Rect) {
        self.surface
            .backend_mut()
            .resize(area.width, area.height, self.background);
        self.area = Some(area);
    }

    fn hide(&mut self) {
        self.area = None;
    }

    fn is_visible(&self) -> bool {
        self.area.is_some()
    }
}
