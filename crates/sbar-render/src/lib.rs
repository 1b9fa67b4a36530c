#![forbid(unsafe_code)]

//! Render layer: the [`Surface`] drawing contract and its implementations.
//!
//! - [`DirectSurface`] forwards every primitive to a [`Backend`] at once,
//!   rasterizing text through a [`TextCache`](sbar_text::TextCache).
//! - [`BufferedSurface`] records [`DrawOp`]s instead, so callers can learn
//!   the drawn extent before deciding where it lands, then replay the
//!   recording with a translation.
//! - [`Canvas`] is a software RGB backend, used headless and in tests.

pub mod buffered;
pub mod canvas;
pub mod direct;
pub mod op;
pub mod surface;

pub use buffered::BufferedSurface;
pub use canvas::Canvas;
pub use direct::{Backend, DirectSurface};
pub use op::DrawOp;
pub use surface::Surface;
