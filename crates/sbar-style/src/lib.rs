#![forbid(unsafe_code)]

//! Style primitives for sbar: the dual RGB/HSL color model.

pub mod color;

pub use color::{Color, Hsl, Rgb};
