#![forbid(unsafe_code)]

//! The block contract.
//!
//! A block is one horizontal segment of the bar. The bar only ever calls
//! the methods below; which optional behaviours it uses is decided by
//! [`Block::caps`], never by probing for a default implementation.

use std::fmt;
use std::io;
use std::time::Duration;

use bitflags::bitflags;
use sbar_render::Surface;

bitflags! {
    /// Optional behaviours a block implements.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BlockCaps: u8 {
        /// Call [`Block::update`] every [`Block::update_interval`].
        const UPDATE = 0b0001;
        /// Call [`Block::animate`] every [`Block::animate_interval`].
        const ANIMATE = 0b0010;
        /// Hovering shows [`Block::draw_tooltip`].
        const TOOLTIP = 0b0100;
        /// Ask [`Block::skip`] before each draw.
        const SKIP = 0b1000;
    }
}

/// Why a block could not refresh its data.
#[derive(Debug)]
pub enum BlockError {
    /// The data source is temporarily unavailable.
    Unavailable { reason: String },
    Io(io::Error),
    Other(String),
}

impl BlockError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for BlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { reason } => write!(f, "data source unavailable: {reason}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Other(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for BlockError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for BlockError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// One segment of the bar.
///
/// Blocks run on the loop thread. A block with background work keeps it on
/// a [`Worker`](crate::Worker) and reads its results from a
/// [`Shared`](crate::Shared) cell inside [`draw`](Self::draw).
pub trait Block {
    /// Name used in logs.
    fn name(&self) -> &str;

    fn caps(&self) -> BlockCaps {
        BlockCaps::empty()
    }

    /// Draw at the origin of `surface` and return the width used.
    ///
    /// `elapsed` is the time since this block was last drawn (zero on the
    /// first draw).
    fn draw(&mut self, surface: &mut dyn Surface, elapsed: Duration) -> i32;

    fn update_interval(&self) -> Option<Duration> {
        None
    }

    /// Refresh the block's data. An error hides the block until the next
    /// successful update.
    fn update(&mut self) -> Result<(), BlockError> {
        Ok(())
    }

    fn animate_interval(&self) -> Option<Duration> {
        None
    }

    /// Advance an animation; the bar repaints afterwards.
    fn animate(&mut self, _elapsed: Duration) {}

    /// Whether to leave the block out of this pass.
    fn skip(&self) -> bool {
        false
    }

    fn has_tooltip(&self) -> bool {
        self.caps().contains(BlockCaps::TOOLTIP)
    }

    /// Draw the tooltip at the origin of `surface`. `hovered_width` is the
    /// block's width on the bar.
    fn draw_tooltip(&mut self, _surface: &mut dyn Surface, _elapsed: Duration, _hovered_width: i32) {}
}
