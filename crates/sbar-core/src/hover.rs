#![forbid(unsafe_code)]

//! Hover tracking with flicker-free transitions between adjacent targets.
//!
//! Pointer input arrives in batches between redraws. Clearing the hovered
//! target as soon as the pointer leaves it makes the tooltip blink when the
//! pointer crosses directly from one block into the next (leave is often
//! reported before the motion that lands in the neighbour). Instead, losing
//! the target only *threatens* it; the threat is carried out at the next
//! [`resolve`](HoverTracker::resolve) unless a target was claimed in the
//! same batch.
//!
//! # Invariants
//!
//! 1. A hit always claims its target immediately.
//! 2. A miss or window-leave never clears the target before `resolve`.
//! 3. `resolve` clears the target only when it was threatened and nothing
//!    re-claimed it since the last `resolve`.
//! 4. Flags are reset by every `resolve`.

use bitflags::bitflags;

bitflags! {
    /// Per-batch hover state, reset on every [`HoverTracker::resolve`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HoverFlags: u8 {
        /// A target was hit during this batch.
        const CLAIMED = 0b0001;
        /// The pointer left the current target during this batch.
        const THREATENED = 0b0010;
        /// The pointer left the window during this batch.
        const LEFT_WINDOW = 0b0100;
    }
}

/// Tracks which target the pointer is over.
///
/// Feed hit-test results via [`pointer_moved`](Self::pointer_moved) and
/// window leave notifications via [`pointer_left`](Self::pointer_left), then
/// call [`resolve`](Self::resolve) once per redraw cycle.
#[derive(Debug, Clone)]
pub struct HoverTracker<T> {
    current: Option<T>,
    flags: HoverFlags,
    switches: u64,
}

impl<T: Copy + Eq> HoverTracker<T> {
    /// Create a tracker with nothing hovered.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current: None,
            flags: HoverFlags::empty(),
            switches: 0,
        }
    }

    /// Record a pointer motion whose hit-test returned `hit`.
    ///
    /// Returns the (possibly unchanged) current target.
    pub fn pointer_moved(&mut self, hit: Option<T>) -> Option<T> {
        match hit {
            Some(target) => {
                if self.current != Some(target) {
                    self.current = Some(target);
                    self.switches += 1;
                }
                self.flags.insert(HoverFlags::CLAIMED);
                self.flags.remove(HoverFlags::THREATENED);
            }
            None => {
                // A miss is positional evidence: it supersedes earlier claims.
                self.flags.remove(HoverFlags::CLAIMED);
                if self.current.is_some() {
                    self.flags.insert(HoverFlags::THREATENED);
                }
            }
        }
        self.current
    }

    /// Record that the pointer left the window.
    ///
    /// Leave notifications can arrive after the motion that entered a
    /// neighbouring target, so they never override a claim from this batch.
    pub fn pointer_left(&mut self) {
        self.flags.insert(HoverFlags::LEFT_WINDOW);
        if self.current.is_some() {
            self.flags.insert(HoverFlags::THREATENED);
        }
    }

    /// Apply pending threats and reset the batch flags.
    ///
    /// Returns the resolved hover target.
    pub fn resolve(&mut self) -> Option<T> {
        if self.flags.contains(HoverFlags::THREATENED)
            && !self.flags.contains(HoverFlags::CLAIMED)
            && self.current.take().is_some()
        {
            self.switches += 1;
        }
        self.flags = HoverFlags::empty();
        self.current
    }

    /// Current hover target (unresolved threats do not affect it).
    #[inline]
    #[must_use]
    pub fn current(&self) -> Option<T> {
        self.current
    }

    /// Flags accumulated since the last `resolve`.
    #[inline]
    #[must_use]
    pub fn flags(&self) -> HoverFlags {
        self.flags
    }

    /// Number of times the target changed (diagnostic).
    #[inline]
    #[must_use]
    pub fn switch_count(&self) -> u64 {
        self.switches
    }

    /// Forget the current target and pending flags.
    pub fn reset(&mut self) {
        self.current = None;
        self.flags = HoverFlags::empty();
    }
}

impl<T: Copy + Eq> Default for HoverTracker<T> {
    fn default() -> Self {
        Self::new()
    }
}
