#![forbid(unsafe_code)]

//! Layout and composition of the bar.
//!
//! A redraw pass paints the background, then lays out the left blocks
//! left-to-right from `x = 0` and the right blocks right-to-left from the
//! screen edge, then shows or hides the tooltip.
//!
//! Each block draws into a [`BufferedSurface`] at the origin. Its returned
//! width decides where the recording lands; the recording is replayed onto
//! the bar surface at that offset and the buffer is cleared for the next
//! block. The block's rectangle is kept for hover hit testing.
//!
//! # Invariants
//!
//! 1. Visible blocks on one side never overlap; consecutive visible blocks
//!    are `separator_gap` apart with a divider centered in the gap.
//! 2. No divider precedes the first or follows the last visible block.
//! 3. A skipped or failed block has an empty rectangle and cannot be
//!    hovered.
//! 4. The tooltip never extends past the right screen edge, and never
//!    starts left of `x = 0`.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use sbar_core::event::{Event, EventKind, PointerEvent, PointerEventKind};
use sbar_core::geometry::{Point, Rect, Size};
use sbar_core::hover::{HoverFlags, HoverTracker};
use sbar_render::{BufferedSurface, DrawOp, Surface};
use sbar_style::Color;
use tracing::debug_span;

use crate::block::{Block, BlockCaps};
use crate::handle::LoopHandle;
use crate::popup::Popup;
use crate::scheduler::{HandlerId, Scheduler, TaskId};
use crate::worker::RedrawFlag;

/// Layout and colors of the bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarConfig {
    /// Bar height in pixels. Blocks are laid out in the top `height` rows
    /// of the surface; anything below is left to the backend.
    pub height: i32,
    /// Horizontal space between consecutive visible blocks.
    pub separator_gap: i32,
    pub separator_color: Color,
    pub background: Color,
    /// Text color offered to blocks. The bar never draws with it; whoever
    /// builds the blocks passes it along.
    pub foreground: Color,
    /// Space between the tooltip border and its content.
    pub tooltip_padding: i32,
    /// Vertical space between the bar and the tooltip.
    pub tooltip_gap: i32,
}

impl Default for BarConfig {
    fn default() -> Self {
        Self {
            height: 24,
            separator_gap: 12,
            separator_color: Color::rgb(0x55, 0x55, 0x55),
            background: Color::rgb(0x1d, 0x1f, 0x21),
            foreground: Color::rgb(0xc5, 0xc8, 0xc6),
            tooltip_padding: 6,
            tooltip_gap: 4,
        }
    }
}

/// Which end of the bar a block is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

/// Position of a block in the bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId {
    pub side: Side,
    pub index: usize,
}

impl BlockId {
    #[must_use]
    pub const fn left(index: usize) -> Self {
        Self {
            side: Side::Left,
            index,
        }
    }

    #[must_use]
    pub const fn right(index: usize) -> Self {
        Self {
            side: Side::Right,
            index,
        }
    }
}

/// A block plus the bar's bookkeeping for it.
pub struct BlockInfo {
    block: Box<dyn Block>,
    rect: Rect,
    failed: bool,
    last_draw: Option<Instant>,
    last_tooltip: Option<Instant>,
}

impl BlockInfo {
    pub fn new(block: Box<dyn Block>) -> Self {
        Self {
            block,
            rect: Rect::default(),
            failed: false,
            last_draw: None,
            last_tooltip: None,
        }
    }

    /// Where the block was drawn in the last pass (empty if it was not).
    #[must_use]
    pub fn rect(&self) -> Rect {
        self.rect
    }

    #[must_use]
    pub fn block(&self) -> &dyn Block {
        &*self.block
    }

    pub fn block_mut(&mut self) -> &mut dyn Block {
        &mut *self.block
    }

    /// Whether the last update failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    fn visible(&self) -> bool {
        if self.failed {
            return false;
        }
        !(self.block.caps().contains(BlockCaps::SKIP) && self.block.skip())
    }

    fn since(last: &mut Option<Instant>, now: Instant) -> Duration {
        let elapsed = last.map_or(Duration::ZERO, |t| now.saturating_duration_since(t));
        *last = Some(now);
        elapsed
    }
}

impl fmt::Debug for BlockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockInfo")
            .field("name", &self.block.name())
            .field("rect", &self.rect)
            .field("failed", &self.failed)
            .finish()
    }
}

#[derive(Debug, Default)]
struct Installed {
    tasks: Vec<TaskId>,
    handlers: Vec<HandlerId>,
}

/// The layout and composition driver.
///
/// Owns the bar's drawing surface, both block lists, hover state, and the
/// tooltip popup. Redraws are requested by posting [`Event::Expose`];
/// requests made before the next pass are coalesced into one.
pub struct Bar<D> {
    surface: D,
    config: BarConfig,
    left: Vec<BlockInfo>,
    right: Vec<BlockInfo>,
    hover: HoverTracker<BlockId>,
    drawn_hover: Option<BlockId>,
    ops: Vec<DrawOp>,
    popup: Option<Box<dyn Popup>>,
    tooltip_area: Option<Rect>,
    pending: Arc<AtomicBool>,
    redraws: u64,
    installed: Installed,
}

impl<D: Surface> Bar<D> {
    pub fn new(surface: D, config: BarConfig) -> Self {
        Self {
            surface,
            config,
            left: Vec::new(),
            right: Vec::new(),
            hover: HoverTracker::new(),
            drawn_hover: None,
            ops: Vec::new(),
            popup: None,
            tooltip_area: None,
            pending: Arc::new(AtomicBool::new(false)),
            redraws: 0,
            installed: Installed::default(),
        }
    }

    /// Attach the popup tooltips are shown in.
    #[must_use]
    pub fn with_popup(mut self, popup: impl Popup + 'static) -> Self {
        self.popup = Some(Box::new(popup));
        self
    }

    /// Append a block to one side. Right blocks are listed from the screen
    /// edge inwards.
    pub fn push(&mut self, side: Side, block: impl Block + 'static) -> BlockId {
        let list = self.side_mut(side);
        list.push(BlockInfo::new(Box::new(block)));
        BlockId {
            side,
            index: list.len() - 1,
        }
    }

    pub fn push_left(&mut self, block: impl Block + 'static) -> BlockId {
        self.push(Side::Left, block)
    }

    pub fn push_right(&mut self, block: impl Block + 'static) -> BlockId {
        self.push(Side::Right, block)
    }

    fn side_mut(&mut self, side: Side) -> &mut Vec<BlockInfo> {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    #[must_use]
    pub fn config(&self) -> &BarConfig {
        &self.config
    }

    pub fn surface(&self) -> &D {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut D {
        &mut self.surface
    }

    #[must_use]
    pub fn blocks(&self, side: Side) -> &[BlockInfo] {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&BlockInfo> {
        self.blocks(id.side).get(id.index)
    }

    fn block_mut(&mut self, id: BlockId) -> Option<&mut BlockInfo> {
        self.side_mut(id.side).get_mut(id.index)
    }

    /// Hovered block as of the last redraw.
    #[must_use]
    pub fn hovered(&self) -> Option<BlockId> {
        self.drawn_hover
    }

    /// Area of the visible tooltip, if any.
    #[must_use]
    pub fn tooltip_area(&self) -> Option<Rect> {
        self.tooltip_area
    }

    pub fn popup_mut(&mut self) -> Option<&mut (dyn Popup + 'static)> {
        self.popup.as_deref_mut()
    }

    /// Number of completed redraw passes.
    #[must_use]
    pub fn redraw_count(&self) -> u64 {
        self.redraws
    }

    /// Whether an Expose is already on its way.
    #[must_use]
    pub fn is_redraw_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// A repaint trigger for worker threads, coalesced with the bar's own
    /// requests.
    #[must_use]
    pub fn redraw_flag(&self, handle: LoopHandle) -> RedrawFlag {
        RedrawFlag::new(Arc::clone(&self.pending), handle)
    }

    /// Post one Expose unless one is already pending.
    pub fn request_redraw<S>(&self, sched: &Scheduler<S>) {
        if !self.pending.swap(true, Ordering::AcqRel) {
            sched.post(Event::Expose);
        }
    }

    /// First block whose last rectangle contains `p`.
    #[must_use]
    pub fn hit_test(&self, p: Point) -> Option<BlockId> {
        let find = |list: &[BlockInfo], side: Side| {
            list.iter()
                .position(|info| info.rect.contains(p))
                .map(|index| BlockId { side, index })
        };
        find(&self.left, Side::Left).or_else(|| find(&self.right, Side::Right))
    }

    /// Feed a pointer event into hover tracking.
    ///
    /// Returns `true` if the next pass may show a different tooltip.
    pub fn pointer(&mut self, event: &PointerEvent) -> bool {
        match event.kind {
            PointerEventKind::Motion | PointerEventKind::Enter => {
                let hit = self.hit_test(event.position);
                self.hover.pointer_moved(hit);
            }
            PointerEventKind::Leave => self.hover.pointer_left(),
            PointerEventKind::Press(_) | PointerEventKind::Release(_) => return false,
        }
        self.hover.current() != self.drawn_hover
            || self.hover.flags().contains(HoverFlags::THREATENED)
    }

    /// Run a block's update. Failures are logged and hide the block until
    /// the next successful update.
    pub fn update_block(&mut self, id: BlockId) {
        let Some(info) = self.block_mut(id) else {
            return;
        };
        match info.block.update() {
            Ok(()) => {
                if info.failed {
                    tracing::info!(block = info.block.name(), "block recovered");
                }
                info.failed = false;
            }
            Err(err) => {
                tracing::warn!(block = info.block.name(), error = %err, "block update failed");
                info.failed = true;
            }
        }
    }

    pub fn animate_block(&mut self, id: BlockId, elapsed: Duration) {
        if let Some(info) = self.block_mut(id) {
            info.block.animate(elapsed);
        }
    }

    /// One full redraw pass.
    pub fn redraw(&mut self, now: Instant) {
        let _span = debug_span!(
            "sbar.redraw",
            duration_us = tracing::field::Empty,
            visible = tracing::field::Empty
        )
        .entered();
        let start = Instant::now();
        self.pending.store(false, Ordering::Release);

        let hovered = self.hover.resolve();
        self.drawn_hover = hovered;

        let full = Rect::new(0, 0, self.surface.width(), self.config.height);
        self.surface.fill_rect(full, self.config.background);

        let ops = std::mem::take(&mut self.ops);
        let ops = layout_left(&mut self.surface, &mut self.left, &self.config, now, ops);
        let ops = layout_right(&mut self.surface, &mut self.right, &self.config, now, ops);
        self.ops = self.tooltip(hovered, now, ops);

        self.redraws += 1;
        let visible = self
            .left
            .iter()
            .chain(&self.right)
            .filter(|info| !info.rect.is_empty())
            .count();
        let span = tracing::Span::current();
        span.record("visible", visible);
        span.record("duration_us", start.elapsed().as_micros() as u64);
    }

    fn tooltip(&mut self, hovered: Option<BlockId>, now: Instant, ops: Vec<DrawOp>) -> Vec<DrawOp> {
        let Some(popup) = self.popup.as_deref_mut() else {
            return ops;
        };
        let screen_width = self.surface.width();
        let config = self.config;
        let bar_height = config.height;
        let info = match hovered {
            Some(BlockId {
                side: Side::Left,
                index,
            }) => self.left.get_mut(index),
            Some(BlockId {
                side: Side::Right,
                index,
            }) => self.right.get_mut(index),
            None => None,
        };
        let Some(info) = info.filter(|info| info.block.has_tooltip() && !info.rect.is_empty())
        else {
            popup.hide();
            self.tooltip_area = None;
            return ops;
        };

        let anchor = info.rect;
        let elapsed = BlockInfo::since(&mut info.last_tooltip, now);
        let mut buffer = BufferedSurface::with_ops(popup.surface(), ops);
        info.block.draw_tooltip(&mut buffer, elapsed, anchor.width);
        let content = buffer.calculate_size();
        let mut ops = buffer.into_ops();
        if content.is_empty() {
            popup.hide();
            self.tooltip_area = None;
            ops.clear();
            return ops;
        }

        let pad = config.tooltip_padding;
        let size = Size::new(content.width + 2 * pad, content.height + 2 * pad);
        let area = place_tooltip(anchor, size, screen_width, bar_height + config.tooltip_gap);
        popup.show(area);
        let target = popup.surface();
        for op in &ops {
            op.apply(&mut *target, pad, pad);
        }
        ops.clear();
        self.tooltip_area = Some(area);
        ops
    }

    /// Schedule every block's update and animate tasks on `sched` and
    /// register the bar's event handlers.
    ///
    /// `access` locates the bar inside the loop state. Updates run once
    /// right away, then on their interval. The first redraw is requested
    /// immediately.
    pub fn install<S>(&mut self, sched: &mut Scheduler<S>, access: fn(&mut S) -> &mut Bar<D>)
    where
        S: 'static,
        D: 'static,
    {
        let now = sched.now();
        let ids = (0..self.left.len())
            .map(BlockId::left)
            .chain((0..self.right.len()).map(BlockId::right));
        for id in ids {
            let Some(info) = self.block(id) else {
                continue;
            };
            let caps = info.block.caps();
            let update_interval = info.block.update_interval();
            let animate_interval = info.block.animate_interval();
            if caps.contains(BlockCaps::UPDATE) {
                if let Some(interval) = update_interval {
                    let task = sched.schedule_every_from(now, interval, move |state, sched, _| {
                        let bar = access(state);
                        bar.update_block(id);
                        bar.request_redraw(sched);
                        Ok(())
                    });
                    self.installed.tasks.push(task);
                }
            }
            if caps.contains(BlockCaps::ANIMATE) {
                if let Some(interval) = animate_interval {
                    let task = sched.schedule_every(interval, move |state, sched, elapsed| {
                        let bar = access(state);
                        bar.animate_block(id, elapsed);
                        bar.request_redraw(sched);
                        Ok(())
                    });
                    self.installed.tasks.push(task);
                }
            }
        }

        let expose = sched.on(EventKind::Expose, move |state, sched, _| {
            access(state).redraw(sched.now());
            Ok(())
        });
        let pointer = sched.on(EventKind::Pointer, move |state, sched, event| {
            if let Event::Pointer(pointer) = event {
                let bar = access(state);
                if bar.pointer(pointer) {
                    bar.request_redraw(sched);
                }
            }
            Ok(())
        });
        let resize = sched.on(EventKind::Resize, move |state, sched, _| {
            access(state).request_redraw(sched);
            Ok(())
        });
        self.installed.handlers.extend([expose, pointer, resize]);
        tracing::debug!(
            left = self.left.len(),
            right = self.right.len(),
            tasks = self.installed.tasks.len(),
            "bar installed"
        );
        self.request_redraw(sched);
    }

    /// Cancel everything [`install`](Self::install) scheduled.
    pub fn uninstall<S>(&mut self, sched: &mut Scheduler<S>) {
        for task in self.installed.tasks.drain(..) {
            sched.cancel(task);
        }
        for handler in self.installed.handlers.drain(..) {
            sched.off(handler);
        }
    }
}

impl<D> fmt::Debug for Bar<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bar")
            .field("config", &self.config)
            .field("left", &self.left)
            .field("right", &self.right)
            .field("hovered", &self.drawn_hover)
            .field("tooltip_area", &self.tooltip_area)
            .field("redraws", &self.redraws)
            .finish()
    }
}

fn divider(surface: &mut dyn Surface, x: i32, config: &BarConfig) {
    let h = config.height;
    let inset = h / 4;
    surface.line(
        Point::new(x, inset),
        Point::new(x, h - 1 - inset),
        config.separator_color,
    );
}

fn layout_left(
    surface: &mut dyn Surface,
    blocks: &mut [BlockInfo],
    config: &BarConfig,
    now: Instant,
    mut ops: Vec<DrawOp>,
) -> Vec<DrawOp> {
    let height = config.height;
    let gap = config.separator_gap;
    let mut x = 0;
    let mut prev_end: Option<i32> = None;
    for info in blocks.iter_mut() {
        if !info.visible() {
            info.rect = Rect::default();
            continue;
        }
        let elapsed = BlockInfo::since(&mut info.last_draw, now);
        let mut buffer = BufferedSurface::with_ops(&mut *surface, ops);
        let width = info.block.draw(&mut buffer, elapsed).max(0);
        if let Some(end) = prev_end {
            divider(buffer.target_mut(), end + gap / 2, config);
        }
        buffer.replay(x, 0);
        ops = buffer.into_ops();
        ops.clear();

        info.rect = Rect::new(x, 0, width, height);
        prev_end = Some(x + width);
        x += width + gap;
    }
    ops
}

fn layout_right(
    surface: &mut dyn Surface,
    blocks: &mut [BlockInfo],
    config: &BarConfig,
    now: Instant,
    mut ops: Vec<DrawOp>,
) -> Vec<DrawOp> {
    let height = config.height;
    let gap = config.separator_gap;
    let mut x = surface.width();
    let mut drawn_any = false;
    for info in blocks.iter_mut() {
        if !info.visible() {
            info.rect = Rect::default();
            continue;
        }
        let elapsed = BlockInfo::since(&mut info.last_draw, now);
        let mut buffer = BufferedSurface::with_ops(&mut *surface, ops);
        let width = info.block.draw(&mut buffer, elapsed).max(0);
        if drawn_any {
            x -= gap;
            divider(buffer.target_mut(), x + gap / 2, config);
        }
        x -= width;
        buffer
            .target_mut()
            .fill_rect(Rect::new(x, 0, width, height), config.background);
        buffer.replay(x, 0);
        ops = buffer.into_ops();
        ops.clear();

        info.rect = Rect::new(x, 0, width, height);
        drawn_any = true;
    }
    ops
}

/// Center `size` under `anchor`, keep it on screen, and put its top at `y`.
fn place_tooltip(anchor: Rect, size: Size, screen_width: i32, y: i32) -> Rect {
    let mut x = anchor.x + anchor.width / 2 - size.width / 2;
    if x + size.width > screen_width {
        x = screen_width - size.width;
    }
    x = x.max(0);
    Rect::new(x, y, size.width, size.height)
}
