#![forbid(unsafe_code)]

//! Blocks shown by the demo.

use std::fs;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sbar::{
    Block, BlockCaps, BlockError, CancelToken, Cancelled, Color, LoopHandle, Point, Rect,
    RedrawFlag, Shared, Surface,
};

/// UTC wall clock with a blinking colon.
pub struct ClockBlock {
    color: Color,
    seconds: u64,
    colon: bool,
}

impl ClockBlock {
    pub fn new(color: Color) -> Self {
        Self {
            color,
            seconds: 0,
            colon: true,
        }
    }

    fn label(&self) -> String {
        let day = self.seconds % 86_400;
        let sep = if self.colon { ':' } else { ' ' };
        format!("{:02}{sep}{:02}{sep}{:02} UTC", day / 3600, day / 60 % 60, day % 60)
    }
}

impl Block for ClockBlock {
    fn name(&self) -> &str {
        "clock"
    }

    fn caps(&self) -> BlockCaps {
        BlockCaps::UPDATE | BlockCaps::ANIMATE
    }

    fn draw(&mut self, surface: &mut dyn Surface, _elapsed: Duration) -> i32 {
        let label = self.label();
        surface
            .text(Point::new(0, surface.vcenter()), &label, self.color)
            .width
    }

    fn update_interval(&self) -> Option<Duration> {
        Some(Duration::from_secs(1))
    }

    fn update(&mut self) -> Result<(), BlockError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|err| BlockError::Other(err.to_string()))?;
        self.seconds = now.as_secs();
        Ok(())
    }

    fn animate_interval(&self) -> Option<Duration> {
        Some(Duration::from_millis(500))
    }

    fn animate(&mut self, _elapsed: Duration) {
        self.colon = !self.colon;
    }
}

/// System uptime read from `/proc/uptime` on a worker thread.
///
/// Hidden while no reading is available.
pub struct UptimeBlock {
    reading: Shared<Option<u64>>,
    color: Color,
}

impl UptimeBlock {
    pub fn new(reading: Shared<Option<u64>>, color: Color) -> Self {
        Self { reading, color }
    }

    /// The worker body: poll every `period` until cancelled.
    pub fn poll(
        reading: Shared<Option<u64>>,
        redraw: RedrawFlag,
        period: Duration,
    ) -> impl FnOnce(CancelToken, LoopHandle) -> Result<(), Cancelled> + Send + 'static {
        move |token, _handle| {
            loop {
                let secs = fs::read_to_string("/proc/uptime")
                    .ok()
                    .and_then(|s| parse_uptime(&s));
                if secs.is_none() {
                    tracing::debug!("uptime unavailable");
                }
                let changed = reading.update(|r| std::mem::replace(r, secs) != secs);
                if changed {
                    redraw.request();
                }
                token.wait(period)?;
            }
        }
    }
}

fn parse_uptime(contents: &str) -> Option<u64> {
    let first = contents.split_whitespace().next()?;
    let secs: f64 = first.parse().ok()?;
    (secs >= 0.0).then_some(secs as u64)
}

fn format_uptime(secs: u64) -> String {
    let (days, hours, mins) = (secs / 86_400, secs / 3600 % 24, secs / 60 % 60);
    if days > 0 {
        format!("up {days}d {hours:02}h")
    } else {
        format!("up {hours}h {mins:02}m")
    }
}

impl Block for UptimeBlock {
    fn name(&self) -> &str {
        "uptime"
    }

    fn caps(&self) -> BlockCaps {
        BlockCaps::SKIP
    }

    fn draw(&mut self, surface: &mut dyn Surface, _elapsed: Duration) -> i32 {
        let Some(secs) = self.reading.get() else {
            return 0;
        };
        surface
            .text(Point::new(0, surface.vcenter()), &format_uptime(secs), self.color)
            .width
    }

    fn skip(&self) -> bool {
        self.reading.get().is_none()
    }
}

/// A tick counter with an activity dot and a tooltip.
pub struct CounterBlock {
    ticks: u64,
    color: Color,
    accent: Color,
}

impl CounterBlock {
    pub fn new(color: Color, accent: Color) -> Self {
        Self {
            ticks: 0,
            color,
            accent,
        }
    }
}

impl Block for CounterBlock {
    fn name(&self) -> &str {
        "counter"
    }

    fn caps(&self) -> BlockCaps {
        BlockCaps::UPDATE | BlockCaps::TOOLTIP
    }

    fn draw(&mut self, surface: &mut dyn Surface, _elapsed: Duration) -> i32 {
        let radius = (surface.height() / 5).max(2);
        let cy = surface.vcenter();
        let dot = if self.ticks % 2 == 0 { self.accent } else { self.color };
        surface.fill_circle(Point::new(radius, cy), radius, dot);
        let x = 2 * radius + 4;
        let size = surface.text(Point::new(x, cy), &format!("#{}", self.ticks), self.color);
        x + size.width
    }

    fn update_interval(&self) -> Option<Duration> {
        Some(Duration::from_millis(250))
    }

    fn update(&mut self) -> Result<(), BlockError> {
        self.ticks += 1;
        Ok(())
    }

    fn draw_tooltip(&mut self, surface: &mut dyn Surface, _elapsed: Duration, hovered_width: i32) {
        let first = format!("ticks: {}", self.ticks);
        let second = format!("block width: {hovered_width}px");
        let line = surface.measure_text(&first).height;
        let a = surface.text(Point::new(2, 2 + line / 2), &first, self.color);
        let b = surface.text(Point::new(2, 2 + line + line / 2), &second, self.color);
        let width = a.width.max(b.width);
        surface.rect(Rect::new(0, 0, width + 4, 2 * line + 4), self.accent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uptime_parsing() {
        assert_eq!(parse_uptime("12345.67 54321.00\n"), Some(12345));
        assert_eq!(parse_uptime(""), None);
        assert_eq!(parse_uptime("nan-ish 1"), None);
    }

    #[test]
    fn uptime_formatting() {
        assert_eq!(format_uptime(3 * 3600 + 7 * 60), "up 3h 07m");
        assert_eq!(format_uptime(2 * 86_400 + 5 * 3600), "up 2d 05h");
    }

    #[test]
    fn clock_label() {
        let mut clock = ClockBlock::new(Color::WHITE);
        clock.seconds = 86_400 + 13 * 3600 + 4 * 60 + 9;
        assert_eq!(clock.label(), "13:04:09 UTC");
        clock.animate(Duration::ZERO);
        assert_eq!(clock.label(), "13 04 09 UTC");
    }
}
