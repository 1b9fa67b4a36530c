#![forbid(unsafe_code)]

//! sbar-demo: a headless status bar.
//!
//! Runs a clock, an uptime reader fed by a worker thread, and a tick
//! counter on a software canvas until signalled or until `--exit-after-ms`
//! elapses, then optionally dumps the last frame as a PPM image.

mod blocks;
mod cli;

use std::fs::File;
use std::io::BufWriter;
use std::process;
use std::time::Duration;

use sbar::{
    Bar, BarConfig, Canvas, CanvasPopup, Color, DirectSurface, Event, EventKind, EventLoop,
    FixedFace, FontSet, PointerEvent, Shared, TextCache, TextCacheConfig, Worker,
};
use tracing_subscriber::EnvFilter;

use crate::blocks::{ClockBlock, CounterBlock, UptimeBlock};
use crate::cli::Opts;

type DemoBar = Bar<DirectSurface<Canvas>>;

fn demo_bar(bar: &mut DemoBar) -> &mut DemoBar {
    bar
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("SBAR_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn text_cache(opts: &Opts) -> sbar::Result<TextCache> {
    let face = FixedFace::new("demo", 7, opts.height / 2, opts.height / 6);
    let fonts = FontSet::single(face)?;
    Ok(TextCache::with_config(
        fonts,
        TextCacheConfig {
            capacity: opts.cache_capacity,
        },
    ))
}

fn run(opts: &Opts) -> sbar::Result<()> {
    let config = BarConfig {
        height: opts.height,
        ..BarConfig::default()
    };
    let canvas = Canvas::new(opts.width, opts.height, config.background);
    let surface = DirectSurface::new(canvas, text_cache(opts)?);
    let popup = CanvasPopup::new(text_cache(opts)?, config.background);
    let foreground = config.foreground;
    let accent = Color::rgb(0x5f, 0xaf, 0xff);

    let mut ev = EventLoop::new(Bar::new(surface, config).with_popup(popup));
    let handle = ev.handle();

    let uptime = Shared::new(None);
    let redraw = ev.state().redraw_flag(handle.clone());
    let _worker = Worker::spawn(
        "uptime",
        handle.clone(),
        UptimeBlock::poll(uptime.clone(), redraw, Duration::from_secs(1)),
    )?;

    let (bar, sched) = ev.split_mut();
    bar.push_left(CounterBlock::new(foreground, accent));
    bar.push_right(ClockBlock::new(foreground));
    bar.push_right(UptimeBlock::new(uptime, foreground));
    bar.install(sched, demo_bar);

    #[cfg(unix)]
    let _signals = sbar::SignalSource::termination(handle.clone())?;
    ev.on(EventKind::Signal, |_, sched, event| {
        tracing::info!(?event, "terminating on signal");
        sched.stop();
        Ok(())
    });

    if opts.exit_after_ms > 0 {
        ev.scheduler_mut()
            .schedule_after(Duration::from_millis(opts.exit_after_ms), |_, sched, _| {
                sched.stop();
                Ok(())
            });
    }
    if let Some(x) = opts.hover {
        handle.post(Event::Pointer(PointerEvent::motion(x, opts.height / 2)));
    }

    ev.run()?;

    let stats = ev.state().surface().text_cache().stats();
    tracing::info!(
        redraws = ev.state().redraw_count(),
        hits = stats.hits,
        misses = stats.misses,
        evictions = stats.evictions,
        hit_rate = stats.hit_rate(),
        "text cache"
    );

    if let Some(path) = &opts.dump {
        let out = BufWriter::new(File::create(path)?);
        ev.state().surface().backend().write_ppm(out)?;
        tracing::info!(path = %path.display(), "frame written");
    }
    Ok(())
}

fn main() {
    let opts = Opts::parse();
    init_logging();
    if let Err(err) = run(&opts) {
        eprintln!("sbar-demo: {err}");
        process::exit(1);
    }
}
