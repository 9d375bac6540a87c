//! Per-frame callback pipeline
//!
//! Holds an ordered list of callbacks that are invoked once per animation
//! tick. Ordering is significant: the tracking update must run before
//! anything that reads camera pose or visibility, and the render callback
//! must always be registered last.

use std::time::Instant;

use anyhow::{Context as _, Result};

/// Upper bound on the per-tick delta, in seconds. Guards against large
/// pauses (window minimized, debugger) producing runaway animation steps.
pub const MAX_DELTA_SECONDS: f32 = 0.2;

/// Nominal delta used for the very first tick, before any history exists.
const FIRST_TICK_DELTA: f32 = 1.0 / 60.0;

/// Timing information passed to every frame callback.
#[derive(Clone, Copy, Debug)]
pub struct Tick {
    /// Clamped elapsed time since the previous tick, in seconds.
    pub delta_seconds: f32,
    /// Time since the scheduler was created, in seconds.
    pub now_seconds: f64,
}

type Callback<C> = Box<dyn FnMut(&mut C, Tick) -> Result<()>>;

/// Ordered per-tick callback list.
///
/// Failure semantics are fail-fast: the first callback that returns an
/// error aborts the remaining callbacks for that tick and the error is
/// surfaced to the caller of [`FrameScheduler::tick`].
pub struct FrameScheduler<C> {
    callbacks: Vec<(&'static str, Callback<C>)>,
    epoch: Instant,
    last_tick: Option<Instant>,
}

impl<C> FrameScheduler<C> {
    pub fn new() -> Self {
        Self {
            callbacks: Vec::new(),
            epoch: Instant::now(),
            last_tick: None,
        }
    }

    /// Append a callback. Callbacks run in registration order every tick.
    pub fn register(
        &mut self,
        name: &'static str,
        callback: impl FnMut(&mut C, Tick) -> Result<()> + 'static,
    ) {
        self.callbacks.push((name, Box::new(callback)));
    }

    /// Run one tick at time `now`, invoking every callback in order.
    pub fn tick(&mut self, now: Instant, ctx: &mut C) -> Result<()> {
        let delta_seconds = match self.last_tick {
            Some(last) => now
                .saturating_duration_since(last)
                .as_secs_f32()
                .min(MAX_DELTA_SECONDS),
            None => FIRST_TICK_DELTA,
        };
        self.last_tick = Some(now);

        let tick = Tick {
            delta_seconds,
            now_seconds: now.saturating_duration_since(self.epoch).as_secs_f64(),
        };

        for (name, callback) in &mut self.callbacks {
            callback(ctx, tick).with_context(|| format!("frame callback `{name}` failed"))?;
        }
        Ok(())
    }
}

impl<C> Default for FrameScheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}
