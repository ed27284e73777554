//! Cancellable phase countdown for Kutob.
//!
//! Most phases of the day/night cycle end when a fixed number of seconds
//! runs out, and clients show the seconds ticking down. A [`Countdown`]
//! produces those ticks.
//!
//! # Idle mode
//!
//! When no countdown is running, [`Countdown::wait_for_tick`] pends
//! forever. That is what the night-actions phase wants: it only advances
//! when players act.
//!
//! # Integration
//!
//! The countdown is owned by a room actor and sits in its `tokio::select!`
//! loop next to the command channel:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* actions, disconnects, ... */ }
//!         tick = countdown.wait_for_tick() => match tick {
//!             CountdownTick::Remaining(secs) => { /* publish secs */ }
//!             CountdownTick::Elapsed => { /* enter next phase */ }
//!         }
//!     }
//! }
//! ```
//!
//! Dropping the `wait_for_tick` future (because the other branch won) loses
//! nothing: the deadline lives in the struct, not in the future.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for a room's countdown.
#[derive(Debug, Clone)]
pub struct CountdownConfig {
    /// Wall-clock length of one countdown "second". Production uses one
    /// real second; demos and tests shrink it.
    pub tick_interval: Duration,
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
        }
    }
}

impl CountdownConfig {
    /// Shortest accepted tick interval.
    pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

    pub fn with_interval(tick_interval: Duration) -> Self {
        Self { tick_interval }
    }

    /// Clamps a zero interval, which would spin the actor loop.
    pub fn validated(mut self) -> Self {
        if self.tick_interval < Self::MIN_TICK_INTERVAL {
            warn!(
                interval_us = self.tick_interval.as_micros() as u64,
                "countdown tick interval below minimum, clamping"
            );
            self.tick_interval = Self::MIN_TICK_INTERVAL;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Tick
// ---------------------------------------------------------------------------

/// What [`Countdown::wait_for_tick`] resolved with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownTick {
    /// This many seconds are left. Emitted once per tick, starting with the
    /// full duration and ending with 1.
    Remaining(u32),
    /// The countdown ran out. The countdown is idle again afterwards.
    Elapsed,
}

// ---------------------------------------------------------------------------
// Countdown
// ---------------------------------------------------------------------------

/// A restartable, cancellable countdown. One per room actor.
pub struct Countdown {
    config: CountdownConfig,
    remaining: u32,
    /// When the next tick is due. `None` while idle.
    next_tick: Option<Instant>,
    /// Bumped on every `start`, so callers can tell countdowns apart.
    generation: u64,
}

impl Countdown {
    pub fn new(config: CountdownConfig) -> Self {
        let config = config.validated();
        debug!(
            interval_ms = config.tick_interval.as_secs_f64() * 1000.0,
            "countdown created"
        );
        Self {
            config,
            remaining: 0,
            next_tick: None,
            generation: 0,
        }
    }

    pub fn with_interval(tick_interval: Duration) -> Self {
        Self::new(CountdownConfig::with_interval(tick_interval))
    }

    /// Starts counting down from `seconds`, replacing any running
    /// countdown. The first tick fires immediately.
    ///
    /// `start(0)` elapses on the next poll without any `Remaining` tick.
    pub fn start(&mut self, seconds: u32) {
        if self.next_tick.is_some() {
            debug!(
                remaining = self.remaining,
                "countdown restarted before elapsing"
            );
        }
        self.remaining = seconds;
        self.next_tick = Some(Instant::now());
        self.generation += 1;
        debug!(seconds, generation = self.generation, "countdown started");
    }

    /// Stops the countdown. Returns `true` if one was running.
    ///
    /// Safe to call when idle.
    pub fn cancel(&mut self) -> bool {
        let was_running = self.next_tick.take().is_some();
        if was_running {
            debug!(
                remaining = self.remaining,
                generation = self.generation,
                "countdown cancelled"
            );
        }
        self.remaining = 0;
        was_running
    }

    /// Waits for the next tick of the running countdown.
    ///
    /// Pends forever while idle. `tokio::select!` still polls its other
    /// branches, so an idle countdown simply never wins.
    pub async fn wait_for_tick(&mut self) -> CountdownTick {
        let Some(next) = self.next_tick else {
            std::future::pending::<()>().await;
            unreachable!()
        };

        time::sleep_until(next).await;

        if self.remaining == 0 {
            self.next_tick = None;
            trace!(generation = self.generation, "countdown elapsed");
            return CountdownTick::Elapsed;
        }

        let remaining = self.remaining;
        self.remaining -= 1;
        // Keep the original cadence: a late wakeup doesn't stretch the
        // countdown.
        self.next_tick = Some(next + self.config.tick_interval);
        trace!(remaining, "countdown tick");
        CountdownTick::Remaining(remaining)
    }

    pub fn is_running(&self) -> bool {
        self.next_tick.is_some()
    }

    /// Seconds still to be announced (0 when idle).
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn tick_interval(&self) -> Duration {
        self.config.tick_interval
    }
}
