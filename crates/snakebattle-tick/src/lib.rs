//! Fixed-period tick scheduler for the Snake Battle tick driver.
//!
//! One scheduler drives every room: the server's tick task waits for the
//! next tick, steps all running games under the registry lock, and reports
//! back how long that took so overruns can be spotted.
//!
//! ```ignore
//! let mut scheduler = TickScheduler::new(TickConfig::with_period(period));
//! loop {
//!     let info = scheduler.wait_for_tick().await;
//!     registry.lock().await.tick_all();
//!     scheduler.record_tick_end();
//! }
//! ```
//!
//! All timing uses Tokio's clock, so tests can drive the scheduler with
//! paused time.

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when the tick loop falls behind schedule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TickPolicy {
    /// Skip the missed tick(s) and resume one period from now.
    #[default]
    Skip,
    /// Fire missed ticks back to back, up to `max_catchup` of them; beyond
    /// that, fall back to skipping.
    CatchUp {
        /// Hard cap on consecutive catch-up ticks.
        max_catchup: u32,
    },
    /// Keep the original cadence; the next tick fires at its originally
    /// scheduled instant.
    Drop,
}

/// Full configuration for the tick scheduler.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between ticks.
    pub period: Duration,
    /// Overrun handling policy.
    pub policy: TickPolicy,
    /// Fraction of the period (0.0–1.0) above which a tick's work is
    /// logged as approaching the budget.
    pub budget_warn_threshold: f64,
    /// Collect average/max tick-time metrics.
    pub metrics_enabled: bool,
    /// Upper bound of the random delay added before the first tick.
    pub initial_jitter: Duration,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(150),
            policy: TickPolicy::default(),
            budget_warn_threshold: 0.80,
            metrics_enabled: true,
            initial_jitter: Duration::ZERO,
        }
    }
}

impl TickConfig {
    /// Shortest period the scheduler accepts.
    pub const MIN_PERIOD: Duration = Duration::from_millis(1);

    /// A config for `period` with default settings.
    pub fn with_period(period: Duration) -> Self {
        Self {
            period,
            ..Default::default()
        }
    }

    /// Clamps out-of-range values so the config is safe to use.
    ///
    /// Called by [`TickScheduler::new`].
    pub fn validated(mut self) -> Self {
        if self.period < Self::MIN_PERIOD {
            warn!(
                period_ms = self.period.as_secs_f64() * 1000.0,
                "tick period below minimum, clamping"
            );
            self.period = Self::MIN_PERIOD;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }
}

// ---------------------------------------------------------------------------
// Tick info
// ---------------------------------------------------------------------------

/// Information about a tick, returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// Fixed time step for this tick (always the configured period).
    pub dt: Duration,
    /// `true` if this tick fired more than 10% of a period late.
    pub overrun: bool,
    /// Ticks abandoned to get back on schedule (0 in normal operation).
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Runtime metrics for the tick scheduler.
///
/// Timing values refer to the work measured between
/// [`TickScheduler::wait_for_tick`] and [`TickScheduler::record_tick_end`].
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    /// Exponential moving average of tick work time (α = 0.1).
    pub avg_tick_time: Duration,
    pub max_tick_time: Duration,
    /// Work time of the last tick as a fraction of the period. Above 1.0
    /// means the work alone overran.
    pub budget_utilization: f64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-period tick scheduler.
pub struct TickScheduler {
    config: TickConfig,
    tick_count: u64,
    next_tick: Instant,
    /// When the current tick's work started. Set by `wait_for_tick`,
    /// consumed by `record_tick_end`.
    tick_start: Option<Instant>,
    metrics: TickMetrics,
}

impl TickScheduler {
    /// Creates a scheduler whose first tick is one period (plus jitter)
    /// from now.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();

        let jitter = if config.initial_jitter.is_zero() {
            Duration::ZERO
        } else {
            let max_us = config.initial_jitter.as_micros().min(u128::from(u64::MAX)) as u64;
            Duration::from_micros(rand::rng().random_range(0..=max_us))
        };

        debug!(
            period_ms = config.period.as_secs_f64() * 1000.0,
            policy = ?config.policy,
            "tick scheduler created"
        );

        Self {
            next_tick: Instant::now() + config.period + jitter,
            config,
            tick_count: 0,
            tick_start: None,
            metrics: TickMetrics::default(),
        }
    }

    /// A scheduler for `period` with default settings.
    pub fn with_period(period: Duration) -> Self {
        Self::new(TickConfig::with_period(period))
    }

    /// Waits until the next tick is due.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let due = self.next_tick;
        let period = self.config.period;
        time::sleep_until(due).await;

        let now = Instant::now();
        self.tick_count += 1;
        self.tick_start = Some(now);

        let late_by = now.saturating_duration_since(due);
        let overrun = late_by > period / 10;
        let behind = periods_in(late_by, period);
        let mut ticks_skipped = 0;

        self.next_tick = match self.config.policy {
            TickPolicy::Skip => {
                if overrun && behind > 0 {
                    ticks_skipped = behind;
                    warn!(
                        tick = self.tick_count,
                        skipped = behind,
                        late_ms = late_by.as_secs_f64() * 1000.0,
                        "tick overrun, skipping ahead"
                    );
                }
                now + period
            }
            TickPolicy::CatchUp { max_catchup } => {
                let max_catchup = u64::from(max_catchup);
                if overrun && behind > 0 {
                    ticks_skipped = behind.saturating_sub(max_catchup);
                    warn!(
                        tick = self.tick_count,
                        behind,
                        catching_up = behind.min(max_catchup),
                        skipping = ticks_skipped,
                        "tick overrun, catching up"
                    );
                }
                if behind <= max_catchup {
                    due + period
                } else {
                    now + period
                }
            }
            TickPolicy::Drop => {
                if overrun {
                    warn!(
                        tick = self.tick_count,
                        late_ms = late_by.as_secs_f64() * 1000.0,
                        "tick overrun, keeping original cadence"
                    );
                }
                due + period
            }
        };

        if overrun {
            self.metrics.total_overruns += 1;
        }
        self.metrics.total_skipped += ticks_skipped;
        self.metrics.total_ticks += 1;

        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            dt: period,
            overrun,
            ticks_skipped,
        }
    }

    /// Records that the work for the current tick has finished.
    ///
    /// Feeds budget warnings and metrics. Does nothing if no tick is in
    /// progress.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.tick_start.take() else {
            return;
        };
        let elapsed = start.elapsed();
        let period = self.config.period;
        let utilization = elapsed.as_secs_f64() / period.as_secs_f64();
        self.metrics.budget_utilization = utilization;

        if utilization >= 1.0 {
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = period.as_secs_f64() * 1000.0,
                "tick exceeded budget"
            );
        } else if utilization >= self.config.budget_warn_threshold {
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = period.as_secs_f64() * 1000.0,
                utilization_pct = format!("{:.1}", utilization * 100.0),
                "tick approaching budget limit"
            );
        }

        if self.config.metrics_enabled {
            if elapsed > self.metrics.max_tick_time {
                self.metrics.max_tick_time = elapsed;
            }
            let alpha = 0.1;
            let prev = self.metrics.avg_tick_time.as_secs_f64();
            let curr = elapsed.as_secs_f64();
            self.metrics.avg_tick_time =
                Duration::from_secs_f64(prev * (1.0 - alpha) + curr * alpha);
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }

    pub fn period(&self) -> Duration {
        self.config.period
    }

    pub fn policy(&self) -> TickPolicy {
        self.config.policy
    }
}

/// Whole periods contained in `span`.
fn periods_in(span: Duration, period: Duration) -> u64 {
    let ticks = span.as_nanos() / period.as_nanos().max(1);
    u64::try_from(ticks).unwrap_or(u64::MAX)
}
