//! Rush-hour playback shown while a day close is in flight.
//!
//! The plan splits the day's profit into timed ticks of customer sales for
//! presentation. It never reads or writes the session; the orchestrator owns
//! the clock and may drop the plan at any point.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RushConfig {
    /// Total length of the rush in milliseconds.
    pub duration_ms: u64,
    /// Interval between progress reports in milliseconds (> 0).
    pub step_ms: u64,
}

impl Default for RushConfig {
    fn default() -> Self {
        Self {
            duration_ms: 8000,
            step_ms: 400,
        }
    }
}

impl RushConfig {
    /// Number of progress reports, at least one.
    pub fn ticks(&self) -> u32 {
        if self.step_ms == 0 {
            return 1;
        }
        let n = (self.duration_ms as f64 / self.step_ms as f64).round();
        (n as u32).max(1)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.step_ms)
    }
}

/// One progress report of the rush.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RushTick {
    /// 1-based tick number.
    pub tick: u32,
    /// Progress in percent, capped at 100.
    pub progress_pct: f64,
    /// Customers served this tick (1..=3).
    pub customers: u32,
    /// Per-customer sale amounts; they jitter around an even split of the
    /// tick's share of profit.
    pub portions: Vec<f64>,
    /// Profit shown so far, reaching the day's profit on the last tick.
    pub earned: f64,
}

/// Seeded iterator over the rush ticks for one day.
#[derive(Clone, Debug)]
pub struct RushPlan {
    profit: f64,
    ticks: u32,
    tick: u32,
    earned: f64,
    rng: ChaCha8Rng,
}

impl RushPlan {
    pub fn new(profit: f64, cfg: &RushConfig, seed: u64) -> Self {
        Self {
            profit,
            ticks: cfg.ticks(),
            tick: 0,
            earned: 0.0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    fn variance(&mut self, chunk: f64, customers: u32) -> f64 {
        if customers <= 1 {
            return 0.0;
        }
        let magnitude = chunk.abs() / f64::from((customers * 4).max(1));
        (self.rng.gen::<f64>() - 0.5) * magnitude
    }
}

impl Iterator for RushPlan {
    type Item = RushTick;

    fn next(&mut self) -> Option<RushTick> {
        if self.tick >= self.ticks {
            return None;
        }
        self.tick += 1;
        let ratio = f64::from(self.tick) / f64::from(self.ticks);
        let target = self.profit * ratio;
        let chunk = target - self.earned;
        self.earned = target;

        let customers = ((self.rng.gen::<f64>() * 2.0).round() as u32 + 1).max(1);
        let mut portions = Vec::with_capacity(customers as usize);
        for _ in 0..customers {
            let jitter = self.variance(chunk, customers);
            portions.push(chunk / f64::from(customers) + jitter);
        }
        Some(RushTick {
            tick: self.tick,
            progress_pct: (ratio * 100.0).min(100.0),
            customers,
            portions,
            earned: self.earned,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.ticks - self.tick) as usize;
        (left, Some(left))
    }
}
