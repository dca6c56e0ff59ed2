//! Synthetic price generation.
//!
//! The generator produces plausible ticks when live data is unavailable and
//! drives the standalone simulation mode. Prices follow a bounded random walk:
//!
//! - The first price for a symbol is anchored to the sum of the first and last
//!   byte of its label, plus one small perturbation. The anchor is stable
//!   across runs, so a symbol always starts in the same neighborhood.
//! - Every subsequent price moves by a uniform delta bounded to ±2% of the
//!   previous price, which keeps the walk from drifting off to extremes.
//!
//! `percent_change` is `change / price` with a guard for a zero price, and
//! volumes are uniform in `[1000, 11000)` independent of price.

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::rngs::ThreadRng;

use crate::Tick;
use crate::interval::SeriesPlan;

/// Relative bound on a single walk step.
const WALK_STEP_BOUND: f64 = 0.02;
/// Half-width of the perturbation applied to a symbol's anchor price.
const ANCHOR_JITTER: f64 = 1.0;
/// Volume range, lower bound inclusive, upper exclusive.
const VOLUME_RANGE: std::ops::Range<u64> = 1000..11000;

/// Stateless synthetic tick generator.
///
/// Callers own the walk state: they pass the previous price in and store the
/// new one. That keeps a single source of truth for "current price" wherever
/// the generator is used (the client's price map, the simulator's own map).
pub struct SyntheticGenerator;

impl SyntheticGenerator {
    /// Stable per-symbol baseline: sum of the first and last byte of the label.
    pub fn anchor_price(symbol: &str) -> f64 {
        let bytes = symbol.as_bytes();
        let first = bytes.first().copied().unwrap_or(0) as f64;
        let last = bytes.last().copied().unwrap_or(0) as f64;
        first + last
    }

    /// Generate the next tick for `symbol`.
    ///
    /// With a previous price the walk rule applies; without one the anchor
    /// price (plus jitter) seeds the series.
    pub fn next_tick(symbol: &str, last_price: Option<f64>) -> Tick {
        let mut rng = rand::rng();
        match last_price {
            Some(prev) => Self::walk_at(symbol, prev, Utc::now(), &mut rng),
            None => {
                let base = Self::anchor_price(symbol);
                let change = rng.random_range(-ANCHOR_JITTER..ANCHOR_JITTER);
                Self::build(symbol, base + change, change, Utc::now(), &mut rng)
            }
        }
    }

    /// Synthesize a full history series for `symbol` over `interval_label`.
    ///
    /// Walks forward from `now - point_count * step` to `now`, oldest first,
    /// starting at the symbol's anchor price.
    pub fn history_series(symbol: &str, interval_label: &str) -> Vec<Tick> {
        let plan = SeriesPlan::for_label(interval_label);
        let now = Utc::now();
        let mut rng = rand::rng();

        let mut series = Vec::with_capacity(plan.point_count);
        let mut price = Self::anchor_price(symbol);
        for offset in (0..plan.point_count).rev() {
            let timestamp = now - plan.step * offset as i32;
            let tick = Self::walk_at(symbol, price, timestamp, &mut rng);
            price = tick.price;
            series.push(tick);
        }
        series
    }

    /// One walk step from `prev`.
    fn walk_at(symbol: &str, prev: f64, timestamp: DateTime<Utc>, rng: &mut ThreadRng) -> Tick {
        let change = rng.random_range(-WALK_STEP_BOUND..WALK_STEP_BOUND) * prev;
        Self::build(symbol, prev + change, change, timestamp, rng)
    }

    fn build(
        symbol: &str,
        price: f64,
        change: f64,
        timestamp: DateTime<Utc>,
        rng: &mut ThreadRng,
    ) -> Tick {
        let percent_change = if price == 0.0 { 0.0 } else { change / price };
        Tick {
            symbol: symbol.to_string(),
            price,
            change,
            percent_change,
            volume: rng.random_range(VOLUME_RANGE),
            timestamp,
        }
    }
}
