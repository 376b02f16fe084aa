//! Statistics engine over a single day's price window
//!
//! Everything here is pure and synchronous. An empty window yields absent
//! values throughout so consumers can tell "no data yet" from a zero price.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::model::{PriceSlot, PriceWindow};

/// Tolerance when comparing block means, so float summation order cannot
/// break the earliest-start tie rule.
const MEAN_EPSILON: f64 = 1e-9;

/// A contiguous run of hourly slots
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Block {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub average: f64,
}

impl Block {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        is_block_active(now, self.start, self.end)
    }
}

/// Derived values of one day
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DerivedStatistics {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
    pub median: Option<f64>,
    pub cheapest_hour_start: Option<DateTime<Utc>>,
    pub cheapest_block: Option<Block>,
    pub most_expensive_hour_start: Option<DateTime<Utc>>,
}

impl DerivedStatistics {
    /// Compute every statistic for the window with the given block length
    pub fn compute(window: &PriceWindow, block_hours: usize) -> Self {
        Self {
            min: min_price(window),
            max: max_price(window),
            avg: average_price(window),
            median: median_price(window),
            cheapest_hour_start: cheapest_hour(window).map(|s| s.start),
            cheapest_block: cheapest_block(window, block_hours),
            most_expensive_hour_start: most_expensive_hour(window).map(|s| s.start),
        }
    }

    pub fn cheapest_block_start(&self) -> Option<DateTime<Utc>> {
        self.cheapest_block.map(|b| b.start)
    }
}

pub fn min_price(window: &PriceWindow) -> Option<f64> {
    cheapest_hour(window).map(|s| s.total_price)
}

pub fn max_price(window: &PriceWindow) -> Option<f64> {
    most_expensive_hour(window).map(|s| s.total_price)
}

pub fn average_price(window: &PriceWindow) -> Option<f64> {
    mean(window.slots())
}

/// Median of total prices; mean of the two central values for even counts
pub fn median_price(window: &PriceWindow) -> Option<f64> {
    let mut prices: Vec<f64> = window.totals().collect();
    if prices.is_empty() {
        return None;
    }
    prices.sort_by(f64::total_cmp);
    let mid = prices.len() / 2;
    if prices.len() % 2 == 1 {
        Some(prices[mid])
    } else {
        Some((prices[mid - 1] + prices[mid]) / 2.0)
    }
}

/// Slot with the lowest total price; the earliest wins ties
pub fn cheapest_hour(window: &PriceWindow) -> Option<&PriceSlot> {
    window.slots().iter().fold(None, |best, slot| match best {
        Some(b) if b.total_price <= slot.total_price => Some(b),
        _ => Some(slot),
    })
}

/// Slot with the highest total price; the earliest wins ties
pub fn most_expensive_hour(window: &PriceWindow) -> Option<&PriceSlot> {
    window.slots().iter().fold(None, |best, slot| match best {
        Some(b) if b.total_price >= slot.total_price => Some(b),
        _ => Some(slot),
    })
}

/// Lowest-mean run of `hours` consecutive slots
///
/// Every start index is evaluated, so the result is the true optimum over
/// contiguous blocks; the earliest start wins ties. Runs spanning a missing
/// hour are skipped. Absent when the window is shorter than the block or the
/// block length is zero.
pub fn cheapest_block(window: &PriceWindow, hours: usize) -> Option<Block> {
    let slots = window.slots();
    if hours == 0 || slots.len() < hours {
        return None;
    }
    let mut best: Option<Block> = None;
    for run in slots.windows(hours) {
        if !run.windows(2).all(|w| w[0].end == w[1].start) {
            continue;
        }
        let Some(average) = mean(run) else { continue };
        let improves = best.is_none_or(|b| average < b.average - MEAN_EPSILON);
        if improves {
            best = Some(Block {
                start: run[0].start,
                end: run[hours - 1].end,
                average,
            });
        }
    }
    best
}

/// Whether `now` falls inside `[block_start, block_end)`
pub fn is_block_active(
    now: DateTime<Utc>,
    block_start: DateTime<Utc>,
    block_end: DateTime<Utc>,
) -> bool {
    block_start <= now && now < block_end
}

#[allow(clippy::cast_precision_loss)]
fn mean(slots: &[PriceSlot]) -> Option<f64> {
    if slots.is_empty() {
        return None;
    }
    let sum: f64 = slots.iter().map(|s| s.total_price).sum();
    Some(sum / slots.len() as f64)
}
