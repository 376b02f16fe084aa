//! Published, consumer-facing view of the caches
//!
//! Values are rounded for display and converted to the configured timezone.
//! Anything unknown serializes as the string `"unavailable"`.

use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use serde::{Serialize, Serializer};

use crate::consumption::{ConsumptionState, daily_cost, daily_kwh};
use crate::logging::get_logger;
use crate::prices::{DayBounds, DayLabel, PerDay, PriceState};

pub const UNAVAILABLE: &str = "unavailable";

/// A value that may not be known yet
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading<T> {
    Available(T),
    Unavailable,
}

impl<T> From<Option<T>> for Reading<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Unavailable, Self::Available)
    }
}

impl<T: Serialize> Serialize for Reading<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Available(v) => v.serialize(serializer),
            Self::Unavailable => serializer.serialize_str(UNAVAILABLE),
        }
    }
}

/// Round half away from zero to `decimals` places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn price(value: Option<f64>) -> Reading<f64> {
    value.map(|v| round_to(v, 5)).into()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotView {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub net_price: f64,
    pub taxes_price: f64,
    pub total_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelinePoint {
    pub start_time: DateTime<FixedOffset>,
    pub price_per_kwh: f64,
}

/// Everything published for one day label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySummary {
    pub slots: Vec<SlotView>,
    pub min_price: Reading<f64>,
    pub max_price: Reading<f64>,
    pub avg_price: Reading<f64>,
    pub median_price: Reading<f64>,
    pub cheapest_hour: Reading<DateTime<FixedOffset>>,
    pub cheapest_block_start: Reading<DateTime<FixedOffset>>,
    pub cheapest_block_end: Reading<DateTime<FixedOffset>>,
    pub cheapest_block_active: bool,
    pub most_expensive_hour: Reading<DateTime<FixedOffset>>,
    pub consumption_kwh: Reading<f64>,
    pub cost: Reading<f64>,
}

/// Immutable snapshot handed to consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedSnapshot {
    pub generated_at: DateTime<FixedOffset>,
    pub prices_fetched_at: Reading<DateTime<FixedOffset>>,
    pub consumption_fetched_at: Reading<DateTime<FixedOffset>>,
    pub current_price: Reading<f64>,
    pub today_block_active: bool,
    pub tomorrow_block_active: bool,
    pub days: PerDay<DaySummary>,
    pub timeline: Vec<TimelinePoint>,
}

impl PublishedSnapshot {
    /// Build the view of both caches at `now`
    ///
    /// Day labels always follow `now`: both caches are relabeled against the
    /// current local day, whichever side of midnight they were fetched on.
    /// Without a consumption cache (no contract configured) the consumption
    /// and cost values are unavailable for every day.
    pub fn build(
        prices: &PriceState,
        consumption: Option<&ConsumptionState>,
        tz: Tz,
        now: DateTime<Utc>,
    ) -> Self {
        let local = |t: DateTime<Utc>| t.with_timezone(&tz).fixed_offset();
        let logger = get_logger("snapshot");
        let bounds = DayBounds::for_instant(now, tz);
        let prices = &prices.realigned(bounds);
        let consumption = consumption.map(|c| c.realigned(bounds));
        let consumption = consumption.as_ref();

        let days = PerDay::from_fn(|label| {
            let window = prices.windows.get(label);
            let stats = prices.statistics.get(label);
            let records = consumption.map(|c| c.records.get(label).as_slice());
            DaySummary {
                slots: window
                    .slots()
                    .iter()
                    .map(|s| SlotView {
                        start: local(s.start),
                        end: local(s.end),
                        net_price: round_to(s.net_price, 5),
                        taxes_price: round_to(s.taxes_price, 5),
                        total_price: round_to(s.total_price, 5),
                    })
                    .collect(),
                min_price: price(stats.min),
                max_price: price(stats.max),
                avg_price: price(stats.avg),
                median_price: price(stats.median),
                cheapest_hour: stats.cheapest_hour_start.map(local).into(),
                cheapest_block_start: stats.cheapest_block.map(|b| local(b.start)).into(),
                cheapest_block_end: stats.cheapest_block.map(|b| local(b.end)).into(),
                cheapest_block_active: prices.block_active(label, now),
                most_expensive_hour: stats.most_expensive_hour_start.map(local).into(),
                consumption_kwh: records
                    .and_then(daily_kwh)
                    .map(|v| round_to(v, 3))
                    .into(),
                cost: records
                    .and_then(|r| daily_cost(r, window, &logger.with_field("day", label.as_str())))
                    .map(|v| round_to(v, 2))
                    .into(),
            }
        });

        let timeline = DayLabel::ALL
            .into_iter()
            .flat_map(|label| prices.windows.get(label).slots().iter())
            .map(|s| TimelinePoint {
                start_time: local(s.start),
                price_per_kwh: round_to(s.total_price, 5),
            })
            .collect();

        Self {
            generated_at: local(now),
            prices_fetched_at: prices.fetched_at.map(local).into(),
            consumption_fetched_at: consumption.and_then(|c| c.fetched_at).map(local).into(),
            current_price: price(prices.current_price(now)),
            today_block_active: prices.block_active(DayLabel::Today, now),
            tomorrow_block_active: prices.block_active(DayLabel::Tomorrow, now),
            days,
            timeline,
        }
    }

    pub fn day(&self, label: DayLabel) -> &DaySummary {
        self.days.get(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prices::{ConsumptionRecord, PriceSlot, PriceWindow};
    use chrono::{Duration, TimeZone};
    use chrono_tz::Europe::Berlin;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 10, 30, 0).unwrap()
    }

    fn state_with_today(cents: &[f64]) -> PriceState {
        let bounds = DayBounds::for_instant(now(), Berlin);
        let today = PriceWindow::new(
            cents
                .iter()
                .zip(0..)
                .map(|(c, h)| PriceSlot::from_cents(bounds.today + Duration::hours(h), 0.0, *c, 0.0))
                .collect(),
        );
        let windows = PerDay {
            yesterday: PriceWindow::empty(),
            today,
            tomorrow: PriceWindow::empty(),
        };
        PriceState::from_windows(now(), bounds, windows, 3)
    }

    #[test]
    fn test_unavailable_serialization() {
        let snapshot = PublishedSnapshot::build(&PriceState::default(), None, Berlin, now());
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["current_price"], "unavailable");
        assert_eq!(json["days"]["tomorrow"]["min_price"], "unavailable");
        assert_eq!(json["days"]["today"]["cost"], "unavailable");
        assert!(!snapshot.today_block_active);
        assert!(snapshot.timeline.is_empty());
    }

    #[test]
    fn test_current_price_and_rounding() {
        let cents: Vec<f64> = (0..24).map(|h| 10.0 + f64::from(h) + 0.123_456).collect();
        let state = state_with_today(&cents);
        let snapshot = PublishedSnapshot::build(&state, None, Berlin, now());
        // 10:30 UTC is 12:30 local, hour index 12
        assert_eq!(snapshot.current_price, Reading::Available(0.22123));
        assert_eq!(snapshot.timeline.len(), 24);
        assert_eq!(snapshot.timeline[0].start_time.to_rfc3339(), "2024-06-15T00:00:00+02:00");
        // cheapest block is the first three hours, not active at 12:30
        assert!(!snapshot.today_block_active);
        assert!(!snapshot.day(DayLabel::Today).cheapest_block_active);
    }

    #[test]
    fn test_cost_and_kwh_rounded() {
        let state = state_with_today(&[30.0; 24]);
        let bounds = state.bounds.unwrap();
        let consumption = ConsumptionState {
            fetched_at: Some(now()),
            bounds: Some(bounds),
            records: PerDay {
                yesterday: Vec::new(),
                today: vec![
                    ConsumptionRecord { hour_start: bounds.today, kwh: 1.23456 },
                    ConsumptionRecord { hour_start: bounds.today + Duration::hours(1), kwh: 0.1 },
                ],
                tomorrow: Vec::new(),
            },
        };
        let snapshot = PublishedSnapshot::build(&state, Some(&consumption), Berlin, now());
        let today = snapshot.day(DayLabel::Today);
        assert_eq!(today.consumption_kwh, Reading::Available(1.335));
        assert_eq!(today.cost, Reading::Available(0.4));
        assert_eq!(snapshot.day(DayLabel::Yesterday).cost, Reading::Unavailable);
    }
}
