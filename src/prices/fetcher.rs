use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tokio::sync::watch;

use crate::api::{DateRange, TariffClient};
use crate::error::Result;
use crate::logging::{StructuredLogger, get_logger};

use super::days::DayBounds;
use super::model::{DayLabel, PerDay, PriceSlot, PriceWindow};
use super::normalize::{slots_from_records, split_into_days};
use super::stats::DerivedStatistics;

/// Last successfully fetched price window with its statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PriceState {
    pub fetched_at: Option<DateTime<Utc>>,
    pub bounds: Option<DayBounds>,
    pub windows: PerDay<PriceWindow>,
    pub statistics: PerDay<DerivedStatistics>,
    pub block_hours: usize,
}

impl PriceState {
    /// Build a state from split windows, computing every statistic up front
    pub fn from_windows(
        fetched_at: DateTime<Utc>,
        bounds: DayBounds,
        windows: PerDay<PriceWindow>,
        block_hours: usize,
    ) -> Self {
        let statistics = windows.map(|_, w| DerivedStatistics::compute(w, block_hours));
        Self {
            fetched_at: Some(fetched_at),
            bounds: Some(bounds),
            windows,
            statistics,
            block_hours,
        }
    }

    /// Same slots relabeled against `bounds`
    ///
    /// A state fetched before a local midnight still carries the old day
    /// labels afterwards. Relabeling moves every cached slot to the day it
    /// belongs to now and recomputes the statistics; slots before the new
    /// yesterday are dropped.
    pub fn realigned(&self, bounds: DayBounds) -> Self {
        if self.bounds == Some(bounds) {
            return self.clone();
        }
        let slots = DayLabel::ALL
            .into_iter()
            .flat_map(|label| self.windows.get(label).slots().iter().copied())
            .collect();
        let windows = split_into_days(slots, &bounds);
        Self {
            fetched_at: self.fetched_at,
            bounds: Some(bounds),
            statistics: windows.map(|_, w| DerivedStatistics::compute(w, self.block_hours)),
            windows,
            block_hours: self.block_hours,
        }
    }

    /// Slot covering `now` in any of the three windows
    pub fn slot_at(&self, now: DateTime<Utc>) -> Option<&PriceSlot> {
        DayLabel::ALL
            .into_iter()
            .find_map(|label| self.windows.get(label).slot_at(now))
    }

    pub fn current_price(&self, now: DateTime<Utc>) -> Option<f64> {
        self.slot_at(now).map(|s| s.total_price)
    }

    /// Whether the day's cheapest block covers `now`
    pub fn block_active(&self, label: DayLabel, now: DateTime<Utc>) -> bool {
        self.statistics
            .get(label)
            .cheapest_block
            .is_some_and(|b| b.is_active(now))
    }
}

/// Retrieves the 72-hour price window and publishes it
pub struct PriceFetcher {
    client: Arc<TariffClient>,
    tz: Tz,
    block_hours: usize,
    state_tx: watch::Sender<Arc<PriceState>>,
    logger: StructuredLogger,
}

impl PriceFetcher {
    pub fn new(client: Arc<TariffClient>, tz: Tz, block_hours: usize) -> Self {
        let (state_tx, _) = watch::channel(Arc::new(PriceState::default()));
        Self {
            client,
            tz,
            block_hours,
            state_tx,
            logger: get_logger("prices"),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<PriceState>> {
        self.state_tx.subscribe()
    }

    /// Most recently published state
    pub fn current(&self) -> Arc<PriceState> {
        Arc::clone(&self.state_tx.borrow())
    }

    pub const fn timezone(&self) -> Tz {
        self.tz
    }

    /// Fetch yesterday through tomorrow and publish the result
    ///
    /// The previous state stays published when any step fails.
    pub async fn refresh_prices(&self, now: DateTime<Utc>) -> Result<Arc<PriceState>> {
        let bounds = DayBounds::for_instant(now, self.tz);
        let range = DateRange::hourly(bounds.yesterday, bounds.day_after);
        let logger = self
            .logger
            .with_field("endpoint", "spot-prices")
            .with_field("zip", self.client.zip_code());

        let records = match self.client.spot_prices(&range).await {
            Ok(records) => records,
            Err(e) => {
                logger.error(&format!("Price fetch failed: {e}"));
                return Err(e);
            }
        };

        let windows = split_into_days(slots_from_records(&records, &logger), &bounds);
        for label in DayLabel::ALL {
            let window = windows.get(label);
            let expected = bounds.hours_in(label);
            if window.is_empty() {
                logger.debug(&format!("No prices for {label} yet"));
            } else if i64::try_from(window.len()).unwrap_or(i64::MAX) != expected {
                logger.warn(&format!(
                    "{label}: got {} slots, local day has {expected} hours",
                    window.len()
                ));
            }
        }

        let state = Arc::new(PriceState::from_windows(
            now,
            bounds,
            windows,
            self.block_hours,
        ));
        self.state_tx.send_replace(Arc::clone(&state));
        logger.info(&format!(
            "Prices updated: yesterday={} today={} tomorrow={} slots",
            state.windows.yesterday.len(),
            state.windows.today.len(),
            state.windows.tomorrow.len()
        ));
        Ok(state)
    }
}
