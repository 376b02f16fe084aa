//! Consumption readings joined with prices
//!
//! Readings for yesterday and today are fetched on their own schedule and
//! costed against whatever price window is published at that moment.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tokio::sync::watch;

use crate::api::{DateRange, TariffClient};
use crate::error::Result;
use crate::logging::{StructuredLogger, get_logger};
use crate::prices::normalize::{consumption_from_entries, split_consumption};
use crate::prices::{ConsumptionRecord, DayBounds, DayLabel, PerDay, PriceWindow};

/// Last successfully fetched readings
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConsumptionState {
    pub fetched_at: Option<DateTime<Utc>>,
    pub bounds: Option<DayBounds>,
    pub records: PerDay<Vec<ConsumptionRecord>>,
}

impl ConsumptionState {
    /// Same readings relabeled against `bounds`
    pub fn realigned(&self, bounds: DayBounds) -> Self {
        if self.bounds == Some(bounds) {
            return self.clone();
        }
        let records = DayLabel::ALL
            .into_iter()
            .flat_map(|label| self.records.get(label).iter().copied())
            .collect();
        Self {
            fetched_at: self.fetched_at,
            bounds: Some(bounds),
            records: split_consumption(records, &bounds),
        }
    }
}

/// Total kWh of a day; absent without readings
pub fn daily_kwh(records: &[ConsumptionRecord]) -> Option<f64> {
    if records.is_empty() {
        return None;
    }
    Some(records.iter().map(|r| r.kwh).sum())
}

/// Cost of a day's readings at the window's prices
///
/// Readings are matched to slots by exact hour start. Readings without a slot
/// are left out and logged. Absent when nothing could be matched.
pub fn daily_cost(
    records: &[ConsumptionRecord],
    window: &PriceWindow,
    logger: &StructuredLogger,
) -> Option<f64> {
    let mut matched = 0usize;
    let mut total = 0.0;
    for record in records {
        match window.slot_starting_at(record.hour_start) {
            Some(slot) => {
                total += record.kwh * slot.total_price;
                matched += 1;
            }
            None => logger.warn(&format!(
                "No price slot for consumption at {}",
                record.hour_start.to_rfc3339()
            )),
        }
    }
    (matched > 0).then_some(total)
}

/// Fetches hourly consumption for the configured contract
pub struct ConsumptionAggregator {
    client: Arc<TariffClient>,
    tz: Tz,
    state_tx: watch::Sender<Arc<ConsumptionState>>,
    logger: StructuredLogger,
}

impl ConsumptionAggregator {
    pub fn new(client: Arc<TariffClient>, tz: Tz) -> Self {
        let (state_tx, _) = watch::channel(Arc::new(ConsumptionState::default()));
        Self {
            client,
            tz,
            state_tx,
            logger: get_logger("consumption"),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ConsumptionState>> {
        self.state_tx.subscribe()
    }

    pub fn current(&self) -> Arc<ConsumptionState> {
        Arc::clone(&self.state_tx.borrow())
    }

    /// Fetch readings from yesterday 00:00 to tomorrow 00:00 and publish them
    pub async fn refresh_consumption(&self, now: DateTime<Utc>) -> Result<Arc<ConsumptionState>> {
        let bounds = DayBounds::for_instant(now, self.tz);
        let range = DateRange::hourly(bounds.yesterday, bounds.tomorrow);
        let logger = self
            .logger
            .with_field("endpoint", "energy-consumption")
            .with_field("contract", self.client.contract_id().unwrap_or("-"));

        let entries = match self.client.energy_consumption(&range).await {
            Ok(entries) => entries,
            Err(e) => {
                logger.error(&format!("Consumption fetch failed: {e}"));
                return Err(e);
            }
        };

        let records = split_consumption(consumption_from_entries(&entries, &logger), &bounds);
        let state = Arc::new(ConsumptionState {
            fetched_at: Some(now),
            bounds: Some(bounds),
            records,
        });
        self.state_tx.send_replace(Arc::clone(&state));
        logger.info(&format!(
            "Consumption updated: yesterday={} today={} readings",
            state.records.yesterday.len(),
            state.records.today.len()
        ));
        Ok(state)
    }
}
