//! Turning upstream records into day windows

use chrono::{DateTime, Utc};

use crate::api::types::{ConsumptionEntry, SpotPriceRecord, parse_api_date};
use crate::api::transport::{ENDPOINT_SPOT_PRICES, decode_data};
use crate::error::Result;
use crate::logging::StructuredLogger;

use super::days::DayBounds;
use super::model::{ConsumptionRecord, DayLabel, PerDay, PriceSlot, PriceWindow};

/// Convert one record; `None` when it cannot be priced
pub fn slot_from_record(record: &SpotPriceRecord) -> Option<PriceSlot> {
    let start = parse_api_date(&record.date).ok()?;
    let gross = record.gross_kwh_price.filter(|v| v.is_finite())?;
    let taxes = record.gross_kwh_tax_and_levies.unwrap_or(0.0);
    let net = record.net_kwh_price.unwrap_or(0.0);
    if !taxes.is_finite() || !net.is_finite() {
        return None;
    }
    Some(PriceSlot::from_cents(start, net, gross, taxes))
}

/// Convert records into slots, skipping the unusable ones
pub fn slots_from_records(records: &[SpotPriceRecord], logger: &StructuredLogger) -> Vec<PriceSlot> {
    records
        .iter()
        .filter_map(|record| {
            let slot = slot_from_record(record);
            if slot.is_none() {
                logger.warn(&format!("Skipping unusable price record for {}", record.date));
            }
            slot
        })
        .collect()
}

/// Distribute slots over yesterday, today and tomorrow
///
/// Slots outside the three days are dropped. Each resulting window is sorted
/// and free of duplicate starts.
pub fn split_into_days(slots: Vec<PriceSlot>, bounds: &DayBounds) -> PerDay<PriceWindow> {
    let mut buckets: PerDay<Vec<PriceSlot>> = PerDay::default();
    for slot in slots {
        if let Some(label) = bounds.label_of(slot.start) {
            buckets.get_mut(label).push(slot);
        }
    }
    PerDay {
        yesterday: PriceWindow::new(buckets.yesterday),
        today: PriceWindow::new(buckets.today),
        tomorrow: PriceWindow::new(buckets.tomorrow),
    }
}

/// Convert readings, skipping unparseable or non-finite ones
pub fn consumption_from_entries(
    entries: &[ConsumptionEntry],
    logger: &StructuredLogger,
) -> Vec<ConsumptionRecord> {
    let mut records: Vec<ConsumptionRecord> = entries
        .iter()
        .filter_map(|entry| {
            let parsed = parse_api_date(&entry.date)
                .ok()
                .zip(entry.kwh.filter(|v| v.is_finite()));
            if parsed.is_none() {
                logger.warn(&format!("Skipping unusable consumption entry for {}", entry.date));
            }
            parsed.map(|(hour_start, kwh)| ConsumptionRecord { hour_start, kwh })
        })
        .collect();
    records.sort_by_key(|r| r.hour_start);
    records
}

/// Split readings into the days they belong to; tomorrow is always empty
pub fn split_consumption(
    records: Vec<ConsumptionRecord>,
    bounds: &DayBounds,
) -> PerDay<Vec<ConsumptionRecord>> {
    let mut days: PerDay<Vec<ConsumptionRecord>> = PerDay::default();
    for record in records {
        if let Some(label @ (DayLabel::Yesterday | DayLabel::Today)) =
            bounds.label_of(record.hour_start)
        {
            days.get_mut(label).push(record);
        }
    }
    days
}

/// Decode a raw spot-price body and split it around `now`
pub fn decode_spot_prices(
    body: &[u8],
    now: DateTime<Utc>,
    tz: chrono_tz::Tz,
    logger: &StructuredLogger,
) -> Result<PerDay<PriceWindow>> {
    let records: Vec<SpotPriceRecord> = decode_data(ENDPOINT_SPOT_PRICES, body)?;
    let bounds = DayBounds::for_instant(now, tz);
    Ok(split_into_days(slots_from_records(&records, logger), &bounds))
}
