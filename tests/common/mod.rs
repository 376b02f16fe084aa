#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use stromspot::api::{ConsumptionEntry, DateRange, SpotPriceRecord, TariffTransport, TokenGrant};
use stromspot::error::{Result, StromspotError};

/// In-memory upstream serving whatever records fall into the requested range
#[derive(Default)]
pub struct StubTransport {
    pub token_calls: AtomicUsize,
    pub price_calls: AtomicUsize,
    pub consumption_calls: AtomicUsize,
    pub token_delay_ms: u64,
    pub fail_tokens: AtomicBool,
    pub fail_prices: AtomicBool,
    pub consumption_not_found: AtomicBool,
    pub prices: Mutex<Vec<SpotPriceRecord>>,
    pub consumption: Mutex<Vec<ConsumptionEntry>>,
}

impl StubTransport {
    pub fn with_token_delay(ms: u64) -> Self {
        Self {
            token_delay_ms: ms,
            ..Default::default()
        }
    }

    pub fn push_prices(&self, records: Vec<SpotPriceRecord>) {
        self.prices.lock().unwrap().extend(records);
    }

    pub fn push_consumption(&self, entries: Vec<ConsumptionEntry>) {
        self.consumption.lock().unwrap().extend(entries);
    }
}

fn in_range(date: &str, range: &DateRange) -> bool {
    DateTime::parse_from_rfc3339(date)
        .map(|t| {
            let t = t.with_timezone(&Utc);
            range.start <= t && t < range.end
        })
        .unwrap_or(true)
}

#[async_trait::async_trait]
impl TariffTransport for StubTransport {
    async fn request_token(&self) -> Result<TokenGrant> {
        let n = self.token_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.token_delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.token_delay_ms)).await;
        }
        if self.fail_tokens.load(Ordering::SeqCst) {
            return Err(StromspotError::rate_limit("too many token requests"));
        }
        Ok(TokenGrant {
            access_token: format!("token-{n}"),
            expires_in: 3600,
            token_type: Some("Bearer".to_string()),
        })
    }

    async fn spot_prices(
        &self,
        _bearer: &str,
        _zip_code: &str,
        range: &DateRange,
    ) -> Result<Vec<SpotPriceRecord>> {
        self.price_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_prices.load(Ordering::SeqCst) {
            return Err(StromspotError::api(Some(503), "service unavailable"));
        }
        Ok(self
            .prices
            .lock()
            .unwrap()
            .iter()
            .filter(|r| in_range(&r.date, range))
            .cloned()
            .collect())
    }

    async fn energy_consumption(
        &self,
        _bearer: &str,
        _contract_id: &str,
        range: &DateRange,
    ) -> Result<Vec<ConsumptionEntry>> {
        self.consumption_calls.fetch_add(1, Ordering::SeqCst);
        if self.consumption_not_found.load(Ordering::SeqCst) {
            return Err(StromspotError::api(Some(404), "no data"));
        }
        Ok(self
            .consumption
            .lock()
            .unwrap()
            .iter()
            .filter(|e| in_range(&e.date, range))
            .cloned()
            .collect())
    }
}

pub fn api_date(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%S.000Z").to_string()
}

/// `count` hourly records from `start`, gross spot price given in cents
pub fn hourly_prices(
    start: DateTime<Utc>,
    count: i64,
    cents: impl Fn(i64) -> f64,
) -> Vec<SpotPriceRecord> {
    (0..count)
        .map(|h| SpotPriceRecord {
            date: api_date(start + Duration::hours(h)),
            net_kwh_price: Some(cents(h) * 0.84),
            gross_kwh_price: Some(cents(h)),
            net_kwh_tax_and_levies: Some(0.0),
            gross_kwh_tax_and_levies: Some(0.0),
        })
        .collect()
}

pub fn hourly_consumption(start: DateTime<Utc>, kwh: &[f64]) -> Vec<ConsumptionEntry> {
    kwh.iter()
        .zip(0..)
        .map(|(k, h)| ConsumptionEntry {
            date: api_date(start + Duration::hours(h)),
            kwh: Some(*k),
        })
        .collect()
}
