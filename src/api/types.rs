use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Response of the OAuth2 token endpoint
#[derive(Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
}

const fn default_expires_in() -> i64 {
    3600
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// `{ "data": [...] }` envelope used by the data endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: Option<Vec<T>>,
}

/// One hourly spot price entry; all prices in cents per kWh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotPriceRecord {
    /// Slot start, UTC ISO-8601
    pub date: String,
    #[serde(default)]
    pub net_kwh_price: Option<f64>,
    #[serde(default)]
    pub gross_kwh_price: Option<f64>,
    #[serde(default)]
    pub net_kwh_tax_and_levies: Option<f64>,
    #[serde(default)]
    pub gross_kwh_tax_and_levies: Option<f64>,
}

/// One hourly smart-meter reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionEntry {
    /// Hour start, UTC ISO-8601
    pub date: String,
    #[serde(rename = "kWh", default)]
    pub kwh: Option<f64>,
}

/// Every data request asks for hourly values
pub const RESOLUTION_HOUR: &str = "HOUR";

/// Half-open UTC range `[start, end)` of a data request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub const fn hourly(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Query parameters shared by both data endpoints
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("startDate", format_api_date(self.start)),
            ("endDate", format_api_date(self.end)),
            ("resolution", RESOLUTION_HOUR.to_string()),
        ]
    }
}

/// Format an instant the way the API expects, e.g. `2023-11-01T00:00:00.000Z`
pub fn format_api_date(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%S.000Z").to_string()
}

/// Parse an upstream slot timestamp into UTC
pub fn parse_api_date(raw: &str) -> crate::error::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw.trim())?.with_timezone(&Utc))
}
