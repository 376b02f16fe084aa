use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Calendar day a price window or consumption series belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayLabel {
    Yesterday,
    Today,
    Tomorrow,
}

impl DayLabel {
    pub const ALL: [Self; 3] = [Self::Yesterday, Self::Today, Self::Tomorrow];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Yesterday => "yesterday",
            Self::Today => "today",
            Self::Tomorrow => "tomorrow",
        }
    }
}

impl std::fmt::Display for DayLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value per day label
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerDay<T> {
    pub yesterday: T,
    pub today: T,
    pub tomorrow: T,
}

impl<T> PerDay<T> {
    pub const fn get(&self, label: DayLabel) -> &T {
        match label {
            DayLabel::Yesterday => &self.yesterday,
            DayLabel::Today => &self.today,
            DayLabel::Tomorrow => &self.tomorrow,
        }
    }

    pub fn get_mut(&mut self, label: DayLabel) -> &mut T {
        match label {
            DayLabel::Yesterday => &mut self.yesterday,
            DayLabel::Today => &mut self.today,
            DayLabel::Tomorrow => &mut self.tomorrow,
        }
    }

    /// Build each day's value from its label
    pub fn from_fn(mut f: impl FnMut(DayLabel) -> T) -> Self {
        Self {
            yesterday: f(DayLabel::Yesterday),
            today: f(DayLabel::Today),
            tomorrow: f(DayLabel::Tomorrow),
        }
    }

    pub fn map<U>(&self, mut f: impl FnMut(DayLabel, &T) -> U) -> PerDay<U> {
        PerDay {
            yesterday: f(DayLabel::Yesterday, &self.yesterday),
            today: f(DayLabel::Today, &self.today),
            tomorrow: f(DayLabel::Tomorrow, &self.tomorrow),
        }
    }
}

/// One hour of priced electricity; prices in currency per kWh, VAT included
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub net_price: f64,
    pub taxes_price: f64,
    pub total_price: f64,
}

impl PriceSlot {
    /// Build an hourly slot from the upstream cent values
    pub fn from_cents(
        start: DateTime<Utc>,
        net_kwh_cents: f64,
        gross_kwh_cents: f64,
        gross_taxes_cents: f64,
    ) -> Self {
        Self {
            start,
            end: start + Duration::hours(1),
            net_price: net_kwh_cents / 100.0,
            taxes_price: gross_taxes_cents / 100.0,
            total_price: (gross_kwh_cents + gross_taxes_cents) / 100.0,
        }
    }

    /// Half-open containment: `start <= t < end`
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }
}

/// Ordered hourly slots of one calendar day
///
/// Always sorted ascending by start with unique starts; an empty window means
/// the day's prices are not known (yet).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PriceWindow {
    slots: Vec<PriceSlot>,
}

impl PriceWindow {
    /// Build a window, sorting by start; the last slot wins on duplicate starts
    pub fn new(mut slots: Vec<PriceSlot>) -> Self {
        slots.reverse();
        slots.sort_by_key(|s| s.start);
        slots.dedup_by_key(|s| s.start);
        Self { slots }
    }

    pub const fn empty() -> Self {
        Self { slots: Vec::new() }
    }

    pub fn slots(&self) -> &[PriceSlot] {
        &self.slots
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn totals(&self) -> impl Iterator<Item = f64> + '_ {
        self.slots.iter().map(|s| s.total_price)
    }

    /// Slot covering the instant, if any
    pub fn slot_at(&self, t: DateTime<Utc>) -> Option<&PriceSlot> {
        self.slots.iter().find(|s| s.contains(t))
    }

    /// Slot starting exactly at the given hour
    pub fn slot_starting_at(&self, start: DateTime<Utc>) -> Option<&PriceSlot> {
        self.slots
            .binary_search_by_key(&start, |s| s.start)
            .ok()
            .and_then(|idx| self.slots.get(idx))
    }

    /// Whether consecutive slots touch without gaps
    pub fn is_contiguous(&self) -> bool {
        self.slots.windows(2).all(|w| w[0].end == w[1].start)
    }
}

/// Hourly smart-meter reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConsumptionRecord {
    pub hour_start: DateTime<Utc>,
    pub kwh: f64,
}
