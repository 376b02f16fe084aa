//! Daylight-saving-safe day boundaries
//!
//! Day windows are split on local midnights resolved through the timezone
//! database instead of "now minus 24 hours", so a 23- or 25-hour local day
//! keeps every slot on the right side of the boundary.

use chrono::{DateTime, Days, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use super::model::DayLabel;

/// Resolve a local wall-clock time to an instant
///
/// Ambiguous times (fall-back hour) resolve to the earlier instant; times
/// inside a spring-forward gap resolve to `None`.
pub fn resolve_local(tz: Tz, naive: chrono::NaiveDateTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(t) => Some(t.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}

/// First instant of the local calendar day
pub fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    if let Some(t) = resolve_local(tz, midnight) {
        return t;
    }
    // A few zones shift at 00:00, skipping midnight itself; the day then
    // starts at the first wall-clock minute that exists.
    (1..=180)
        .filter_map(|m| resolve_local(tz, midnight + chrono::Duration::minutes(m)))
        .next()
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

/// Local midnights around a reference instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayBounds {
    pub yesterday: DateTime<Utc>,
    pub today: DateTime<Utc>,
    pub tomorrow: DateTime<Utc>,
    pub day_after: DateTime<Utc>,
}

impl DayBounds {
    /// Bounds of yesterday, today and tomorrow as seen from `now` in `tz`
    pub fn for_instant(now: DateTime<Utc>, tz: Tz) -> Self {
        let today = now.with_timezone(&tz).date_naive();
        let shift = |d: NaiveDate, back: bool| {
            if back {
                d.checked_sub_days(Days::new(1)).unwrap_or(d)
            } else {
                d.checked_add_days(Days::new(1)).unwrap_or(d)
            }
        };
        let yesterday = shift(today, true);
        let tomorrow = shift(today, false);
        let day_after = shift(tomorrow, false);
        Self {
            yesterday: local_midnight(yesterday, tz),
            today: local_midnight(today, tz),
            tomorrow: local_midnight(tomorrow, tz),
            day_after: local_midnight(day_after, tz),
        }
    }

    /// Half-open range `[start, end)` of a day
    pub const fn range(&self, label: DayLabel) -> (DateTime<Utc>, DateTime<Utc>) {
        match label {
            DayLabel::Yesterday => (self.yesterday, self.today),
            DayLabel::Today => (self.today, self.tomorrow),
            DayLabel::Tomorrow => (self.tomorrow, self.day_after),
        }
    }

    /// Which day an instant falls into, if any of the three
    pub fn label_of(&self, t: DateTime<Utc>) -> Option<DayLabel> {
        DayLabel::ALL.into_iter().find(|&label| {
            let (start, end) = self.range(label);
            start <= t && t < end
        })
    }

    /// Number of whole hours in the local day (23, 24 or 25)
    pub fn hours_in(&self, label: DayLabel) -> i64 {
        let (start, end) = self.range(label);
        (end - start).num_hours()
    }
}
