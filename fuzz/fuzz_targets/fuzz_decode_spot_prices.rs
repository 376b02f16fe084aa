#![no_main]
use chrono::{TimeZone, Utc};
use libfuzzer_sys::fuzz_target;
use stromspot::logging::get_logger;
use stromspot::prices::normalize::decode_spot_prices;
use stromspot::prices::{DayLabel, DerivedStatistics};

fuzz_target!(|data: &[u8]| {
    let logger = get_logger("fuzz");
    let Some(now) = Utc.with_ymd_and_hms(2024, 10, 27, 9, 0, 0).single() else {
        return;
    };

    // Arbitrary bodies must decode to an error or to well-formed windows
    if let Ok(days) = decode_spot_prices(data, now, chrono_tz::Europe::Berlin, &logger) {
        for label in DayLabel::ALL {
            let window = days.get(label);
            assert!(window.slots().windows(2).all(|w| w[0].start < w[1].start));
            let stats = DerivedStatistics::compute(window, 3);
            if let (Some(min), Some(max)) = (stats.min, stats.max) {
                assert!(min <= max);
            }
        }
    }
});
