mod common;

use chrono::{Duration, TimeZone, Utc};
use chrono_tz::Europe::Berlin;
use common::{StubTransport, hourly_consumption, hourly_prices};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use stromspot::config::Config;
use stromspot::prices::{DayBounds, DayLabel};
use stromspot::snapshot::Reading;
use stromspot::{StromspotError, TariffService};

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 10, 30, 0).unwrap()
}

fn config(contract: Option<&str>) -> Config {
    let mut config = Config::default();
    config.credentials.client_id = "client".to_string();
    config.credentials.client_secret = "secret".to_string();
    config.zip_code = "10115".to_string();
    config.contract_id = contract.map(str::to_string);
    config
}

fn stub_with_prices() -> Arc<StubTransport> {
    let bounds = DayBounds::for_instant(now(), Berlin);
    let stub = Arc::new(StubTransport::default());
    // 20 ct every hour, 10 ct from 02:00 to 05:00 local each day
    stub.push_prices(hourly_prices(bounds.yesterday, 72, |h| {
        if (2..5).contains(&(h % 24)) { 10.0 } else { 20.0 }
    }));
    stub
}

#[tokio::test]
async fn prime_fills_snapshot_with_cost() {
    let stub = stub_with_prices();
    let bounds = DayBounds::for_instant(now(), Berlin);
    stub.push_consumption(hourly_consumption(bounds.yesterday, &[1.0, 1.0, 2.0, 2.0]));
    stub.push_consumption(hourly_consumption(bounds.today, &[0.5; 10]));

    let service = TariffService::with_transport(config(Some("c-1")), stub.clone()).unwrap();
    service.prime(now()).await;
    let snapshot = service.snapshot(now());

    let yesterday = snapshot.day(DayLabel::Yesterday);
    assert_eq!(yesterday.consumption_kwh, Reading::Available(6.0));
    // 1*0.2 + 1*0.2 + 2*0.1 + 2*0.1
    assert_eq!(yesterday.cost, Reading::Available(0.8));

    let today = snapshot.day(DayLabel::Today);
    assert_eq!(today.consumption_kwh, Reading::Available(5.0));
    // three readings at 0.10, seven at 0.20
    assert_eq!(today.cost, Reading::Available(0.85));
    assert_eq!(snapshot.day(DayLabel::Tomorrow).cost, Reading::Unavailable);

    assert_eq!(snapshot.current_price, Reading::Available(0.2));
    assert!(!snapshot.today_block_active);
    assert_eq!(snapshot.timeline.len(), 72);
    assert_eq!(
        today.cheapest_block_start,
        Reading::Available((bounds.today + Duration::hours(2)).with_timezone(&Berlin).fixed_offset())
    );
    // one token serves both fetches
    assert_eq!(stub.token_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn block_flag_active_inside_cheapest_block() {
    let stub = stub_with_prices();
    let bounds = DayBounds::for_instant(now(), Berlin);
    let service = TariffService::with_transport(config(None), stub).unwrap();
    service.prime(now()).await;

    let inside = bounds.today + Duration::minutes(150);
    assert!(service.snapshot(inside).today_block_active);
    assert!(!service.snapshot(bounds.today + Duration::hours(5)).today_block_active);
}

#[tokio::test]
async fn no_contract_disables_consumption() {
    let stub = stub_with_prices();
    let service = TariffService::with_transport(config(None), stub.clone()).unwrap();
    assert!(service.consumption().is_none());
    service.prime(now()).await;

    let json = serde_json::to_value(service.snapshot(now())).unwrap();
    assert_eq!(json["days"]["today"]["consumption_kwh"], "unavailable");
    assert_eq!(json["days"]["today"]["cost"], "unavailable");
    assert_eq!(stub.consumption_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn consumption_not_found_means_no_readings() {
    let stub = stub_with_prices();
    stub.consumption_not_found.store(true, Ordering::SeqCst);
    let service = TariffService::with_transport(config(Some("c-1")), stub).unwrap();
    service.prime(now()).await;

    let consumption = service.consumption().unwrap().current();
    assert!(consumption.fetched_at.is_some());
    assert!(consumption.records.today.is_empty());
    let snapshot = service.snapshot(now());
    assert_eq!(snapshot.day(DayLabel::Today).cost, Reading::Unavailable);
}

#[tokio::test]
async fn failed_prime_is_not_fatal() {
    let stub = stub_with_prices();
    stub.fail_prices.store(true, Ordering::SeqCst);
    let service = TariffService::with_transport(config(None), stub).unwrap();
    service.prime(now()).await;

    let snapshot = service.snapshot(now());
    assert_eq!(snapshot.current_price, Reading::Unavailable);
    assert_eq!(snapshot.prices_fetched_at, Reading::Unavailable);
}

#[tokio::test]
async fn invalid_config_is_rejected_at_setup() {
    let mut cfg = config(None);
    cfg.block_hours = 5;
    let err = TariffService::with_transport(cfg, Arc::new(StubTransport::default()))
        .err()
        .unwrap();
    assert!(matches!(err, StromspotError::Validation { .. }));
}

#[tokio::test(start_paused = true)]
async fn reconfigure_restarts_running_loops() {
    let stub = stub_with_prices();
    let mut service = TariffService::with_transport(config(None), stub).unwrap();
    service.start();
    assert!(service.is_running());

    let mut cfg = config(Some("c-2"));
    cfg.schedule.price_interval_minutes = 30;
    service.reconfigure(cfg).await.unwrap();
    assert!(service.is_running());
    assert!(service.consumption().is_some());
    assert_eq!(service.config().schedule.price_interval_minutes, 30);

    service.shutdown().await;
    assert!(!service.is_running());
}

#[tokio::test]
async fn day_labels_follow_local_midnight_across_caches() {
    // 23:30 on Jun 14 and 00:05 on Jun 15, Berlin time
    let before = Utc.with_ymd_and_hms(2024, 6, 14, 21, 30, 0).unwrap();
    let after = Utc.with_ymd_and_hms(2024, 6, 14, 22, 5, 0).unwrap();
    let old = DayBounds::for_instant(before, Berlin);
    let new = DayBounds::for_instant(after, Berlin);
    assert_eq!(new.yesterday, old.today);

    let stub = Arc::new(StubTransport::default());
    stub.push_prices(hourly_prices(old.yesterday, 96, |_| 20.0));
    stub.push_consumption(hourly_consumption(old.yesterday, &[0.5; 24]));
    stub.push_consumption(hourly_consumption(old.today, &[1.0; 24]));

    let service = TariffService::with_transport(config(Some("c-1")), stub).unwrap();
    service.prime(before).await;
    let evening = service.snapshot(before);
    assert_eq!(evening.day(DayLabel::Today).consumption_kwh, Reading::Available(24.0));
    assert_eq!(evening.day(DayLabel::Today).cost, Reading::Available(4.8));

    // both caches still hold the previous day's labels
    let stale = service.snapshot(after);
    let yesterday = stale.day(DayLabel::Yesterday);
    assert_eq!(yesterday.consumption_kwh, Reading::Available(24.0));
    assert_eq!(yesterday.cost, Reading::Available(4.8));
    let today = stale.day(DayLabel::Today);
    assert_eq!(today.consumption_kwh, Reading::Unavailable);
    assert_eq!(today.slots.len(), 24);
    assert_eq!(today.min_price, Reading::Available(0.2));
    assert!(stale.day(DayLabel::Tomorrow).slots.is_empty());
    assert_eq!(stale.current_price, Reading::Available(0.2));

    // only the price cache moves past midnight
    service.prices().refresh_prices(after).await.unwrap();
    let fresh = service.snapshot(after);
    let yesterday = fresh.day(DayLabel::Yesterday);
    assert_eq!(yesterday.consumption_kwh, Reading::Available(24.0));
    assert_eq!(yesterday.cost, Reading::Available(4.8));
    assert_eq!(fresh.day(DayLabel::Today).consumption_kwh, Reading::Unavailable);
    assert_eq!(fresh.day(DayLabel::Today).cost, Reading::Unavailable);
    assert_eq!(fresh.day(DayLabel::Tomorrow).slots.len(), 24);
    assert_eq!(fresh.timeline.len(), 72);
}
