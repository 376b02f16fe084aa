use anyhow::{Context, Result};
use chrono::Utc;
use stromspot::logging::{get_logger, init_logging};
use stromspot::prices::DayLabel;
use stromspot::snapshot::Reading;
use stromspot::{Config, TariffService};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    init_logging(&config.logging).context("Failed to initialize logging")?;

    let logger = get_logger("main");
    logger.info(&format!("Stromspot {} starting up", env!("APP_VERSION")));

    let mut service = TariffService::new(config).context("Failed to create service")?;
    service.prime(Utc::now()).await;
    service.start();

    let mut prices_rx = service.subscribe_prices();
    loop {
        tokio::select! {
            changed = prices_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = service.snapshot(Utc::now());
                let fmt = |r: Reading<f64>| match r {
                    Reading::Available(v) => format!("{v:.5}"),
                    Reading::Unavailable => "unavailable".to_string(),
                };
                let today = snapshot.day(DayLabel::Today);
                logger.info(&format!(
                    "current={} today min={} max={} avg={} block_active={} tomorrow_slots={}",
                    fmt(snapshot.current_price),
                    fmt(today.min_price),
                    fmt(today.max_price),
                    fmt(today.avg_price),
                    snapshot.today_block_active,
                    snapshot.day(DayLabel::Tomorrow).slots.len(),
                ));
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    logger.error(&format!("Failed to listen for shutdown signal: {e}"));
                }
                logger.info("Shutdown signal received");
                break;
            }
        }
    }

    service.shutdown().await;
    Ok(())
}
