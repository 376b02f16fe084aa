//! Service wiring
//!
//! Builds the client, fetchers and scheduler from a [`Config`] and exposes the
//! lifecycle used by the binary: prime, start, reconfigure, shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::watch;

use crate::api::{TariffClient, TariffTransport};
use crate::config::Config;
use crate::consumption::ConsumptionAggregator;
use crate::error::Result;
use crate::logging::{StructuredLogger, get_logger};
use crate::prices::{PriceFetcher, PriceState};
use crate::scheduler::{CycleJob, CycleTiming, ScheduledJob, Scheduler};
use crate::snapshot::PublishedSnapshot;

/// Each cycle may spend this many request timeouts (token, data, one retry)
const CYCLE_TIMEOUT_FACTOR: u32 = 3;

struct PriceCycle(Arc<PriceFetcher>);

#[async_trait::async_trait]
impl CycleJob for PriceCycle {
    fn name(&self) -> &'static str {
        "prices"
    }

    async fn run_cycle(&self, now: DateTime<Utc>) -> Result<()> {
        self.0.refresh_prices(now).await.map(|_| ())
    }
}

struct ConsumptionCycle(Arc<ConsumptionAggregator>);

#[async_trait::async_trait]
impl CycleJob for ConsumptionCycle {
    fn name(&self) -> &'static str {
        "consumption"
    }

    async fn run_cycle(&self, now: DateTime<Utc>) -> Result<()> {
        self.0.refresh_consumption(now).await.map(|_| ())
    }
}

struct Components {
    tz: Tz,
    client: Arc<TariffClient>,
    prices: Arc<PriceFetcher>,
    consumption: Option<Arc<ConsumptionAggregator>>,
}

impl Components {
    fn build(config: &Config, transport: Option<&Arc<dyn TariffTransport>>) -> Result<Self> {
        let tz = config.tz()?;
        let client = Arc::new(match transport {
            Some(t) => TariffClient::new(
                Arc::clone(t),
                config.zip_code.clone(),
                config.contract_id().map(str::to_string),
            ),
            None => TariffClient::from_config(config)?,
        });
        let prices = Arc::new(PriceFetcher::new(Arc::clone(&client), tz, config.block_hours));
        let consumption = client
            .contract_id()
            .is_some()
            .then(|| Arc::new(ConsumptionAggregator::new(Arc::clone(&client), tz)));
        Ok(Self {
            tz,
            client,
            prices,
            consumption,
        })
    }
}

/// Running tariff statistics service
pub struct TariffService {
    config: Config,
    transport: Option<Arc<dyn TariffTransport>>,
    components: Components,
    scheduler: Scheduler,
    logger: StructuredLogger,
}

impl TariffService {
    /// Validate the configuration and build every component
    pub fn new(config: Config) -> Result<Self> {
        Self::build(config, None)
    }

    /// As [`Self::new`] but talking to the given transport
    pub fn with_transport(config: Config, transport: Arc<dyn TariffTransport>) -> Result<Self> {
        Self::build(config, Some(transport))
    }

    fn build(config: Config, transport: Option<Arc<dyn TariffTransport>>) -> Result<Self> {
        config.validate()?;
        let components = Components::build(&config, transport.as_ref())?;
        let scheduler = Scheduler::new(components.tz, cycle_timeout(&config));
        let logger = get_logger("service");
        if components.consumption.is_none() {
            logger.info("No contract id configured, consumption and cost outputs disabled");
        }
        Ok(Self {
            config,
            transport,
            components,
            scheduler,
            logger,
        })
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    pub const fn timezone(&self) -> Tz {
        self.components.tz
    }

    pub fn client(&self) -> &TariffClient {
        &self.components.client
    }

    pub fn prices(&self) -> &PriceFetcher {
        &self.components.prices
    }

    pub fn consumption(&self) -> Option<&ConsumptionAggregator> {
        self.components.consumption.as_deref()
    }

    pub fn subscribe_prices(&self) -> watch::Receiver<Arc<PriceState>> {
        self.components.prices.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Fill both caches once; failures are logged and left to the loops
    pub async fn prime(&self, now: DateTime<Utc>) {
        if let Err(e) = self.components.prices.refresh_prices(now).await {
            self.logger
                .warn(&format!("Initial price refresh failed, will retry on schedule: {e}"));
        }
        if let Some(consumption) = &self.components.consumption
            && let Err(e) = consumption.refresh_consumption(now).await
        {
            self.logger.warn(&format!(
                "Initial consumption refresh failed, will retry on schedule: {e}"
            ));
        }
    }

    /// Spawn the refresh loops
    pub fn start(&mut self) {
        if self.scheduler.is_running() {
            self.logger.warn("Refresh loops already running");
            return;
        }
        let jobs = self.jobs();
        self.scheduler.start(&jobs);
    }

    /// Apply a new configuration
    ///
    /// Components are rebuilt unless only the schedule changed; running loops
    /// are restarted with the new timings either way.
    pub async fn reconfigure(&mut self, config: Config) -> Result<()> {
        config.validate()?;
        let was_running = self.scheduler.is_running();
        if needs_rebuild(&self.config, &config) {
            let components = Components::build(&config, self.transport.as_ref())?;
            self.scheduler.shutdown().await;
            self.components = components;
            self.logger.info("Configuration changed, components rebuilt");
        }
        self.config = config;
        if was_running {
            let jobs = self.jobs();
            self.scheduler
                .restart(self.components.tz, cycle_timeout(&self.config), &jobs)
                .await;
        }
        Ok(())
    }

    /// Published view of the caches at `now`
    pub fn snapshot(&self, now: DateTime<Utc>) -> PublishedSnapshot {
        let prices = self.components.prices.current();
        let consumption = self.components.consumption.as_ref().map(|c| c.current());
        PublishedSnapshot::build(&prices, consumption.as_deref(), self.components.tz, now)
    }

    /// Verify credentials and reachability
    pub async fn test_connection(&self, now: DateTime<Utc>) -> Result<()> {
        self.components.client.test_connection(now).await
    }

    /// Stop every loop
    pub async fn shutdown(&mut self) {
        self.scheduler.shutdown().await;
        self.logger.info("Service stopped");
    }

    fn jobs(&self) -> Vec<ScheduledJob> {
        let offset = self.config.schedule.update_offset_seconds;
        let mut jobs = vec![ScheduledJob {
            job: Arc::new(PriceCycle(Arc::clone(&self.components.prices))),
            timing: CycleTiming::new(self.config.schedule.price_interval_minutes, offset),
        }];
        if let Some(consumption) = &self.components.consumption {
            jobs.push(ScheduledJob {
                job: Arc::new(ConsumptionCycle(Arc::clone(consumption))),
                timing: CycleTiming::new(self.config.schedule.consumption_interval_minutes, offset),
            });
        }
        jobs
    }
}

fn cycle_timeout(config: &Config) -> Duration {
    config.request_timeout() * CYCLE_TIMEOUT_FACTOR
}

fn needs_rebuild(old: &Config, new: &Config) -> bool {
    old.environment != new.environment
        || old.credentials != new.credentials
        || old.zip_code != new.zip_code
        || old.contract_id() != new.contract_id()
        || old.timezone != new.timezone
        || old.block_hours != new.block_hours
        || old.http != new.http
}
