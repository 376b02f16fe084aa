use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::config::Config;
use crate::error::{Result, StromspotError};
use crate::logging::{StructuredLogger, get_logger};

use super::token::{AccessToken, TokenManager};
use super::transport::{HttpTransport, TariffTransport};
use super::types::{ConsumptionEntry, DateRange, SpotPriceRecord};

/// Authenticated access to the tariff API
///
/// Every data call obtains its bearer token from the shared [`TokenManager`].
/// A 401 answer triggers exactly one token replacement and one retry.
pub struct TariffClient {
    transport: Arc<dyn TariffTransport>,
    tokens: TokenManager,
    zip_code: String,
    contract_id: Option<String>,
    logger: StructuredLogger,
}

impl TariffClient {
    pub fn new(
        transport: Arc<dyn TariffTransport>,
        zip_code: impl Into<String>,
        contract_id: Option<String>,
    ) -> Self {
        Self {
            tokens: TokenManager::new(Arc::clone(&transport)),
            transport,
            zip_code: zip_code.into(),
            contract_id: contract_id.filter(|c| !c.trim().is_empty()),
            logger: get_logger("client"),
        }
    }

    /// Client backed by the `reqwest` transport for the configured environment
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport: Arc<dyn TariffTransport> = Arc::new(HttpTransport::from_config(config)?);
        Ok(Self::new(
            transport,
            config.zip_code.clone(),
            config.contract_id().map(str::to_string),
        ))
    }

    pub const fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn zip_code(&self) -> &str {
        &self.zip_code
    }

    pub fn contract_id(&self) -> Option<&str> {
        self.contract_id.as_deref()
    }

    /// Hourly spot prices for the configured postal code
    pub async fn spot_prices(&self, range: &DateRange) -> Result<Vec<SpotPriceRecord>> {
        let zip = self.zip_code.as_str();
        self.with_token(|token| {
            let transport = Arc::clone(&self.transport);
            async move { transport.spot_prices(token.value(), zip, range).await }
        })
        .await
    }

    /// Hourly consumption of the configured contract; 404 means no readings
    pub async fn energy_consumption(&self, range: &DateRange) -> Result<Vec<ConsumptionEntry>> {
        let Some(contract_id) = self.contract_id.as_deref() else {
            return Err(StromspotError::config("no contract id configured"));
        };
        let result = self
            .with_token(|token| {
                let transport = Arc::clone(&self.transport);
                async move {
                    transport
                        .energy_consumption(token.value(), contract_id, range)
                        .await
                }
            })
            .await;
        match result {
            Err(StromspotError::Api {
                status: Some(404), ..
            }) => {
                self.logger
                    .debug("No consumption data available for the requested range");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    /// Authenticate and fetch one hour of prices
    pub async fn test_connection(&self, now: DateTime<Utc>) -> Result<()> {
        self.tokens.get_token_at(now).await?;
        let range = DateRange::hourly(now, now + Duration::hours(1));
        self.spot_prices(&range).await?;
        self.logger.info("Connection test succeeded");
        Ok(())
    }

    async fn with_token<T, F, Fut>(&self, call: F) -> Result<T>
    where
        F: Fn(AccessToken) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let token = self.tokens.get_token().await?;
        match call(token.clone()).await {
            Err(e) if e.is_unauthorized() => {
                self.logger
                    .warn("Request rejected with 401, retrying with a new token");
                let fresh = self.tokens.refresh_after_rejection(&token).await?;
                call(fresh).await
            }
            other => other,
        }
    }
}
