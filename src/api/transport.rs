//! HTTP capability consumed by the core
//!
//! The core never talks to `reqwest` directly; it goes through
//! [`TariffTransport`], which makes the token manager and fetchers testable
//! with in-memory stubs.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::de::DeserializeOwned;

use crate::config::{ApiEnvironment, Config};
use crate::error::{Result, StromspotError};
use crate::logging::{StructuredLogger, get_logger};

use super::types::{ConsumptionEntry, DataEnvelope, DateRange, SpotPriceRecord, TokenGrant};

pub const ENDPOINT_OAUTH_TOKEN: &str = "/oauth2/token";
pub const ENDPOINT_SPOT_PRICES: &str = "/spot-prices";

/// Consumption endpoint path for a contract
pub fn consumption_endpoint(contract_id: &str) -> String {
    format!("/contracts/{contract_id}/energy-consumption")
}

/// Raw access to the three upstream endpoints
#[async_trait::async_trait]
pub trait TariffTransport: Send + Sync {
    /// Run the client-credentials grant
    async fn request_token(&self) -> Result<TokenGrant>;

    /// Hourly spot prices for a postal code
    async fn spot_prices(
        &self,
        bearer: &str,
        zip_code: &str,
        range: &DateRange,
    ) -> Result<Vec<SpotPriceRecord>>;

    /// Hourly consumption for a contract
    async fn energy_consumption(
        &self,
        bearer: &str,
        contract_id: &str,
        range: &DateRange,
    ) -> Result<Vec<ConsumptionEntry>>;
}

/// `reqwest`-backed transport
pub struct HttpTransport {
    http: reqwest::Client,
    api_base: String,
    auth_base: String,
    client_id: String,
    client_secret: String,
    logger: StructuredLogger,
}

impl HttpTransport {
    /// Build from explicit base URLs (useful for local test servers)
    pub fn new(
        api_base: &str,
        auth_base: &str,
        client_id: &str,
        client_secret: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            auth_base: auth_base.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            logger: get_logger("transport"),
        })
    }

    /// Build for the configured environment
    pub fn from_config(config: &Config) -> Result<Self> {
        let env: ApiEnvironment = config.environment;
        Self::new(
            env.api_base_url(),
            env.auth_base_url(),
            &config.credentials.client_id,
            &config.credentials.client_secret,
            config.request_timeout(),
        )
    }

    async fn get_data<T: DeserializeOwned>(
        &self,
        bearer: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let url = format!("{}{}", self.api_base, path);
        self.logger
            .debug(&format!("GET {url} with params {query:?}"));

        let resp = self
            .http
            .get(&url)
            .bearer_auth(bearer)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, concat!("stromspot/", env!("CARGO_PKG_VERSION")))
            .query(query)
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(error_for_status(path, status, &body));
        }

        let bytes = resp.bytes().await?;
        decode_data(path, &bytes)
    }
}

/// Decode a `{ "data": [...] }` body
pub fn decode_data<T: DeserializeOwned>(path: &str, body: &[u8]) -> Result<Vec<T>> {
    let envelope: DataEnvelope<T> = serde_json::from_slice(body).map_err(|e| {
        StromspotError::upstream_data(format!("{path}: invalid response structure: {e}"))
    })?;
    envelope.data.ok_or_else(|| {
        StromspotError::upstream_data(format!("{path}: invalid response structure: missing data"))
    })
}

/// Map an unsuccessful status to the error taxonomy
pub fn error_for_status(path: &str, status: StatusCode, body: &str) -> StromspotError {
    let code = status.as_u16();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            StromspotError::auth(Some(code), format!("{path}: request not authorized"))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            StromspotError::rate_limit(format!("{path}: rate limit exceeded"))
        }
        StatusCode::BAD_REQUEST => {
            StromspotError::api(Some(code), format!("{path}: bad request: {body}"))
        }
        StatusCode::NOT_FOUND => {
            StromspotError::api(Some(code), format!("{path}: resource not found: {body}"))
        }
        _ => StromspotError::api(
            Some(code),
            format!("{path}: request failed with status {code}"),
        ),
    }
}

#[async_trait::async_trait]
impl TariffTransport for HttpTransport {
    async fn request_token(&self) -> Result<TokenGrant> {
        let url = format!("{}{}", self.auth_base, ENDPOINT_OAUTH_TOKEN);
        self.logger.debug(&format!("Requesting OAuth2 token from {url}"));

        let resp = self
            .http
            .post(&url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(ACCEPT, "application/json")
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = resp.status();
        if !matches!(status, StatusCode::OK | StatusCode::CREATED) {
            let body = resp.text().await.unwrap_or_default();
            let err = match status {
                StatusCode::TOO_MANY_REQUESTS => StromspotError::rate_limit(
                    "token endpoint: rate limit exceeded during authentication",
                ),
                StatusCode::UNAUTHORIZED => {
                    StromspotError::auth(Some(401), "Invalid client credentials")
                }
                other => StromspotError::auth(
                    Some(other.as_u16()),
                    format!("Authentication failed: {body}"),
                ),
            };
            self.logger.error(&format!("Token request failed: {err}"));
            return Err(err);
        }

        let bytes = resp.bytes().await?;
        let grant: TokenGrant = serde_json::from_slice(&bytes).map_err(|e| {
            StromspotError::upstream_data(format!("token endpoint: invalid response: {e}"))
        })?;
        if grant.access_token.is_empty() {
            return Err(StromspotError::upstream_data(
                "token endpoint: empty access_token",
            ));
        }
        self.logger.debug(&format!(
            "Obtained access token, expires in {} seconds",
            grant.expires_in
        ));
        Ok(grant)
    }

    async fn spot_prices(
        &self,
        bearer: &str,
        zip_code: &str,
        range: &DateRange,
    ) -> Result<Vec<SpotPriceRecord>> {
        let mut query = range.query_pairs();
        query.push(("zip", zip_code.to_string()));
        self.get_data(bearer, ENDPOINT_SPOT_PRICES, &query).await
    }

    async fn energy_consumption(
        &self,
        bearer: &str,
        contract_id: &str,
        range: &DateRange,
    ) -> Result<Vec<ConsumptionEntry>> {
        let path = consumption_endpoint(contract_id);
        self.get_data(bearer, &path, &range.query_pairs()).await
    }
}
