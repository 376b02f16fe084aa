//! Bearer token cache with single-flight refresh
//!
//! The cached token lives behind an async mutex that stays locked for the
//! whole refresh. Concurrent callers queue on the lock and, once it is their
//! turn, take over the outcome of the refresh that ran while they waited: the
//! stored token on success, the same error on failure. Only a caller that
//! arrives after the last attempt finished contacts the token endpoint again.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::error::{Result, StromspotError};
use crate::logging::{StructuredLogger, get_logger};

use super::transport::TariffTransport;

/// Tokens are treated as expired this long before their real expiry
pub const EXPIRY_MARGIN_SECONDS: i64 = 60;

/// Cached OAuth2 access token
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Usable at `now` with `margin` to spare
    pub fn is_fresh_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now + margin < self.expires_at
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Default)]
struct TokenSlot {
    token: Option<AccessToken>,
    // Error of the most recent attempt; cleared by a successful one
    last_failure: Option<StromspotError>,
}

/// Owner of the single cached token
pub struct TokenManager {
    transport: Arc<dyn TariffTransport>,
    slot: Mutex<TokenSlot>,
    // Completed refresh attempts, only bumped while `slot` is locked
    attempts: AtomicU64,
    margin: Duration,
    logger: StructuredLogger,
}

impl TokenManager {
    pub fn new(transport: Arc<dyn TariffTransport>) -> Self {
        Self {
            transport,
            slot: Mutex::new(TokenSlot::default()),
            attempts: AtomicU64::new(0),
            margin: Duration::seconds(EXPIRY_MARGIN_SECONDS),
            logger: get_logger("token"),
        }
    }

    /// Valid token, refreshing first if absent or about to expire
    pub async fn get_token(&self) -> Result<AccessToken> {
        self.get_token_at(Utc::now()).await
    }

    /// As [`Self::get_token`] with an explicit clock
    pub async fn get_token_at(&self, now: DateTime<Utc>) -> Result<AccessToken> {
        let seen = self.attempts.load(Ordering::SeqCst);
        let mut slot = self.slot.lock().await;
        if let Some(token) = slot.token.as_ref().filter(|t| t.is_fresh_at(now, self.margin)) {
            return Ok(token.clone());
        }
        if let Some(err) = self.failed_while_waiting(&slot, seen) {
            return Err(err);
        }
        self.refresh_locked(&mut slot, now).await
    }

    /// Replace a token the upstream just rejected
    ///
    /// When another caller already swapped the rejected token out, the newer
    /// one is returned without contacting the token endpoint again.
    pub async fn refresh_after_rejection(&self, stale: &AccessToken) -> Result<AccessToken> {
        let now = Utc::now();
        let seen = self.attempts.load(Ordering::SeqCst);
        let mut slot = self.slot.lock().await;
        if let Some(current) = slot
            .token
            .as_ref()
            .filter(|t| *t != stale && t.is_fresh_at(now, self.margin))
        {
            return Ok(current.clone());
        }
        if let Some(err) = self.failed_while_waiting(&slot, seen) {
            return Err(err);
        }
        self.logger.info("Access token rejected upstream, requesting a new one");
        self.refresh_locked(&mut slot, now).await
    }

    /// Currently cached token without refreshing
    pub async fn cached(&self) -> Option<AccessToken> {
        self.slot.lock().await.token.clone()
    }

    /// Number of token grants attempted so far
    pub fn refresh_attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    // A refresh finished after `seen` was read and it failed
    fn failed_while_waiting(&self, slot: &TokenSlot, seen: u64) -> Option<StromspotError> {
        if self.attempts.load(Ordering::SeqCst) == seen {
            return None;
        }
        let err = slot.last_failure.clone()?;
        self.logger
            .debug("Sharing the outcome of the token refresh that just failed");
        Some(err)
    }

    // Caller holds the slot lock. On failure the cached token is left untouched.
    async fn refresh_locked(&self, slot: &mut TokenSlot, now: DateTime<Utc>) -> Result<AccessToken> {
        self.logger.debug("Requesting new access token");
        let outcome = self.transport.request_token().await;
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let grant = match outcome {
            Ok(grant) => grant,
            Err(e) => {
                self.logger.error(&format!("Token refresh failed: {e}"));
                slot.last_failure = Some(e.clone());
                return Err(e);
            }
        };
        let expires_at = now + Duration::seconds(grant.expires_in.max(0));
        self.logger.info(&format!(
            "Access token refreshed, valid until {}",
            expires_at.to_rfc3339()
        ));
        let token = AccessToken::new(grant.access_token, expires_at);
        slot.token = Some(token.clone());
        slot.last_failure = None;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{ConsumptionEntry, DateRange, SpotPriceRecord, TokenGrant};
    use crate::error::StromspotError;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubTransport {
        calls: AtomicUsize,
        fail: bool,
        expires_in: i64,
    }

    impl StubTransport {
        fn new(expires_in: i64) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
                expires_in,
            }
        }
    }

    #[async_trait::async_trait]
    impl TariffTransport for StubTransport {
        async fn request_token(&self) -> Result<TokenGrant> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                return Err(StromspotError::auth(Some(401), "Invalid client credentials"));
            }
            Ok(TokenGrant {
                access_token: format!("token-{n}"),
                expires_in: self.expires_in,
                token_type: None,
            })
        }

        async fn spot_prices(
            &self,
            _bearer: &str,
            _zip: &str,
            _range: &DateRange,
        ) -> Result<Vec<SpotPriceRecord>> {
            Ok(Vec::new())
        }

        async fn energy_consumption(
            &self,
            _bearer: &str,
            _contract_id: &str,
            _range: &DateRange,
        ) -> Result<Vec<ConsumptionEntry>> {
            Ok(Vec::new())
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_cached_token_reused_until_margin() {
        let stub = Arc::new(StubTransport::new(3600));
        let mgr = TokenManager::new(stub.clone());
        let a = mgr.get_token_at(t0()).await.unwrap();
        let b = mgr.get_token_at(t0() + Duration::seconds(3500)).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);

        // inside the 60 s margin
        let c = mgr.get_token_at(t0() + Duration::seconds(3541)).await.unwrap();
        assert_eq!(c.value(), "token-2");
        assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_old_token() {
        let stub = Arc::new(StubTransport::new(100));
        let mgr = TokenManager::new(stub);
        mgr.get_token_at(t0()).await.unwrap();

        let failing = Arc::new(StubTransport {
            calls: AtomicUsize::new(0),
            fail: true,
            expires_in: 100,
        });
        let broken = TokenManager::new(failing);
        broken.slot.lock().await.token = mgr.cached().await;
        let err = broken
            .get_token_at(t0() + Duration::seconds(90))
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(broken.cached().await.unwrap().value(), "token-1");

        // a later caller tries again rather than replaying the old failure
        broken
            .get_token_at(t0() + Duration::seconds(91))
            .await
            .unwrap_err();
        assert_eq!(broken.refresh_attempts(), 2);
    }

    #[tokio::test]
    async fn test_debug_redacts_value() {
        let token = AccessToken::new("secret-value", t0());
        assert!(!format!("{token:?}").contains("secret-value"));
    }
}
