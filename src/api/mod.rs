//! Tariff API integration
//!
//! Split into the wire types, the transport capability with its `reqwest`
//! implementation, the token cache and the authenticated client on top.

pub mod client;
pub mod token;
pub mod transport;
pub mod types;

pub use client::TariffClient;
pub use token::{AccessToken, TokenManager};
pub use transport::{HttpTransport, TariffTransport};
pub use types::{ConsumptionEntry, DateRange, SpotPriceRecord, TokenGrant};
