//! # Stromspot - Spot tariff statistics and update coordinator
//!
//! Keeps a rolling cache of hourly electricity prices (yesterday, today and
//! tomorrow) from a dynamic tariff API, derives decision-support values from
//! it and joins smart-meter consumption against it to compute daily cost.
//!
//! ## Features
//!
//! - **Statistics**: min, max, average, median, cheapest hour, cheapest
//!   contiguous block and most expensive hour per day
//! - **DST-safe**: day windows and schedules follow local midnights
//! - **Scheduled refresh**: interval-aligned loops with a fixed offset that
//!   keep running through upstream failures
//! - **Token handling**: one shared OAuth2 token with single-flight refresh
//! - **Configuration**: YAML-based configuration with validation
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `api`: Transport capability, token manager and authenticated client
//! - `prices`: Price windows, day boundaries, statistics and the fetcher
//! - `consumption`: Consumption readings and daily cost
//! - `scheduler`: Offset-aligned refresh loops
//! - `snapshot`: Published view with explicit unavailable markers
//! - `service`: Wiring and lifecycle

pub mod api;
pub mod config;
pub mod consumption;
pub mod error;
pub mod logging;
pub mod prices;
pub mod scheduler;
pub mod service;
pub mod snapshot;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, StromspotError};
pub use service::TariffService;
pub use snapshot::PublishedSnapshot;
