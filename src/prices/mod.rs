//! Price window cache and the statistics derived from it

pub mod days;
pub mod fetcher;
pub mod model;
pub mod normalize;
pub mod stats;

pub use days::{DayBounds, local_midnight, resolve_local};
pub use fetcher::{PriceFetcher, PriceState};
pub use model::{ConsumptionRecord, DayLabel, PerDay, PriceSlot, PriceWindow};
pub use stats::{Block, DerivedStatistics, cheapest_block, is_block_active};
