pub mod coalesce;
pub mod error;

pub use coalesce::{CacheStats, CoalescingCache, DEFAULT_MAX_ENTRIES};
pub use error::CacheError;
