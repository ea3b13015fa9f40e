pub mod index;
pub mod record;
pub mod scorer;

pub use index::{DEFAULT_LIMIT, FuzzyIndex, IndexConfig};
pub use record::{EntityRecord, MatchCandidate};
pub use scorer::partial_ratio;
