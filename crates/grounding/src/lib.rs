pub mod citations;
pub mod normalizer;

pub use citations::{
    CitationExtractor, DEFAULT_DENIED_HOSTS, GroundingResult, SourceChunk, Support,
};
pub use normalizer::normalize_spacing;
