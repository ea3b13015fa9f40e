pub mod config;
pub mod engine;
pub mod keys;
pub mod retry;

pub use config::{AssistantConfig, CacheSettings, RetrySettings, SearchSettings};
pub use engine::{Assistant, Generator};
pub use keys::{RequestKind, chat_key, fingerprint, request_key};
pub use retry::RetryPolicy;
