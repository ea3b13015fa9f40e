use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    /// The supplied compute function failed. The key was released, so the
    /// next caller may retry; only the caller that ran the computation sees
    /// this error.
    #[error("upstream computation failed for key `{key}`: {source}")]
    Upstream {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// `invalidate` was called while a computation for the key is in flight.
    /// The in-flight computation is unaffected.
    #[error("key `{key}` has a computation in flight")]
    Busy { key: String },
}
