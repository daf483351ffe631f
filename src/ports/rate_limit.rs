/// Counts attempts per key, e.g. join code guesses per user
///
/// Kept behind a port so the counters can live in a shared backend when the
/// service runs on several nodes.
#[mockall::automock]
#[async_trait::async_trait]
pub trait AttemptLimiterPort {
    /// Register one attempt for `key`, failing once the key is over its limit
    async fn register_attempt(&self, key: String) -> Result<(), Error>;
    /// Forget all attempts for `key`
    async fn reset(&self, key: String) -> Result<(), Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("too many attempts, retry in {retry_after_secs}s")]
    LimitExceeded { retry_after_secs: u64 },

    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}
