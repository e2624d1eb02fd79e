/// Error types shared across journal service crates.
///
/// These errors represent failures in infrastructure components (Redis, payload encoding)
/// that are common to multiple services. Application-specific errors should be defined
/// in each service crate and wrap `CommonError` via `#[from]`.

#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("payload encoding error: {0}")]
    Codec(#[from] serde_json::Error),
}
