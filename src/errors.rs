// errors.rs
use crate::domain::listing::MalformedRecordError;
use thiserror::Error;

/// Failures of the state store backends. Any of these leaves the run without
/// a trustworthy view of prior state, so callers treat them as fatal.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("failed to encode record: {0}")]
    Encode(#[from] MalformedRecordError),
}
