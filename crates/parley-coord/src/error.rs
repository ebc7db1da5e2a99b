use thiserror::Error;

pub type CoordResult<T> = Result<T, CoordError>;

#[derive(Error, Debug)]
pub enum CoordError {
    #[error("Coordination store unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Subscription closed")]
    SubscriptionClosed,
}

impl From<redis::RedisError> for CoordError {
    fn from(e: redis::RedisError) -> Self {
        CoordError::Unavailable(e.to_string())
    }
}
