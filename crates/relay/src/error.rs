use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("relay channel is not configured")]
    Disabled,
    #[error("relay is not listening; call listen() first")]
    NotListening,
    #[error("could not subscribe to relay channel \"{channel}\": {detail}")]
    Subscribe { channel: String, detail: String },
    #[error("relay subscription closed")]
    SubscriptionClosed,
    #[error("relay broker error: {0}")]
    Broker(#[from] redis::RedisError),
    #[error("relay {operation} timed out after {after:?}")]
    Timeout { operation: &'static str, after: Duration },
    #[error("relay backend error: {0}")]
    Backend(String),
    #[error("relay envelope could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}
