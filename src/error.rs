//! Error types for the relay bot
//!
//! Venue, delivery and configuration failures are kept apart so the poller can
//! tell retry-eligible outcomes from fatal ones.

use thiserror::Error;

/// Failure while talking to the venue REST API
#[derive(Debug, Error)]
pub enum ApiError {
    /// Signature could not be computed; the request was never sent
    #[error("request signing failed for {endpoint}")]
    Signature { endpoint: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Body was not JSON, or lacked the `data` envelope
    #[error("malformed response: {raw}")]
    Malformed { raw: String },

    /// Venue answered 200 but reported an application error code
    #[error("venue error {code}: {msg}")]
    Venue { code: i64, msg: String },
}

impl ApiError {
    /// Whether the next poll tick may reasonably succeed where this one failed
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Transport(_)
            | ApiError::Http { .. }
            | ApiError::Malformed { .. }
            | ApiError::Venue { .. } => true,
            ApiError::Signature { .. } => false,
        }
    }
}

/// Failure while handing a message to the chat sink
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("channel {0} is not resolvable")]
    SinkUnavailable(String),

    #[error("send rejected with HTTP {status}: {body}")]
    Send { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Missing or invalid process configuration, fatal at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, BotError>;
