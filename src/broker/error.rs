//! Broker-specific error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("rate limited (HTTP 429)")]
    RateLimited,

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Transport(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("response missing field `{0}`")]
    MissingField(&'static str),

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<BrokerError>,
    },
}

impl BrokerError {
    /// Rate limits and timeouts are worth another attempt; everything else
    /// will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BrokerError::RateLimited | BrokerError::Timeout)
    }
}

impl From<reqwest::Error> for BrokerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            if status.as_u16() == 429 {
                Self::RateLimited
            } else {
                Self::Api {
                    status: status.as_u16(),
                    body: err.to_string(),
                }
            }
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for BrokerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

pub type BrokerResult<T> = Result<T, BrokerError>;
