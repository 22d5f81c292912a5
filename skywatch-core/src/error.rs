use std::time::Duration;
use thiserror::Error;

/// Failure taxonomy for provider calls and manager operations.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// The provider could not resolve the city name.
    #[error("city '{0}' not found")]
    NotFound(String),

    /// Transport-level failure: DNS, connection, unexpected status,
    /// unparseable body.
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Search query too short to send to the provider.
    #[error("query '{query}' is shorter than {min_len} characters")]
    InvalidQuery { query: String, min_len: usize },
}
