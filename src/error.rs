//! error taxonomy for the poller
//!
//! nothing here is ever returned to a caller that could act on it; the
//! poller logs these and picks the next delay from the variant.

use thiserror::Error;

/// configuration problems that stop polling before the first request
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("api token must be specified")]
    MissingToken,

    #[error("update_interval_ms must be greater than zero")]
    ZeroUpdateInterval,
}

/// why a single fetch did not produce a device list
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// 401 - the token is wrong; polling stops
    #[error("api token is invalid")]
    Auth,

    /// 429 - back off and keep going
    #[error("too many requests and got 429 status")]
    RateLimited,

    /// any other non-2xx status
    #[error("failed to get api response (status {0})")]
    Status(u16),

    /// the request never produced a response
    #[error("request failed: {0}")]
    Network(String),

    /// a 2xx whose body is not a device list
    #[error("failed to parse api response: {0}")]
    Parse(String),
}
