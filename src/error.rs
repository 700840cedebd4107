//! Unified error type.

use thiserror::Error;

/// The error type returned by the crate's fallible operations.
///
/// Failures while handling a request are expressed as HTTP responses or as
/// degraded logging, never as `Error`s. This type covers setup: binding a
/// port, registering excluded paths, reading configuration, and installing the
/// global subscriber.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid value for {key}: `{value}`")]
    InvalidConfig { key: &'static str, value: String },

    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),
}
