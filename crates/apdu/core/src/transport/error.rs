//! Error types specific to the token link

use thiserror::Error;

/// Transport error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No token is in the field
    #[error("No token present")]
    NoToken,

    /// The link to the token dropped or the driver refused the exchange
    #[error("Link error: {0}")]
    Link(String),

    /// The hardware timeout elapsed before the token answered
    #[error("Operation timed out")]
    Timeout,

    /// The token answered with more bytes than the exchange allowed
    #[error("Response too long: {len} bytes (max {max})")]
    ResponseTooLong {
        /// Received length
        len: usize,
        /// Allowed length
        max: usize,
    },

    /// The outbound frame does not fit in a single exchange
    #[error("Frame too long: {len} bytes (max {max})")]
    FrameTooLong {
        /// Frame length
        len: usize,
        /// Allowed length
        max: usize,
    },

    /// Other error with message
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Create a link error
    pub fn link<S: Into<String>>(message: S) -> Self {
        Self::Link(message.into())
    }

    /// Create a general other error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other(message.into())
    }
}
