use nfcauth_apdu_core::{Bytes, CommandError, ProcessorError, TransportError};

use crate::config::ConfigError;
use crate::crypto::VerificationError;
use crate::store::StoreError;

/// Result type for reader operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single handshake
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The token left the field or the link dropped
    #[error("Link error: {0}")]
    Link(#[from] TransportError),

    /// The token broke the framing rules
    #[error("Protocol violation: {0}")]
    ProtocolViolation(ProcessorError),

    /// A command could not be framed
    #[error(transparent)]
    Command(#[from] CommandError),

    /// SELECT was answered with anything but `90 00`
    #[error("Application select failed: {}", hex::encode(.status))]
    ApplicationSelectFailed {
        /// Raw response
        status: Bytes,
    },

    /// The registration request was refused
    #[error("Registration request failed: {}", hex::encode(.status))]
    RegistrationRequestFailed {
        /// Raw response
        status: Bytes,
    },

    /// The token did not acknowledge registration complete
    #[error("Registration complete failed: {}", hex::encode(.status))]
    RegistrationCompleteFailed {
        /// Raw response
        status: Bytes,
    },

    /// The authentication request was refused
    #[error("Authentication request failed: {}", hex::encode(.status))]
    AuthenticationRequestFailed {
        /// Raw response
        status: Bytes,
    },

    /// The token wants its holder to unlock it before answering
    #[error("User verification required on the token")]
    UserVerificationRequired,

    /// The token's answer could not be decoded
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The token answered with an empty payload
    #[error("Empty response")]
    EmptyResponse,

    /// The token registered against a different reader
    #[error("Reader identity mismatch: expected {expected}, got {actual}")]
    IdentityMismatch {
        /// Configured reader id
        expected: String,
        /// Reader id claimed by the token
        actual: String,
    },

    /// A record for this user already exists
    #[error("User {0} is already registered")]
    AlreadyRegistered(String),

    /// The token kept deferring its registration answer
    #[error("Registration timed out after {attempts} deferred answers")]
    RegistrationTimedOut {
        /// Consecutive deferred answers seen
        attempts: u32,
    },

    /// A request body does not fit in one frame
    #[error("Request too large: {len} bytes (max {max})")]
    RequestTooLarge {
        /// Body length
        len: usize,
        /// Allowed length
        max: usize,
    },

    /// A request body could not be encoded
    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    /// Stored key or claimed signature could not be decoded
    #[error(transparent)]
    Verification(#[from] VerificationError),

    /// The credential store failed
    #[error("Store error: {0}")]
    Store(StoreError),

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<ProcessorError> for Error {
    fn from(error: ProcessorError) -> Self {
        match error {
            ProcessorError::Transport(e) => Self::Link(e),
            other => Self::ProtocolViolation(other),
        }
    }
}

impl From<StoreError> for Error {
    fn from(error: StoreError) -> Self {
        Self::Store(error)
    }
}

/// Coarse classification used for logging and recovery decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Link failure, cured by the next presentation
    Link,
    /// The token broke the protocol
    ProtocolViolation,
    /// Undecodable or empty answer
    Malformed,
    /// Expected adverse outcome
    Adverse,
    /// Stored or claimed crypto material is corrupt
    Verification,
    /// Credential store failure
    Store,
    /// Invalid configuration
    Config,
}

impl ErrorKind {
    /// Stable lowercase name for structured logs
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Link => "link",
            Self::ProtocolViolation => "protocol_violation",
            Self::Malformed => "malformed",
            Self::Adverse => "adverse",
            Self::Verification => "verification",
            Self::Store => "store",
            Self::Config => "config",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Classify this error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Link(_) => ErrorKind::Link,
            Self::ProtocolViolation(_)
            | Self::Command(_)
            | Self::ApplicationSelectFailed { .. }
            | Self::RegistrationRequestFailed { .. }
            | Self::RegistrationCompleteFailed { .. }
            | Self::AuthenticationRequestFailed { .. }
            | Self::RegistrationTimedOut { .. } => ErrorKind::ProtocolViolation,
            Self::MalformedResponse(_) | Self::EmptyResponse => ErrorKind::Malformed,
            Self::UserVerificationRequired
            | Self::IdentityMismatch { .. }
            | Self::AlreadyRegistered(_) => ErrorKind::Adverse,
            Self::Verification(_) => ErrorKind::Verification,
            Self::Store(_) => ErrorKind::Store,
            Self::Config(_) | Self::RequestTooLarge { .. } | Self::Encode(_) => ErrorKind::Config,
        }
    }

    /// Whether the session should keep waiting for the next presentation
    pub const fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Config(_)
                | Self::RequestTooLarge { .. }
                | Self::Encode(_)
                | Self::RegistrationTimedOut { .. }
        )
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }
}
