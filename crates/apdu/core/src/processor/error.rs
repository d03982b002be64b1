//! Error types for response reassembly

use bytes::Bytes;

use crate::transport::error::TransportError;

/// Error type for response reassembly
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    /// Underlying transport error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The token kept asking for more GET RESPONSE rounds than allowed
    #[error("Chain limit exceeded ({limit} chunks)")]
    ChainLimitExceeded {
        /// Configured chunk limit
        limit: usize,
    },

    /// A GET RESPONSE answer was neither success nor continuation
    #[error("Unexpected status during response chaining: {}", hex::encode(.0))]
    UnexpectedStatus(Bytes),

    /// The token sent more bytes than were requested
    #[error("Oversized chunk: requested {requested} bytes, received {received}")]
    OversizedChunk {
        /// Le of the GET RESPONSE
        requested: usize,
        /// Payload bytes received
        received: usize,
    },
}
