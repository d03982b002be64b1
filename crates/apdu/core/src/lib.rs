//! Core types for APDU (Application Protocol Data Unit) exchanges with contactless tokens
//!
//! This crate provides the framing layer used by the nfcauth reader:
//!
//! - Building command frames with bounded payloads ([`Command`])
//! - Splitting raw responses into a status indicator and payload ([`Response`], [`ResponseStatus`])
//! - The [`CardTransport`] abstraction over a physical link
//! - Reassembly of responses spread over several `61 XX` frames ([`ChunkReassembler`])
//!
//! Nothing in here knows about registration or authentication; those state machines
//! live in `nfcauth-reader` and are built on these primitives.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod command;
pub mod processor;
pub mod response;
pub mod transport;

pub use command::{Command, CommandError, MAX_DATA_LEN};
pub use processor::{ChunkReassembler, MAX_CHUNK_LEN, ProcessorError};
pub use response::status::StatusWord;
pub use response::{Response, ResponseStatus};
pub use transport::{CardTransport, MAX_RESPONSE_LEN, TokenInfo, TransportError};

#[cfg(any(test, feature = "test-utils"))]
pub use transport::mock::MockTransport;

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        Bytes, BytesMut, CardTransport, ChunkReassembler, Command, CommandError, MAX_RESPONSE_LEN,
        ProcessorError, Response, ResponseStatus, StatusWord, TokenInfo, TransportError,
        response::status::common as status,
    };
}
