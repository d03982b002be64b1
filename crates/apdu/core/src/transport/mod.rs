//! The link to a presented token
//!
//! [`CardTransport`] is the seam between the protocol engine and whatever
//! hardware carries the frames. Implementations only move bytes; they never
//! interpret status words or chain GET RESPONSE requests.

pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

use std::fmt;

use bytes::Bytes;
pub use error::TransportError;
use tracing::{debug, trace};

use crate::{Command, Response};

/// Largest raw response accepted from the token: 256 data bytes plus the status word
pub const MAX_RESPONSE_LEN: usize = 258;

/// Largest outbound frame: header, Lc, a full data field and Le
pub const MAX_FRAME_LEN: usize = 5 + crate::MAX_DATA_LEN;

/// Identification of a token found in the field
#[derive(Clone, PartialEq, Eq)]
pub struct TokenInfo {
    /// Name of the reader slot the token was found on
    pub reader: String,
    /// Answer-to-reset bytes reported by the token
    pub atr: Bytes,
}

impl fmt::Debug for TokenInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenInfo")
            .field("reader", &self.reader)
            .field("atr", &hex::encode(&self.atr))
            .finish()
    }
}

/// A blocking link to one physical interface
pub trait CardTransport: Send + fmt::Debug {
    /// Send one frame to the presented token and return one raw response
    ///
    /// Fails with [`TransportError::ResponseTooLong`] if the token answers with
    /// more than `max_response_len` bytes.
    fn exchange(&mut self, frame: &[u8], max_response_len: usize) -> Result<Bytes, TransportError> {
        if frame.len() > MAX_FRAME_LEN {
            return Err(TransportError::FrameTooLong {
                len: frame.len(),
                max: MAX_FRAME_LEN,
            });
        }

        trace!(command = %hex::encode(frame), "Exchanging frame");
        let response = self.do_exchange(frame, max_response_len).inspect_err(|e| {
            debug!(error = %e, "Transport error during exchange");
        })?;
        trace!(response = %hex::encode(&response), "Received frame");

        if response.len() > max_response_len {
            return Err(TransportError::ResponseTooLong {
                len: response.len(),
                max: max_response_len,
            });
        }
        Ok(response)
    }

    /// Send a command and parse the token's answer
    fn transmit(&mut self, command: &Command) -> Result<Response, TransportError> {
        let raw = self.exchange(&command.to_bytes(), command.response_capacity())?;
        Ok(Response::from_bytes(raw))
    }

    /// Implementation hook for [`CardTransport::exchange`]
    fn do_exchange(&mut self, frame: &[u8], max_response_len: usize)
    -> Result<Bytes, TransportError>;

    /// Check for a token in the field without blocking
    ///
    /// Returns `Ok(None)` when the field is empty. A returned token is connected
    /// and ready for [`CardTransport::exchange`].
    fn poll_token(&mut self) -> Result<Option<TokenInfo>, TransportError>;

    /// Check if the transport currently holds a connection to a token
    fn is_connected(&self) -> bool;

    /// Drop the connection to the current token, if any
    fn release(&mut self) -> Result<(), TransportError>;
}

impl<T: CardTransport + ?Sized> CardTransport for Box<T> {
    fn exchange(&mut self, frame: &[u8], max_response_len: usize) -> Result<Bytes, TransportError> {
        (**self).exchange(frame, max_response_len)
    }

    fn do_exchange(
        &mut self,
        frame: &[u8],
        max_response_len: usize,
    ) -> Result<Bytes, TransportError> {
        (**self).do_exchange(frame, max_response_len)
    }

    fn poll_token(&mut self) -> Result<Option<TokenInfo>, TransportError> {
        (**self).poll_token()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn release(&mut self) -> Result<(), TransportError> {
        (**self).release()
    }
}
