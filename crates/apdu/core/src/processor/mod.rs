//! Reassembly of responses spread over several frames
//!
//! A token that has more to say than fits in one frame answers with `61 XX`,
//! where `XX` hints at the size of the next fragment. The reader then issues
//! GET RESPONSE until the token finishes with `90 00`.

pub mod error;

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

use crate::command::Command;
use crate::response::{Response, ResponseStatus};
use crate::transport::{CardTransport, MAX_RESPONSE_LEN};
pub use error::ProcessorError;

/// Largest fragment requested in one GET RESPONSE
pub const MAX_CHUNK_LEN: u8 = 250;

/// Default bound on GET RESPONSE rounds for one logical response
pub const DEFAULT_MAX_CHUNKS: usize = 64;

/// Build the GET RESPONSE command for a fragment of `le` bytes
pub const fn get_response_command(le: u8) -> Command {
    Command::new_with_le(0x00, 0xC0, 0x00, 0x00, le)
}

/// Requested size for a size hint: the hint itself unless it is 0 or above the cap
pub const fn clamp_hint(hint: u8) -> u8 {
    if hint == 0 || hint > MAX_CHUNK_LEN { MAX_CHUNK_LEN } else { hint }
}

/// Drives GET RESPONSE rounds until a full logical response is assembled
#[derive(Debug, Clone, Copy)]
pub struct ChunkReassembler {
    /// Maximum number of GET RESPONSE rounds to follow
    max_chunks: usize,
}

impl ChunkReassembler {
    /// Create a reassembler that gives up after `max_chunks` rounds
    pub const fn new(max_chunks: usize) -> Self {
        Self { max_chunks }
    }

    /// The configured round limit
    pub const fn max_chunks(&self) -> usize {
        self.max_chunks
    }

    /// Send `command` and follow any continuation
    ///
    /// Returns a success response carrying the full payload, or the token's
    /// failure response untouched.
    pub fn transmit(
        &self,
        transport: &mut dyn CardTransport,
        command: &Command,
    ) -> Result<Response, ProcessorError> {
        let response = transport.transmit(command)?;
        match response.status() {
            ResponseStatus::Continue(_) => self.collect(transport, response).map(Response::success),
            ResponseStatus::Success | ResponseStatus::Failure(_) => Ok(response),
        }
    }

    /// Assemble a full payload starting from an already received response
    ///
    /// A fragment carried by the initial `61 XX` response is kept in front.
    pub fn collect(
        &self,
        transport: &mut dyn CardTransport,
        initial: Response,
    ) -> Result<Bytes, ProcessorError> {
        match initial.status().clone() {
            ResponseStatus::Success => Ok(initial.into_payload()),
            ResponseStatus::Continue(hint) => {
                let mut buffer = BytesMut::from(initial.into_payload().as_ref());
                self.follow(transport, hint, &mut buffer)?;
                Ok(buffer.freeze())
            }
            ResponseStatus::Failure(raw) => Err(ProcessorError::UnexpectedStatus(raw)),
        }
    }

    /// Fetch a response whose first fragment is `initial_hint` bytes
    pub fn get_response(
        &self,
        transport: &mut dyn CardTransport,
        initial_hint: u8,
    ) -> Result<Bytes, ProcessorError> {
        let mut buffer = BytesMut::new();
        self.follow(transport, initial_hint, &mut buffer)?;
        Ok(buffer.freeze())
    }

    fn follow(
        &self,
        transport: &mut dyn CardTransport,
        hint: u8,
        buffer: &mut BytesMut,
    ) -> Result<(), ProcessorError> {
        let mut requested = clamp_hint(hint);

        for chunk in 1..=self.max_chunks {
            trace!(requested, chunk, "Sending GET RESPONSE");

            let frame = get_response_command(requested).to_bytes();
            let response = Response::from_bytes(transport.exchange(&frame, MAX_RESPONSE_LEN)?);

            let fragment = response.payload();
            if fragment.len() > requested as usize {
                return Err(ProcessorError::OversizedChunk {
                    requested: requested as usize,
                    received: fragment.len(),
                });
            }
            buffer.extend_from_slice(fragment);

            match response.status() {
                ResponseStatus::Success => {
                    trace!(total_len = buffer.len(), chunks = chunk, "Completed response chaining");
                    return Ok(());
                }
                ResponseStatus::Continue(next) => requested = clamp_hint(*next),
                ResponseStatus::Failure(raw) => {
                    return Err(ProcessorError::UnexpectedStatus(raw.clone()));
                }
            }
        }

        debug!(limit = self.max_chunks, "Token exceeded the chunk limit");
        Err(ProcessorError::ChainLimitExceeded {
            limit: self.max_chunks,
        })
    }
}

impl Default for ChunkReassembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHUNKS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    fn fragment(fill: u8, len: usize, sw: [u8; 2]) -> Bytes {
        let mut data = vec![fill; len];
        data.extend_from_slice(&sw);
        Bytes::from(data)
    }

    #[test]
    fn test_three_fragments() {
        let mut transport = MockTransport::new([
            fragment(0xA1, 100, [0x61, 100]),
            fragment(0xA2, 100, [0x61, 37]),
            fragment(0xA3, 37, [0x90, 0x00]),
        ])
        .exhaustible();

        let payload = ChunkReassembler::default().get_response(&mut transport, 0).unwrap();

        assert_eq!(payload.len(), 237);
        assert!(payload[..100].iter().all(|b| *b == 0xA1));
        assert!(payload[100..200].iter().all(|b| *b == 0xA2));
        assert!(payload[200..].iter().all(|b| *b == 0xA3));
        assert_eq!(
            transport.sent_hex(),
            vec!["00c00000fa", "00c0000064", "00c0000025"]
        );
    }

    #[test]
    fn test_endless_continue_is_bounded() {
        let mut transport = MockTransport::with_response(fragment(0x00, 10, [0x61, 10]));

        let err = ChunkReassembler::new(8).get_response(&mut transport, 10).unwrap_err();

        assert!(matches!(err, ProcessorError::ChainLimitExceeded { limit: 8 }));
        assert_eq!(transport.commands.len(), 8);
    }

    #[test]
    fn test_failure_mid_chain() {
        let mut transport = MockTransport::new([
            fragment(0x01, 4, [0x61, 4]),
            Bytes::from_static(&[0x6F, 0x00]),
        ]);

        let err = ChunkReassembler::default().get_response(&mut transport, 4).unwrap_err();
        match err {
            ProcessorError::UnexpectedStatus(raw) => assert_eq!(raw.as_ref(), &[0x6F, 0x00]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_oversized_fragment() {
        let mut transport = MockTransport::with_response(fragment(0x01, 20, [0x90, 0x00]));

        let err = ChunkReassembler::default().get_response(&mut transport, 10).unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::OversizedChunk {
                requested: 10,
                received: 20
            }
        ));
    }

    #[test]
    fn test_hint_clamping() {
        assert_eq!(clamp_hint(0), 250);
        assert_eq!(clamp_hint(251), 250);
        assert_eq!(clamp_hint(255), 250);
        assert_eq!(clamp_hint(37), 37);
    }

    #[test]
    fn test_transmit_prepends_initial_fragment() {
        let mut transport = MockTransport::new([
            fragment(0x7B, 3, [0x61, 2]),
            fragment(0x7D, 2, [0x90, 0x00]),
        ])
        .exhaustible();

        let command = Command::new(0xD0, 0x02, 0x00, 0x00)
            .with_data(Bytes::from_static(b"{}"))
            .unwrap();
        let response = ChunkReassembler::default().transmit(&mut transport, &command).unwrap();

        assert!(response.is_success());
        assert_eq!(response.payload().as_ref(), &[0x7B, 0x7B, 0x7B, 0x7D, 0x7D]);
        assert_eq!(transport.commands[0], command.to_bytes());
        assert_eq!(transport.commands[1], get_response_command(2).to_bytes());
    }

    #[test]
    fn test_transmit_passes_failures_through() {
        let mut transport = MockTransport::with_response(Bytes::from_static(&[0x69, 0x83]));
        let response = ChunkReassembler::default()
            .transmit(&mut transport, &Command::new(0xD0, 0x02, 0x00, 0x00))
            .unwrap();
        assert_eq!(
            response.status(),
            &ResponseStatus::Failure(Bytes::from_static(&[0x69, 0x83]))
        );
        assert_eq!(transport.commands.len(), 1);
    }
}
